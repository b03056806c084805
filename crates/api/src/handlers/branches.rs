use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use routing_core::models::Branch;
use routing_core::GeoPoint;
use serde::Deserialize;
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    response::{success, ApiResponse},
    routes::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertBranchRequest {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_closed: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    pub is_closed: bool,
}

/// 列出营业中的门店
pub async fn list_branches(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let branches = state.branches.list_active_branches().await?;
    Ok(success(branches))
}

/// 新增或更新门店
pub async fn upsert_branch(
    State(state): State<AppState>,
    Json(request): Json<UpsertBranchRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.id.trim().is_empty() {
        return Err(ApiError::BadRequest("门店ID不能为空".to_string()));
    }
    if !GeoPoint::new(request.latitude, request.longitude).is_valid() {
        return Err(ApiError::BadRequest(format!(
            "门店坐标超出范围: ({}, {})",
            request.latitude, request.longitude
        )));
    }

    let branch = Branch {
        id: request.id.trim().to_string(),
        name: request.name,
        latitude: request.latitude,
        longitude: request.longitude,
        is_active: request.is_active,
        is_closed: request.is_closed,
    };
    state.branch_admin.upsert_branch(&branch).await?;
    info!("门店 {} 已保存", branch.id);
    Ok(success(branch))
}

/// 暂停或恢复门店接单
pub async fn set_availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AvailabilityRequest>,
) -> ApiResult<impl IntoResponse> {
    state.branch_admin.set_closed(&id, request.is_closed).await?;
    info!("门店 {} 暂停接单: {}", id, request.is_closed);

    let message = if request.is_closed {
        "门店已暂停接单"
    } else {
        "门店已恢复接单"
    };
    Ok(ApiResponse::success_with_message(
        serde_json::json!({ "branchId": id, "isClosed": request.is_closed }),
        message.to_string(),
    ))
}
