use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use routing_core::RoutingError;

use crate::{
    error::ApiResult,
    response::{created, success},
    routes::AppState,
    services::PlaceOrderRequest,
};

/// 下单
pub async fn place_order(
    State(state): State<AppState>,
    Json(request): Json<PlaceOrderRequest>,
) -> ApiResult<impl IntoResponse> {
    let placed = state.placement.place(request).await?;
    Ok(created(placed))
}

/// 查询订单的路由状态
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let order = state
        .orders
        .find_by_id(&id)
        .await?
        .ok_or_else(|| RoutingError::order_not_found(&id))?;
    Ok(success(order))
}
