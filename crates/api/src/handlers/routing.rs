use axum::{extract::State, response::IntoResponse, Json};

use crate::{error::ApiResult, response::accepted, routes::AppState, services::RoutingTrigger};

/// 触发路由或改派，立即返回 `ROUTING`
pub async fn request_routing(
    State(state): State<AppState>,
    Json(trigger): Json<RoutingTrigger>,
) -> ApiResult<impl IntoResponse> {
    let ack = state.intake.enqueue(&trigger).await?;
    Ok(accepted(ack))
}
