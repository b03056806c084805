use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::routes::AppState;

/// 健康检查，附带路由队列积压数；队列不可达时返回 503
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let queue = state.intake.routing_queue();
    match state.queue.get_queue_size(queue).await {
        Ok(depth) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "service": "dispatch-router",
                "version": env!("CARGO_PKG_VERSION"),
                "routingQueueDepth": depth
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "degraded",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "service": "dispatch-router",
                "version": env!("CARGO_PKG_VERSION"),
                "error": e.to_string()
            })),
        ),
    }
}
