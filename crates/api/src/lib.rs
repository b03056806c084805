//! # Routing API
//!
//! 订单路由的HTTP入口，基于Axum。
//!
//! ## API 端点
//!
//! - `POST /api/orders` - 下单（外送订单入队路由，自取/堂食直接绑定门店）
//! - `GET /api/orders/{id}` - 查询订单路由状态
//! - `POST /api/routing` - 触发路由或改派，返回 202
//! - `GET /api/branches` - 营业中的门店
//! - `POST /api/branches` - 新增或更新门店
//! - `PUT /api/branches/{id}/availability` - 暂停/恢复接单
//! - `GET /ws/branches/{id}` - 门店房间 WebSocket
//! - `GET /health` - 健康检查

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod services;
pub mod ws;

use axum::Router;
use tower::ServiceBuilder;

use middleware::{cors_layer, request_logging, trace_layer};
use routes::create_routes;
use routing_core::config::ApiConfig;

pub use error::{ApiError, ApiResult};
pub use routes::AppState;
pub use services::{OrderPlacementService, RoutingIntakeService};

/// 创建完整的API应用
pub fn create_app(state: AppState, api_config: &ApiConfig) -> Router {
    let router = create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(axum::middleware::from_fn(request_logging)),
    );

    if api_config.cors_enabled {
        router.layer(cors_layer(&api_config.cors_origins))
    } else {
        router
    }
}
