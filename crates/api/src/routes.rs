use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use routing_core::traits::{
    BranchAdmin, BranchDirectory, BranchEventSource, MessageQueue, OrderRepository,
};

use crate::handlers::{
    branches::{list_branches, set_availability, upsert_branch},
    health::health_check,
    orders::{get_order, place_order},
    routing::request_routing,
};
use crate::services::{OrderPlacementService, RoutingIntakeService};
use crate::ws::branch_room_handler;

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<dyn OrderRepository>,
    pub branches: Arc<dyn BranchDirectory>,
    pub branch_admin: Arc<dyn BranchAdmin>,
    pub events: Arc<dyn BranchEventSource>,
    pub queue: Arc<dyn MessageQueue>,
    pub intake: Arc<RoutingIntakeService>,
    pub placement: Arc<OrderPlacementService>,
}

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        // 订单
        .route("/api/orders", post(place_order))
        .route("/api/orders/{id}", get(get_order))
        // 路由/改派
        .route("/api/routing", post(request_routing))
        // 门店
        .route("/api/branches", get(list_branches).post(upsert_branch))
        .route("/api/branches/{id}/availability", put(set_availability))
        // 门店房间
        .route("/ws/branches/{id}", get(branch_room_handler))
        .with_state(state)
}
