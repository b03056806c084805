use std::sync::Arc;

use routing_core::models::{
    BranchEvent, Order, OrderDispatch, OrderMode, OrderStatus, RoutingRequest,
};
use routing_core::traits::{DispatchNotifier, OrderRepository};
use routing_core::{GeoPoint, RoutingError, RoutingResult};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::intake::{RoutingIntakeService, RoutingTrigger};

/// 下单请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    /// 缺省时生成
    pub order_id: Option<String>,
    pub mode: OrderMode,
    pub customer_latitude: Option<f64>,
    pub customer_longitude: Option<f64>,
    /// 自取/堂食必填
    pub branch_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub order_id: String,
    pub status: OrderStatus,
    pub branch_id: Option<String>,
}

/// 下单
///
/// 外送订单以 `ROUTING` 落库并入队；自取/堂食订单直接绑定顾客选择的门店，
/// 以 `PENDING` 落库并通知门店，不经过路由队列。
///
/// 外送订单落库后入队失败时，用同一 `orderId` 再次下单会补发路由请求，
/// 前提是订单仍未被路由过。
pub struct OrderPlacementService {
    orders: Arc<dyn OrderRepository>,
    notifier: Arc<dyn DispatchNotifier>,
    intake: Arc<RoutingIntakeService>,
}

impl OrderPlacementService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        notifier: Arc<dyn DispatchNotifier>,
        intake: Arc<RoutingIntakeService>,
    ) -> Self {
        Self {
            orders,
            notifier,
            intake,
        }
    }

    #[instrument(skip(self, request), fields(mode = %request.mode))]
    pub async fn place(&self, request: PlaceOrderRequest) -> RoutingResult<PlacedOrder> {
        let order_id = match request.order_id.as_deref().map(str::trim) {
            Some("") => return Err(RoutingError::invalid_request("orderId 不能为空")),
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };

        if request.mode.requires_distance_routing() {
            self.place_delivery(order_id, &request).await
        } else {
            self.place_at_branch(order_id, &request).await
        }
    }

    async fn place_delivery(
        &self,
        order_id: String,
        request: &PlaceOrderRequest,
    ) -> RoutingResult<PlacedOrder> {
        let routing_request: RoutingRequest = RoutingIntakeService::validate(&RoutingTrigger {
            order_id: Some(order_id.clone()),
            customer_latitude: request.customer_latitude,
            customer_longitude: request.customer_longitude,
            is_reassign: false,
        })?;

        let location = GeoPoint::new(
            routing_request.customer_latitude,
            routing_request.customer_longitude,
        );
        let order = match self
            .orders
            .create(&Order::new_delivery(order_id.clone(), location))
            .await
        {
            Ok(order) => order,
            Err(RoutingError::InvalidRequest(reason)) => {
                // 上次下单已落库但入队失败时，同一订单重复下单会补发路由请求
                let existing = self.orders.find_by_id(&order_id).await?;
                match existing {
                    Some(order) if Self::awaiting_first_routing(&order) => {
                        warn!("外送订单 {} 已存在但尚未路由，重新入队", order.id);
                        order
                    }
                    _ => return Err(RoutingError::InvalidRequest(reason)),
                }
            }
            Err(e) => return Err(e),
        };

        let ack = match self.intake.enqueue_request(routing_request).await {
            Ok(ack) => ack,
            Err(e) => {
                error!(
                    order_id = %order.id,
                    "外送订单已落库但路由请求入队失败，订单停留在 ROUTING: {}。\
                     重复下单或调用 POST /api/routing 可重新入队",
                    e
                );
                return Err(e);
            }
        };
        info!("外送订单 {} 已创建，等待路由", order.id);

        Ok(PlacedOrder {
            order_id: ack.order_id,
            status: ack.status,
            branch_id: None,
        })
    }

    /// 外送订单还没有被任何一次路由处理过
    fn awaiting_first_routing(order: &Order) -> bool {
        order.mode.requires_distance_routing()
            && order.status == OrderStatus::Routing
            && order.routing_attempts == 0
            && order.applied_request_ids.is_empty()
    }

    async fn place_at_branch(
        &self,
        order_id: String,
        request: &PlaceOrderRequest,
    ) -> RoutingResult<PlacedOrder> {
        let branch_id = request
            .branch_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RoutingError::MissingBranchAssignment {
                order_id: order_id.clone(),
            })?
            .to_string();

        let order = self
            .orders
            .create(&Order::new_at_branch(order_id, request.mode, branch_id.clone()))
            .await?;

        let event = BranchEvent::NewOrderAssigned(OrderDispatch {
            order_id: order.id.clone(),
            status: OrderStatus::Pending,
            distance_km: None,
        });
        if let Err(e) = self.notifier.publish(&branch_id, event).await {
            warn!("通知门店 {} 新订单 {} 失败: {}", branch_id, order.id, e);
        }

        info!("{} 订单 {} 已绑定门店 {}", order.mode, order.id, branch_id);
        Ok(PlacedOrder {
            order_id: order.id,
            status: order.status,
            branch_id: Some(branch_id),
        })
    }
}
