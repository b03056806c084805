use std::sync::Arc;

use metrics::counter;
use routing_core::geo::GeoPoint;
use routing_core::models::{Message, OrderStatus, RetryPolicy, RoutingRequest};
use routing_core::traits::MessageQueue;
use routing_core::{RoutingError, RoutingResult};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// 路由/改派请求体，字段缺失在校验阶段报错
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingTrigger {
    pub order_id: Option<String>,
    pub customer_latitude: Option<f64>,
    pub customer_longitude: Option<f64>,
    #[serde(default)]
    pub is_reassign: bool,
}

/// 受理回执
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingAck {
    pub status: OrderStatus,
    pub order_id: String,
}

/// 路由受理：校验后入队，立即返回
pub struct RoutingIntakeService {
    queue: Arc<dyn MessageQueue>,
    routing_queue: String,
    retry_policy: RetryPolicy,
}

impl RoutingIntakeService {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        routing_queue: impl Into<String>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            queue,
            routing_queue: routing_queue.into(),
            retry_policy,
        }
    }

    pub fn routing_queue(&self) -> &str {
        &self.routing_queue
    }

    /// 校验请求并转换为队列负载
    pub fn validate(trigger: &RoutingTrigger) -> RoutingResult<RoutingRequest> {
        let order_id = trigger
            .order_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RoutingError::invalid_request("orderId 不能为空"))?;

        let (latitude, longitude) = match (trigger.customer_latitude, trigger.customer_longitude)
        {
            (Some(lat), Some(lng)) => (lat, lng),
            _ => {
                return Err(RoutingError::invalid_request(
                    "customerLatitude 和 customerLongitude 必须提供",
                ))
            }
        };

        if !GeoPoint::new(latitude, longitude).is_valid() {
            return Err(RoutingError::invalid_request(format!(
                "顾客坐标超出范围: ({latitude}, {longitude})"
            )));
        }

        Ok(RoutingRequest {
            order_id: order_id.to_string(),
            customer_latitude: latitude,
            customer_longitude: longitude,
            is_reassign: trigger.is_reassign,
        })
    }

    /// 受理一次路由请求，不等待路由结果
    #[instrument(skip(self, trigger), fields(order_id = ?trigger.order_id, is_reassign = trigger.is_reassign))]
    pub async fn enqueue(&self, trigger: &RoutingTrigger) -> RoutingResult<RoutingAck> {
        let request = Self::validate(trigger)?;
        self.enqueue_request(request).await
    }

    pub(crate) async fn enqueue_request(&self, request: RoutingRequest) -> RoutingResult<RoutingAck> {
        let order_id = request.order_id.clone();
        let message = Message::routing_request_with_policy(request, self.retry_policy);

        self.queue
            .publish_message(&self.routing_queue, &message)
            .await?;
        counter!("routing_requests_enqueued_total").increment(1);

        info!(
            "订单 {} 的路由请求已入队: message_id={}",
            order_id, message.id
        );

        Ok(RoutingAck {
            status: OrderStatus::Routing,
            order_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger(order_id: &str, lat: f64, lng: f64) -> RoutingTrigger {
        RoutingTrigger {
            order_id: Some(order_id.to_string()),
            customer_latitude: Some(lat),
            customer_longitude: Some(lng),
            is_reassign: false,
        }
    }

    #[test]
    fn test_validate_accepts_boundary_coordinates() {
        let request = RoutingIntakeService::validate(&trigger("o-1", 90.0, -180.0)).unwrap();
        assert_eq!(request.order_id, "o-1");
        assert!(!request.is_reassign);
    }

    #[test]
    fn test_validate_rejects_blank_order_id() {
        let err = RoutingIntakeService::validate(&trigger("   ", 25.0, 55.0)).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidRequest(_)));
    }

    #[test]
    fn test_validate_rejects_out_of_range_and_missing() {
        assert!(RoutingIntakeService::validate(&trigger("o-1", 90.5, 0.0)).is_err());
        assert!(RoutingIntakeService::validate(&trigger("o-1", 0.0, 180.1)).is_err());
        assert!(RoutingIntakeService::validate(&trigger("o-1", f64::NAN, 0.0)).is_err());

        let missing = RoutingTrigger {
            order_id: Some("o-1".to_string()),
            customer_latitude: Some(25.0),
            ..Default::default()
        };
        assert!(RoutingIntakeService::validate(&missing).is_err());
    }

    #[test]
    fn test_ack_serializes_as_routing() {
        let ack = RoutingAck {
            status: OrderStatus::Routing,
            order_id: "o-1".to_string(),
        };
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json["status"], "ROUTING");
        assert_eq!(json["orderId"], "o-1");
    }
}
