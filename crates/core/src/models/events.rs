use serde::{Deserialize, Serialize};

use super::OrderStatus;

/// 推送给门店的订单负载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDispatch {
    pub order_id: String,
    pub status: OrderStatus,
    pub distance_km: Option<f64>,
}

/// 门店房间事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum BranchEvent {
    /// 门店第一次收到该订单
    #[serde(rename = "newOrderAssigned")]
    NewOrderAssigned(OrderDispatch),
    /// 门店已持有该订单，状态有变化
    #[serde(rename = "orderStatusUpdated")]
    OrderStatusUpdated(OrderDispatch),
}

impl BranchEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BranchEvent::NewOrderAssigned(_) => "newOrderAssigned",
            BranchEvent::OrderStatusUpdated(_) => "orderStatusUpdated",
        }
    }

    pub fn dispatch(&self) -> &OrderDispatch {
        match self {
            BranchEvent::NewOrderAssigned(dispatch) | BranchEvent::OrderStatusUpdated(dispatch) => {
                dispatch
            }
        }
    }
}

/// 门店房间名，与看板客户端约定
pub fn branch_room(branch_id: &str) -> String {
    format!("branch-{branch_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_format() {
        let event = BranchEvent::NewOrderAssigned(OrderDispatch {
            order_id: "o-1".to_string(),
            status: OrderStatus::Pending,
            distance_km: Some(4.2),
        });

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "event": "newOrderAssigned",
                "payload": {"orderId": "o-1", "status": "PENDING", "distanceKm": 4.2}
            })
        );
        assert_eq!(event.dispatch().order_id, "o-1");
    }

    #[test]
    fn test_branch_room_name() {
        assert_eq!(branch_room("B7"), "branch-B7");
    }
}
