use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::RoutingError;
use crate::geo::GeoPoint;

/// 订单履约方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OrderMode {
    #[serde(rename = "DELIVERY")]
    Delivery,
    #[serde(rename = "PICKUP")]
    Pickup,
    #[serde(rename = "DINE_IN")]
    DineIn,
}

impl OrderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderMode::Delivery => "DELIVERY",
            OrderMode::Pickup => "PICKUP",
            OrderMode::DineIn => "DINE_IN",
        }
    }

    /// 只有外送订单需要按距离计算门店
    pub fn requires_distance_routing(&self) -> bool {
        matches!(self, OrderMode::Delivery)
    }
}

impl FromStr for OrderMode {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DELIVERY" => Ok(OrderMode::Delivery),
            "PICKUP" => Ok(OrderMode::Pickup),
            "DINE_IN" => Ok(OrderMode::DineIn),
            _ => Err(RoutingError::Serialization(format!(
                "Invalid order mode: {s}"
            ))),
        }
    }
}

impl fmt::Display for OrderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 订单状态
///
/// 路由引擎只会写入 `Pending` 和 `Scheduled`，其余状态属于后厨流程。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    #[serde(rename = "ROUTING")]
    Routing,
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "SCHEDULED")]
    Scheduled,
    #[serde(rename = "CONFIRMED")]
    Confirmed,
    #[serde(rename = "PREPARING")]
    Preparing,
    #[serde(rename = "READY")]
    Ready,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Routing => "ROUTING",
            OrderStatus::Pending => "PENDING",
            OrderStatus::Scheduled => "SCHEDULED",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Ready => "READY",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// 路由引擎允许写入的状态
    pub fn is_routing_outcome(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Scheduled)
    }
}

impl FromStr for OrderStatus {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ROUTING" => Ok(OrderStatus::Routing),
            "PENDING" => Ok(OrderStatus::Pending),
            "SCHEDULED" => Ok(OrderStatus::Scheduled),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "PREPARING" => Ok(OrderStatus::Preparing),
            "READY" => Ok(OrderStatus::Ready),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            _ => Err(RoutingError::Serialization(format!(
                "Invalid order status: {s}"
            ))),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 路由审计日志中的单个步骤
///
/// 以 `step` 字段作为标签序列化，例如
/// `{"step":"radius_expand","newRadius":35.0}`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum RoutingStep {
    FindBranches {
        radius: f64,
    },
    RadiusExpand {
        #[serde(rename = "newRadius")]
        new_radius: f64,
    },
    AssignNearest {
        #[serde(rename = "branchId")]
        branch_id: String,
        #[serde(rename = "distanceKm")]
        distance_km: f64,
    },
    BranchClosedCheck {
        #[serde(rename = "branchId")]
        branch_id: String,
    },
    ReassignNextOpen {
        #[serde(rename = "branchId")]
        branch_id: String,
    },
    AllClosedScheduled {
        #[serde(rename = "branchId")]
        branch_id: String,
    },
    BranchAssigned {
        #[serde(rename = "branchId")]
        branch_id: String,
    },
}

impl RoutingStep {
    pub fn name(&self) -> &'static str {
        match self {
            RoutingStep::FindBranches { .. } => "find_branches",
            RoutingStep::RadiusExpand { .. } => "radius_expand",
            RoutingStep::AssignNearest { .. } => "assign_nearest",
            RoutingStep::BranchClosedCheck { .. } => "branch_closed_check",
            RoutingStep::ReassignNextOpen { .. } => "reassign_next_open",
            RoutingStep::AllClosedScheduled { .. } => "all_closed_scheduled",
            RoutingStep::BranchAssigned { .. } => "branch_assigned",
        }
    }
}

/// 订单（路由相关字段）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub mode: OrderMode,
    pub customer_location: Option<GeoPoint>,
    pub status: OrderStatus,
    pub branch_id: Option<String>,
    pub branch_id_original: Option<String>,
    pub is_reassigned: bool,
    pub is_long_distance: bool,
    pub radius_used_km: f64,
    pub routing_attempts: i32,
    pub routing_log: Vec<RoutingStep>,
    /// 乐观并发控制版本号，每次写入加一
    pub version: i64,
    /// 最近一次成功落库的路由请求ID
    pub last_routing_request_id: Option<String>,
    /// 所有已落库的路由请求ID，重复投递据此去重
    #[serde(default)]
    pub applied_request_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// 新建外送订单，等待首次路由
    pub fn new_delivery(id: impl Into<String>, customer_location: GeoPoint) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            mode: OrderMode::Delivery,
            customer_location: Some(customer_location),
            status: OrderStatus::Routing,
            branch_id: None,
            branch_id_original: None,
            is_reassigned: false,
            is_long_distance: false,
            radius_used_km: 0.0,
            routing_attempts: 0,
            routing_log: Vec::new(),
            version: 0,
            last_routing_request_id: None,
            applied_request_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// 新建自取/堂食订单，门店由顾客选定
    pub fn new_at_branch(id: impl Into<String>, mode: OrderMode, branch_id: impl Into<String>) -> Self {
        let now = Utc::now();
        let branch_id = branch_id.into();
        Self {
            id: id.into(),
            mode,
            customer_location: None,
            status: OrderStatus::Pending,
            branch_id: Some(branch_id.clone()),
            branch_id_original: Some(branch_id),
            is_reassigned: false,
            is_long_distance: false,
            radius_used_km: 0.0,
            routing_attempts: 0,
            routing_log: Vec::new(),
            version: 0,
            last_routing_request_id: None,
            applied_request_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// 该路由请求是否已经落库过
    pub fn has_applied(&self, request_id: &str) -> bool {
        self.applied_request_ids.iter().any(|id| id == request_id)
    }

    pub fn entity_description(&self) -> String {
        format!("订单 {} ({})", self.id, self.mode)
    }
}

/// 一次路由决策需要落库的字段
///
/// 仓储以单条条件更新语句应用：`version` 不匹配时整体失败，
/// `branch_id_original` 仅在为空时写入，`is_reassigned` 只会置位。
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingUpdate {
    pub status: OrderStatus,
    pub branch_id: Option<String>,
    pub branch_id_original: Option<String>,
    pub radius_used_km: Option<f64>,
    pub is_long_distance: Option<bool>,
    pub mark_reassigned: bool,
    pub increment_attempts: bool,
    pub routing_log: Vec<RoutingStep>,
    pub request_id: String,
}

impl RoutingUpdate {
    /// 将更新应用到内存中的订单副本，与仓储的SQL语义保持一致
    pub fn apply_to(&self, order: &mut Order) {
        order.status = self.status;
        if let Some(branch_id) = &self.branch_id {
            order.branch_id = Some(branch_id.clone());
        }
        if order.branch_id_original.is_none() {
            order.branch_id_original = self.branch_id_original.clone();
        }
        if let Some(radius) = self.radius_used_km {
            order.radius_used_km = radius;
        }
        if let Some(long_distance) = self.is_long_distance {
            order.is_long_distance = long_distance;
        }
        order.is_reassigned = order.is_reassigned || self.mark_reassigned;
        if self.increment_attempts {
            order.routing_attempts += 1;
        }
        order.routing_log = self.routing_log.clone();
        order.last_routing_request_id = Some(self.request_id.clone());
        if !order.has_applied(&self.request_id) {
            order.applied_request_ids.push(self.request_id.clone());
        }
        order.version += 1;
        order.updated_at = Utc::now();
    }
}
