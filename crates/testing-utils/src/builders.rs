//! Test data builders for creating orders and branches
//!
//! Defaults place everything around a fixed city centre so distances in tests
//! stay readable.

use chrono::Utc;
use routing_core::geo::GeoPoint;
use routing_core::models::{Branch, Order, OrderMode, OrderStatus, RoutingStep};

use crate::helpers::CITY_CENTRE;

/// Builder for creating test Order entities
pub struct OrderBuilder {
    order: Order,
}

impl OrderBuilder {
    pub fn new() -> Self {
        Self {
            order: Order::new_delivery("order-1", CITY_CENTRE),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.order.id = id.to_string();
        self
    }

    pub fn with_mode(mut self, mode: OrderMode) -> Self {
        self.order.mode = mode;
        if !mode.requires_distance_routing() {
            self.order.customer_location = None;
        }
        self
    }

    pub fn with_customer_location(mut self, location: GeoPoint) -> Self {
        self.order.customer_location = Some(location);
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.order.status = status;
        self
    }

    pub fn with_branch(mut self, branch_id: &str) -> Self {
        self.order.branch_id = Some(branch_id.to_string());
        self
    }

    pub fn with_original_branch(mut self, branch_id: &str) -> Self {
        self.order.branch_id_original = Some(branch_id.to_string());
        self
    }

    pub fn reassigned(mut self) -> Self {
        self.order.is_reassigned = true;
        self
    }

    pub fn with_routing_attempts(mut self, attempts: i32) -> Self {
        self.order.routing_attempts = attempts;
        self
    }

    pub fn with_routing_log(mut self, log: Vec<RoutingStep>) -> Self {
        self.order.routing_log = log;
        self
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.order.version = version;
        self
    }

    pub fn with_last_request(mut self, request_id: &str) -> Self {
        self.order.last_routing_request_id = Some(request_id.to_string());
        if !self.order.has_applied(request_id) {
            self.order.applied_request_ids.push(request_id.to_string());
        }
        self
    }

    pub fn build(mut self) -> Order {
        self.order.updated_at = Utc::now();
        self.order
    }
}

impl Default for OrderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test Branch entities
pub struct BranchBuilder {
    branch: Branch,
}

impl BranchBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            branch: Branch {
                id: id.to_string(),
                name: format!("Branch {id}"),
                latitude: CITY_CENTRE.latitude,
                longitude: CITY_CENTRE.longitude,
                is_active: true,
                is_closed: false,
            },
        }
    }

    pub fn at(mut self, location: GeoPoint) -> Self {
        self.branch.latitude = location.latitude;
        self.branch.longitude = location.longitude;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.branch.name = name.to_string();
        self
    }

    pub fn closed(mut self) -> Self {
        self.branch.is_closed = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.branch.is_active = false;
        self
    }

    pub fn build(self) -> Branch {
        self.branch
    }
}
