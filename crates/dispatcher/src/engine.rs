//! 路由决策引擎
//!
//! 每次路由消费一条 `RoutingRequest`：读取订单和门店目录快照，计算结果，
//! 以一次条件更新落库，然后通知门店。任何一步失败都以 `RoutingError`
//! 返回给队列消费者，由其决定重试还是进入死信。

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, info, instrument, warn};

use routing_core::geo::GeoPoint;
use routing_core::models::{
    BranchEvent, Order, OrderDispatch, OrderStatus, RoutingRequest, RoutingStep, RoutingUpdate,
};
use routing_core::traits::{BranchDirectory, DispatchNotifier, OrderRepository};
use routing_core::{RoutingError, RoutingResult};

use crate::eligibility::{select_eligible, RadiusPolicy, RadiusTier};

/// 一次路由的结果
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingOutcome {
    /// 按距离分配到门店，订单进入 `PENDING`
    Assigned {
        branch_id: String,
        distance_km: f64,
        radius_used_km: f64,
    },
    /// 自取/堂食订单，直接确认到预设门店
    FixedBranch { branch_id: String },
    /// 所有候选门店都暂停接单，订单进入 `SCHEDULED`
    Scheduled { branch_id: String },
    /// 同一请求已经落库过，本次投递不做任何写入
    AlreadyApplied,
}

impl RoutingOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RoutingOutcome::Assigned { .. } => "assigned",
            RoutingOutcome::FixedBranch { .. } => "fixed_branch",
            RoutingOutcome::Scheduled { .. } => "scheduled",
            RoutingOutcome::AlreadyApplied => "already_applied",
        }
    }
}

pub struct RoutingDecisionEngine {
    orders: Arc<dyn OrderRepository>,
    directory: Arc<dyn BranchDirectory>,
    notifier: Arc<dyn DispatchNotifier>,
    policy: RadiusPolicy,
}

impl RoutingDecisionEngine {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        directory: Arc<dyn BranchDirectory>,
        notifier: Arc<dyn DispatchNotifier>,
        policy: RadiusPolicy,
    ) -> Self {
        Self {
            orders,
            directory,
            notifier,
            policy,
        }
    }

    pub fn policy(&self) -> &RadiusPolicy {
        &self.policy
    }

    /// 执行一次路由
    ///
    /// `request_id` 在同一请求的所有重投中保持不变，用于识别已落库的重复投递。
    #[instrument(skip(self, request), fields(order_id = %request.order_id, is_reassign = request.is_reassign))]
    pub async fn route(
        &self,
        request: &RoutingRequest,
        request_id: &str,
    ) -> RoutingResult<RoutingOutcome> {
        let order = self
            .orders
            .find_by_id(&request.order_id)
            .await?
            .ok_or_else(|| RoutingError::order_not_found(&request.order_id))?;

        if order.has_applied(request_id) {
            info!("订单 {} 的路由请求 {} 已处理过，跳过", order.id, request_id);
            counter!("routing_passes_total", "outcome" => "already_applied").increment(1);
            return Ok(RoutingOutcome::AlreadyApplied);
        }

        let outcome = if order.mode.requires_distance_routing() {
            self.route_delivery(&order, request, request_id).await?
        } else {
            self.confirm_fixed_branch(&order, request_id).await?
        };

        counter!("routing_passes_total", "outcome" => outcome.label()).increment(1);
        Ok(outcome)
    }

    /// 自取/堂食：不计算距离，不增加路由次数
    async fn confirm_fixed_branch(
        &self,
        order: &Order,
        request_id: &str,
    ) -> RoutingResult<RoutingOutcome> {
        let branch_id = order.branch_id.clone().ok_or_else(|| {
            RoutingError::MissingBranchAssignment {
                order_id: order.id.clone(),
            }
        })?;

        info!("订单 {} 为 {}，已绑定门店 {}，置为 PENDING", order.id, order.mode, branch_id);

        let update = RoutingUpdate {
            status: OrderStatus::Pending,
            branch_id: None,
            branch_id_original: Some(branch_id.clone()),
            radius_used_km: None,
            is_long_distance: None,
            mark_reassigned: false,
            increment_attempts: false,
            routing_log: order.routing_log.clone(),
            request_id: request_id.to_string(),
        };
        self.orders
            .apply_routing_update(&order.id, order.version, &update)
            .await?;

        let event = dispatch_event(order, &branch_id, None);
        self.notify(&branch_id, event).await;

        Ok(RoutingOutcome::FixedBranch { branch_id })
    }

    async fn route_delivery(
        &self,
        order: &Order,
        request: &RoutingRequest,
        request_id: &str,
    ) -> RoutingResult<RoutingOutcome> {
        let customer = GeoPoint::new(request.customer_latitude, request.customer_longitude);
        if !customer.is_valid() {
            return Err(RoutingError::invalid_request(format!(
                "订单 {} 的顾客坐标无效: ({}, {})",
                order.id, request.customer_latitude, request.customer_longitude
            )));
        }

        let mut routing_log = order.routing_log.clone();
        routing_log.push(RoutingStep::FindBranches {
            radius: self.policy.primary_km,
        });

        let branches: Vec<_> = self
            .directory
            .list_active_branches()
            .await?
            .into_iter()
            .filter(|b| b.is_active)
            .collect();
        debug!("订单 {} 获取到 {} 个营业中的门店", order.id, branches.len());

        let eligibility = select_eligible(customer, branches, &self.policy)?;

        match eligibility.tier {
            RadiusTier::Primary => {}
            RadiusTier::Expanded => {
                warn!(
                    "订单 {} 在 {}km 内没有门店，扩大到 {}km",
                    order.id, self.policy.primary_km, self.policy.expanded_km
                );
                routing_log.push(RoutingStep::RadiusExpand {
                    new_radius: self.policy.expanded_km,
                });
            }
            RadiusTier::NearestFallback => {
                warn!(
                    "订单 {} 在 {}km 内仍没有门店，分配不限距离的最近门店",
                    order.id, self.policy.expanded_km
                );
                routing_log.push(RoutingStep::RadiusExpand {
                    new_radius: self.policy.expanded_km,
                });
                let nearest = eligibility.nearest();
                routing_log.push(RoutingStep::AssignNearest {
                    branch_id: nearest.branch.id.clone(),
                    distance_km: nearest.distance_km,
                });
            }
        }

        let nearest = eligibility.nearest();
        let target = if nearest.branch.is_closed {
            routing_log.push(RoutingStep::BranchClosedCheck {
                branch_id: nearest.branch.id.clone(),
            });
            match eligibility.first_open() {
                Some(open) => {
                    routing_log.push(RoutingStep::ReassignNextOpen {
                        branch_id: open.branch.id.clone(),
                    });
                    open
                }
                None => {
                    return self
                        .schedule_all_closed(
                            order,
                            &nearest.branch.id,
                            eligibility.radius_used_km,
                            routing_log,
                            request_id,
                        )
                        .await;
                }
            }
        } else {
            nearest
        };

        routing_log.push(RoutingStep::BranchAssigned {
            branch_id: target.branch.id.clone(),
        });

        let update = RoutingUpdate {
            status: OrderStatus::Pending,
            branch_id: Some(target.branch.id.clone()),
            branch_id_original: Some(target.branch.id.clone()),
            radius_used_km: Some(eligibility.radius_used_km),
            is_long_distance: Some(target.distance_km > self.policy.primary_km),
            mark_reassigned: request.is_reassign,
            increment_attempts: true,
            routing_log,
            request_id: request_id.to_string(),
        };
        self.orders
            .apply_routing_update(&order.id, order.version, &update)
            .await?;

        info!(
            "订单 {} 分配到门店 {} ({:.2}km)，状态 PENDING",
            order.id, target.branch.name, target.distance_km
        );

        let event = dispatch_event(order, &target.branch.id, Some(target.distance_km));
        self.notify(&target.branch.id, event).await;

        Ok(RoutingOutcome::Assigned {
            branch_id: target.branch.id.clone(),
            distance_km: target.distance_km,
            radius_used_km: eligibility.radius_used_km,
        })
    }

    /// 所有候选门店都暂停接单：记录最近门店并置为 `SCHEDULED`，不通知
    async fn schedule_all_closed(
        &self,
        order: &Order,
        nearest_branch_id: &str,
        radius_used_km: f64,
        mut routing_log: Vec<RoutingStep>,
        request_id: &str,
    ) -> RoutingResult<RoutingOutcome> {
        info!("订单 {} 的所有候选门店都已暂停接单，转为 SCHEDULED", order.id);
        routing_log.push(RoutingStep::AllClosedScheduled {
            branch_id: nearest_branch_id.to_string(),
        });

        let update = RoutingUpdate {
            status: OrderStatus::Scheduled,
            branch_id: Some(nearest_branch_id.to_string()),
            branch_id_original: None,
            radius_used_km: Some(radius_used_km),
            is_long_distance: None,
            mark_reassigned: false,
            increment_attempts: true,
            routing_log,
            request_id: request_id.to_string(),
        };
        self.orders
            .apply_routing_update(&order.id, order.version, &update)
            .await?;

        Ok(RoutingOutcome::Scheduled {
            branch_id: nearest_branch_id.to_string(),
        })
    }

    /// 尽力通知，失败只记录
    async fn notify(&self, branch_id: &str, event: BranchEvent) {
        let name = event.name();
        if let Err(e) = self.notifier.publish(branch_id, event).await {
            warn!("通知门店 {} 事件 {} 失败: {}", branch_id, name, e);
            counter!("routing_notifications_failed_total").increment(1);
        }
    }
}

/// 门店已经以 PENDING 持有该订单时发送状态更新，否则视为新订单
fn dispatch_event(order: &Order, branch_id: &str, distance_km: Option<f64>) -> BranchEvent {
    let dispatch = OrderDispatch {
        order_id: order.id.clone(),
        status: OrderStatus::Pending,
        distance_km,
    };
    let already_held = order.status == OrderStatus::Pending
        && order.branch_id.as_deref() == Some(branch_id);
    if already_held {
        BranchEvent::OrderStatusUpdated(dispatch)
    } else {
        BranchEvent::NewOrderAssigned(dispatch)
    }
}
