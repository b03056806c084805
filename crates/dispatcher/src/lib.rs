//! 订单路由决策
//!
//! - [`eligibility`] 半径升级与候选排序
//! - [`engine`] 路由状态机：读取、决策、条件落库、通知

pub mod eligibility;
pub mod engine;

pub use eligibility::{BranchCandidate, Eligibility, RadiusPolicy, RadiusTier};
pub use engine::{RoutingDecisionEngine, RoutingOutcome};
