//! 订单路由核心
//!
//! 错误类型、数据模型、仓储/队列/通知接口、距离计算与配置。

pub mod config;
pub mod errors;
pub mod geo;
pub mod logging;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use errors::{RoutingError, RoutingResult};
pub use geo::{distance_km, GeoPoint};
pub use logging::init_logging;
pub use traits::{BranchAdmin, BranchDirectory, BranchEventSource, DispatchNotifier, MessageQueue, OrderRepository};
