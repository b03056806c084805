pub mod api_observability;
pub mod app_config;
pub mod database;
pub mod message_queue;
pub mod routing;
pub mod worker;

pub use api_observability::{ApiConfig, ObservabilityConfig};
pub use app_config::AppConfig;
pub use database::DatabaseConfig;
pub use message_queue::{MessageQueueConfig, MessageQueueType};
pub use routing::RoutingConfig;
pub use worker::WorkerConfig;
