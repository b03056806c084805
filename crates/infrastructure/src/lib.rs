pub mod database;
pub mod in_memory_queue;
pub mod message_queue;
pub mod message_queue_factory;
pub mod notifier;
pub mod observability;

pub use database::{create_sqlite_pool, init_schema, SqliteBranchDirectory, SqliteOrderRepository};
pub use in_memory_queue::{InMemoryMessageQueue, InMemoryQueueConfig};
pub use message_queue::RabbitMQMessageQueue;
pub use message_queue_factory::MessageQueueFactory;
pub use notifier::BroadcastNotifier;
pub use observability::{describe_metrics, init_metrics};
