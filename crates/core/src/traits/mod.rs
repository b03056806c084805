pub mod message_queue;
pub mod notifier;
pub mod repository;

pub use message_queue::*;
pub use notifier::*;
pub use repository::*;
