//! 路由队列消费者：轮询、重试退避与死信

pub mod service;

pub use service::{Disposition, WorkerService, WorkerServiceBuilder};
