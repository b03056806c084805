//! # 数据模型
//!
//! 订单、门店、队列消息和门店事件。
//!
//! 所有时间字段使用 `DateTime<Utc>`，状态字段使用枚举，
//! 对外序列化格式与看板客户端和队列消费者保持一致。

pub mod branch;
pub mod events;
pub mod message;
pub mod order;

pub use branch::*;
pub use events::*;
pub use message::*;
pub use order::*;
