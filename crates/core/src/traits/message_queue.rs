use std::time::Duration;

use async_trait::async_trait;

use crate::{errors::RoutingResult, models::Message};

/// 消息队列抽象接口
///
/// 至少一次投递：消费出的消息在 `ack_message` 之前处于未确认状态。
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// 发布消息到指定队列
    async fn publish_message(&self, queue: &str, message: &Message) -> RoutingResult<()>;

    /// 延迟 `delay` 后将消息投递到指定队列
    async fn publish_delayed(
        &self,
        queue: &str,
        message: &Message,
        delay: Duration,
    ) -> RoutingResult<()>;

    /// 从指定队列消费消息
    async fn consume_messages(&self, queue: &str) -> RoutingResult<Vec<Message>>;

    /// 确认消息处理完成
    async fn ack_message(&self, message_id: &str) -> RoutingResult<()>;

    /// 拒绝消息，`requeue` 为 true 时立即重新入队
    async fn nack_message(&self, message_id: &str, requeue: bool) -> RoutingResult<()>;

    /// 创建队列
    async fn create_queue(&self, queue: &str, durable: bool) -> RoutingResult<()>;

    /// 获取队列中的消息数量
    async fn get_queue_size(&self, queue: &str) -> RoutingResult<u32>;

    /// 清空队列
    async fn purge_queue(&self, queue: &str) -> RoutingResult<()>;
}
