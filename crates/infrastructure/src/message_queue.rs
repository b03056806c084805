use async_trait::async_trait;
use lapin::{
    options::*,
    publisher_confirm::Confirmation,
    types::{AMQPValue, FieldTable},
    BasicProperties, Channel, Connection, ConnectionProperties, Queue,
};
use routing_core::{
    config::MessageQueueConfig, models::Message, traits::MessageQueue, RoutingError,
    RoutingResult,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 单次 `consume_messages` 最多拉取的消息数
const MAX_BATCH_SIZE: usize = 32;

/// RabbitMQ消息队列实现
///
/// 消费使用 `basic_get` 手动确认，`delivery_tag` 按消息ID记录，
/// ack/nack 时取出对应的标签。延迟投递使用按延迟时长命名的重试队列：
/// 消息在其中过期后经默认交换机死信回目标队列。
pub struct RabbitMQMessageQueue {
    connection: Connection,
    channel: Arc<Mutex<Channel>>,
    config: MessageQueueConfig,
    delivery_tags: Arc<Mutex<HashMap<String, VecDeque<u64>>>>,
}

impl RabbitMQMessageQueue {
    /// 创建新的RabbitMQ消息队列实例
    pub async fn new(config: MessageQueueConfig) -> RoutingResult<Self> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default())
            .await
            .map_err(|e| RoutingError::MessageQueue(format!("连接RabbitMQ失败: {e}")))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| RoutingError::MessageQueue(format!("创建通道失败: {e}")))?;

        // 开启发布确认，否则 confirm 永远返回 NotRequested
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| RoutingError::MessageQueue(format!("开启发布确认失败: {e}")))?;

        info!("成功连接到RabbitMQ: {}", config.url);

        let queue = Self {
            connection,
            channel: Arc::new(Mutex::new(channel)),
            config,
            delivery_tags: Arc::new(Mutex::new(HashMap::new())),
        };

        queue.initialize_queues().await?;

        Ok(queue)
    }

    /// 初始化路由队列和死信队列
    async fn initialize_queues(&self) -> RoutingResult<()> {
        let channel = self.channel.lock().await;

        Self::declare_queue(&channel, &self.config.routing_queue, true, FieldTable::default())
            .await?;
        Self::declare_queue(
            &channel,
            &self.config.dead_letter_queue,
            true,
            FieldTable::default(),
        )
        .await?;

        info!("所有队列初始化完成");
        Ok(())
    }

    /// 声明队列
    async fn declare_queue(
        channel: &Channel,
        queue_name: &str,
        durable: bool,
        arguments: FieldTable,
    ) -> RoutingResult<Queue> {
        let queue = channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                arguments,
            )
            .await
            .map_err(|e| {
                RoutingError::MessageQueue(format!("声明队列 {queue_name} 失败: {e}"))
            })?;

        debug!("队列 {} 声明成功", queue_name);
        Ok(queue)
    }

    /// 延迟 `delay` 后死信回 `target` 的重试队列名
    fn retry_queue_name(target: &str, delay: Duration) -> String {
        format!("{}.retry.{}ms", target, delay.as_millis())
    }

    async fn publish_to(&self, channel: &Channel, queue: &str, message: &Message) -> RoutingResult<()> {
        let payload = message.serialize_bytes()?;

        let confirm = channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_delivery_mode(2) // 2 = persistent
                    .with_message_id(message.id.as_str().into()),
            )
            .await
            .map_err(|e| {
                RoutingError::MessageQueue(format!("发布消息到队列 {queue} 失败: {e}"))
            })?;

        let confirmation = confirm
            .await
            .map_err(|e| RoutingError::MessageQueue(format!("消息发布确认失败: {e}")))?;

        Self::check_confirmation(queue, &message.id, confirmation)
    }

    /// 只有 broker 明确 ack 才算发布成功
    fn check_confirmation(
        queue: &str,
        message_id: &str,
        confirmation: Confirmation,
    ) -> RoutingResult<()> {
        match confirmation {
            Confirmation::Ack(_) => Ok(()),
            Confirmation::Nack(_) => Err(RoutingError::MessageQueue(format!(
                "broker拒绝了发往队列 {queue} 的消息 {message_id}"
            ))),
            Confirmation::NotRequested => Err(RoutingError::MessageQueue(format!(
                "通道未开启发布确认，无法确认消息 {message_id} 已写入队列 {queue}"
            ))),
        }
    }

    async fn take_delivery_tag(&self, message_id: &str) -> Option<u64> {
        let mut tags = self.delivery_tags.lock().await;
        let tag = tags.get_mut(message_id).and_then(VecDeque::pop_front);
        if tags.get(message_id).is_some_and(VecDeque::is_empty) {
            tags.remove(message_id);
        }
        tag
    }

    /// 获取连接状态
    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }

    /// 关闭连接
    pub async fn close(&self) -> RoutingResult<()> {
        self.connection
            .close(200, "正常关闭")
            .await
            .map_err(|e| RoutingError::MessageQueue(format!("关闭连接失败: {e}")))?;

        info!("RabbitMQ连接已关闭");
        Ok(())
    }
}

#[async_trait]
impl MessageQueue for RabbitMQMessageQueue {
    async fn publish_message(&self, queue: &str, message: &Message) -> RoutingResult<()> {
        let channel = self.channel.lock().await;
        self.publish_to(&channel, queue, message).await?;
        debug!("消息 {} 已发布到队列: {}", message.id, queue);
        Ok(())
    }

    async fn publish_delayed(
        &self,
        queue: &str,
        message: &Message,
        delay: Duration,
    ) -> RoutingResult<()> {
        let retry_queue = Self::retry_queue_name(queue, delay);
        let ttl_ms = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);

        let mut arguments = FieldTable::default();
        arguments.insert("x-message-ttl".into(), AMQPValue::LongUInt(ttl_ms));
        arguments.insert(
            "x-dead-letter-exchange".into(),
            AMQPValue::LongString("".into()),
        );
        arguments.insert(
            "x-dead-letter-routing-key".into(),
            AMQPValue::LongString(queue.into()),
        );

        let channel = self.channel.lock().await;
        Self::declare_queue(&channel, &retry_queue, true, arguments).await?;
        self.publish_to(&channel, &retry_queue, message).await?;

        debug!(
            "消息 {} 将在 {}ms 后重新投递到队列 {}",
            message.id, ttl_ms, queue
        );
        Ok(())
    }

    async fn consume_messages(&self, queue: &str) -> RoutingResult<Vec<Message>> {
        let channel = self.channel.lock().await;
        let mut messages = Vec::new();

        while messages.len() < MAX_BATCH_SIZE {
            let get_result = channel
                .basic_get(queue, BasicGetOptions { no_ack: false })
                .await;

            let delivery = match get_result {
                Ok(Some(message)) => message.delivery,
                Ok(None) => break,
                Err(e) => {
                    let error_msg = e.to_string();
                    if error_msg.contains("NOT_FOUND") || error_msg.contains("404") {
                        debug!("队列 {} 不存在，返回空结果", queue);
                        break;
                    }
                    return Err(RoutingError::MessageQueue(format!(
                        "从队列 {queue} 获取消息失败: {e}"
                    )));
                }
            };

            match Message::deserialize_bytes(&delivery.data) {
                Ok(message) => {
                    self.delivery_tags
                        .lock()
                        .await
                        .entry(message.id.clone())
                        .or_default()
                        .push_back(delivery.delivery_tag);
                    messages.push(message);
                }
                Err(e) => {
                    warn!("丢弃无法解析的消息 (队列 {}): {}", queue, e);
                    channel
                        .basic_nack(
                            delivery.delivery_tag,
                            BasicNackOptions {
                                requeue: false,
                                ..Default::default()
                            },
                        )
                        .await
                        .map_err(|e| {
                            RoutingError::MessageQueue(format!("拒绝消息失败: {e}"))
                        })?;
                }
            }
        }

        Ok(messages)
    }

    async fn ack_message(&self, message_id: &str) -> RoutingResult<()> {
        let Some(tag) = self.take_delivery_tag(message_id).await else {
            warn!("确认未知消息: {}", message_id);
            return Ok(());
        };

        let channel = self.channel.lock().await;
        channel
            .basic_ack(tag, BasicAckOptions::default())
            .await
            .map_err(|e| RoutingError::MessageQueue(format!("确认消息失败: {e}")))?;

        debug!("确认消息: {}", message_id);
        Ok(())
    }

    async fn nack_message(&self, message_id: &str, requeue: bool) -> RoutingResult<()> {
        let Some(tag) = self.take_delivery_tag(message_id).await else {
            warn!("拒绝未知消息: {}", message_id);
            return Ok(());
        };

        let channel = self.channel.lock().await;
        channel
            .basic_nack(
                tag,
                BasicNackOptions {
                    requeue,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| RoutingError::MessageQueue(format!("拒绝消息失败: {e}")))?;

        debug!("拒绝消息: {}, 重新入队: {}", message_id, requeue);
        Ok(())
    }

    async fn create_queue(&self, queue: &str, durable: bool) -> RoutingResult<()> {
        let channel = self.channel.lock().await;
        Self::declare_queue(&channel, queue, durable, FieldTable::default()).await?;
        Ok(())
    }

    async fn get_queue_size(&self, queue: &str) -> RoutingResult<u32> {
        let channel = self.channel.lock().await;
        let queue_info = channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    passive: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await;

        match queue_info {
            Ok(info) => Ok(info.message_count()),
            Err(e) => {
                let error_msg = e.to_string();
                if error_msg.contains("NOT_FOUND") || error_msg.contains("404") {
                    debug!("队列 {} 不存在，返回大小为0", queue);
                    Ok(0)
                } else {
                    Err(RoutingError::MessageQueue(format!(
                        "获取队列 {queue} 信息失败: {e}"
                    )))
                }
            }
        }
    }

    async fn purge_queue(&self, queue: &str) -> RoutingResult<()> {
        let channel = self.channel.lock().await;
        channel
            .queue_purge(queue, QueuePurgeOptions::default())
            .await
            .map_err(|e| RoutingError::MessageQueue(format!("清空队列 {queue} 失败: {e}")))?;

        debug!("队列 {} 已清空", queue);
        Ok(())
    }
}
