use async_trait::async_trait;
use routing_core::models::Message;
use routing_core::traits::MessageQueue;
use routing_core::{RoutingError, RoutingResult};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// 内存消息队列实现
///
/// 使用 Tokio channels 实现，适用于单进程部署和测试。消费出的消息进入
/// 未确认集合，`ack_message` 后才真正移除；`nack_message(requeue = true)`
/// 会把消息放回原队列。
#[derive(Debug, Clone)]
pub struct InMemoryMessageQueue {
    /// 队列存储：队列名 -> 通道
    queues: Arc<RwLock<HashMap<String, QueueChannels>>>,
    /// 未确认消息：消息ID -> 按投递顺序排列的 (队列名, 消息)
    in_flight: Arc<Mutex<HashMap<String, VecDeque<(String, Message)>>>>,
    config: InMemoryQueueConfig,
}

#[derive(Debug, Clone)]
struct QueueChannels {
    sender: mpsc::UnboundedSender<Message>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<Message>>>,
    size: Arc<AtomicU32>,
    durable: bool,
}

#[derive(Debug, Clone)]
pub struct InMemoryQueueConfig {
    /// 单次消费最多取出的消息数
    pub max_batch_size: usize,
}

impl Default for InMemoryQueueConfig {
    fn default() -> Self {
        Self { max_batch_size: 64 }
    }
}

impl InMemoryMessageQueue {
    /// 创建新的内存消息队列实例
    pub fn new() -> Self {
        Self::with_config(InMemoryQueueConfig::default())
    }

    /// 使用指定配置创建内存消息队列实例
    pub fn with_config(config: InMemoryQueueConfig) -> Self {
        info!("Creating in-memory message queue with config: {:?}", config);
        Self {
            queues: Arc::new(RwLock::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    /// 获取或创建队列通道
    async fn get_or_create_queue(&self, queue_name: &str, durable: bool) -> QueueChannels {
        if let Some(channels) = self.queues.read().await.get(queue_name) {
            return channels.clone();
        }

        let mut queues = self.queues.write().await;
        queues
            .entry(queue_name.to_string())
            .or_insert_with(|| {
                debug!("Creating new queue: {}", queue_name);
                let (sender, receiver) = mpsc::unbounded_channel();
                QueueChannels {
                    sender,
                    receiver: Arc::new(Mutex::new(receiver)),
                    size: Arc::new(AtomicU32::new(0)),
                    durable,
                }
            })
            .clone()
    }

    fn send(channels: &QueueChannels, queue: &str, message: Message) -> RoutingResult<()> {
        // 先计数再发送，消费端的扣减不会早于这里的增加
        channels.size.fetch_add(1, Ordering::Relaxed);
        channels.sender.send(message).map_err(|e| {
            channels.size.fetch_sub(1, Ordering::Relaxed);
            error!("Failed to send message to queue '{}': {}", queue, e);
            RoutingError::MessageQueue(format!("Failed to send message to queue '{queue}': {e}"))
        })
    }

    /// 未确认的消息数量
    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.values().map(VecDeque::len).sum()
    }
}

impl Default for InMemoryMessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn publish_message(&self, queue: &str, message: &Message) -> RoutingResult<()> {
        debug!("Publishing message to queue '{}': {}", queue, message.id);
        let channels = self.get_or_create_queue(queue, false).await;
        Self::send(&channels, queue, message.clone())
    }

    async fn publish_delayed(
        &self,
        queue: &str,
        message: &Message,
        delay: Duration,
    ) -> RoutingResult<()> {
        debug!(
            "Scheduling message {} for queue '{}' in {:?}",
            message.id, queue, delay
        );
        let channels = self.get_or_create_queue(queue, false).await;
        let queue = queue.to_string();
        let message = message.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = Self::send(&channels, &queue, message) {
                warn!("Delayed delivery to queue '{}' dropped: {}", queue, e);
            }
        });

        Ok(())
    }

    async fn consume_messages(&self, queue: &str) -> RoutingResult<Vec<Message>> {
        let channels = self.get_or_create_queue(queue, false).await;
        let mut messages = Vec::new();

        {
            let mut rx = channels.receiver.lock().await;
            while messages.len() < self.config.max_batch_size {
                match rx.try_recv() {
                    Ok(message) => messages.push(message),
                    Err(_) => break,
                }
            }
        }

        if !messages.is_empty() {
            channels
                .size
                .fetch_sub(messages.len() as u32, Ordering::Relaxed);

            let mut in_flight = self.in_flight.lock().await;
            for message in &messages {
                in_flight
                    .entry(message.id.clone())
                    .or_default()
                    .push_back((queue.to_string(), message.clone()));
            }
            debug!("Consumed {} messages from queue '{}'", messages.len(), queue);
        }

        Ok(messages)
    }

    async fn ack_message(&self, message_id: &str) -> RoutingResult<()> {
        debug!("Acknowledging message: {}", message_id);
        let mut in_flight = self.in_flight.lock().await;
        if let Some(deliveries) = in_flight.get_mut(message_id) {
            deliveries.pop_front();
            if deliveries.is_empty() {
                in_flight.remove(message_id);
            }
        } else {
            warn!("Ack for unknown message {}", message_id);
        }
        Ok(())
    }

    async fn nack_message(&self, message_id: &str, requeue: bool) -> RoutingResult<()> {
        debug!(
            "Negative acknowledging message: {} (requeue: {})",
            message_id, requeue
        );
        let delivery = {
            let mut in_flight = self.in_flight.lock().await;
            let delivery = in_flight
                .get_mut(message_id)
                .and_then(|deliveries| deliveries.pop_front());
            if in_flight.get(message_id).is_some_and(VecDeque::is_empty) {
                in_flight.remove(message_id);
            }
            delivery
        };

        match delivery {
            Some((queue, message)) if requeue => {
                let channels = self.get_or_create_queue(&queue, false).await;
                Self::send(&channels, &queue, message)
            }
            Some(_) => Ok(()),
            None => {
                warn!("Nack for unknown message {}", message_id);
                Ok(())
            }
        }
    }

    async fn create_queue(&self, queue: &str, durable: bool) -> RoutingResult<()> {
        let channels = self.get_or_create_queue(queue, durable).await;
        info!("Queue '{}' ready (durable: {})", queue, channels.durable);
        Ok(())
    }

    async fn get_queue_size(&self, queue: &str) -> RoutingResult<u32> {
        let queues = self.queues.read().await;
        let size = queues
            .get(queue)
            .map(|channels| channels.size.load(Ordering::Relaxed))
            .unwrap_or(0);

        debug!("Queue '{}' size: {}", queue, size);
        Ok(size)
    }

    async fn purge_queue(&self, queue: &str) -> RoutingResult<()> {
        info!("Purging queue '{}'", queue);
        let channels = self.get_or_create_queue(queue, false).await;
        let mut purged_count = 0;

        {
            let mut rx = channels.receiver.lock().await;
            while rx.try_recv().is_ok() {
                purged_count += 1;
            }
        }
        channels.size.store(0, Ordering::Relaxed);

        info!("Purged {} messages from queue '{}'", purged_count, queue);
        Ok(())
    }
}
