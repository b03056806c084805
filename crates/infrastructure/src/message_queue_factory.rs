use std::sync::Arc;
use tracing::{debug, info};

use routing_core::config::{MessageQueueConfig, MessageQueueType};
use routing_core::traits::MessageQueue;
use routing_core::{RoutingError, RoutingResult};

use crate::{InMemoryMessageQueue, RabbitMQMessageQueue};

pub struct MessageQueueFactory;

impl MessageQueueFactory {
    pub async fn create(config: &MessageQueueConfig) -> RoutingResult<Arc<dyn MessageQueue>> {
        debug!("Creating message queue with type: {:?}", config.r#type);
        Self::validate_config(config)?;

        let queue: Arc<dyn MessageQueue> = match config.r#type {
            MessageQueueType::Rabbitmq => {
                info!("Initializing RabbitMQ message queue");
                Arc::new(RabbitMQMessageQueue::new(config.clone()).await?)
            }
            MessageQueueType::InMemory => {
                info!("Initializing in-memory message queue");
                Arc::new(InMemoryMessageQueue::new())
            }
        };

        queue.create_queue(&config.routing_queue, true).await?;
        queue.create_queue(&config.dead_letter_queue, true).await?;
        Ok(queue)
    }

    pub fn validate_config(config: &MessageQueueConfig) -> RoutingResult<()> {
        config
            .validate()
            .map_err(|e| RoutingError::Configuration(format!("{e:#}")))
    }

    pub fn get_type_string(queue_type: &MessageQueueType) -> &'static str {
        match queue_type {
            MessageQueueType::Rabbitmq => "rabbitmq",
            MessageQueueType::InMemory => "in_memory",
        }
    }

    pub fn parse_type_string(type_str: &str) -> RoutingResult<MessageQueueType> {
        match type_str.to_lowercase().as_str() {
            "rabbitmq" => Ok(MessageQueueType::Rabbitmq),
            "in_memory" => Ok(MessageQueueType::InMemory),
            _ => Err(RoutingError::Configuration(format!(
                "不支持的消息队列类型: {type_str}，支持的类型: rabbitmq, in_memory"
            ))),
        }
    }
}
