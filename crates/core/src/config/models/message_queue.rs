use serde::{Deserialize, Serialize};

use crate::models::RetryPolicy;

/// Message queue type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageQueueType {
    Rabbitmq,
    #[default]
    InMemory,
}

/// Message queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageQueueConfig {
    #[serde(rename = "type", default)]
    pub r#type: MessageQueueType,
    #[serde(default)]
    pub url: String,
    pub routing_queue: String,
    pub dead_letter_queue: String,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    /// 退避时长的随机抖动比例，0 表示严格按 `base * 2^(n-1)`
    pub jitter_factor: f64,
    pub connection_timeout_seconds: u64,
}

impl Default for MessageQueueConfig {
    fn default() -> Self {
        Self {
            r#type: MessageQueueType::InMemory,
            url: String::new(),
            routing_queue: "order-routing".to_string(),
            dead_letter_queue: "order-routing.dead-letter".to_string(),
            max_attempts: 3,
            backoff_base_ms: 1000,
            jitter_factor: 0.0,
            connection_timeout_seconds: 30,
        }
    }
}

impl MessageQueueConfig {
    /// Validate message queue configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.routing_queue.is_empty() {
            return Err(anyhow::anyhow!("路由队列名称不能为空"));
        }

        if self.dead_letter_queue.is_empty() {
            return Err(anyhow::anyhow!("死信队列名称不能为空"));
        }

        if self.routing_queue == self.dead_letter_queue {
            return Err(anyhow::anyhow!("路由队列不能与死信队列同名"));
        }

        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!("最大投递次数必须大于0"));
        }

        if self.backoff_base_ms == 0 {
            return Err(anyhow::anyhow!("退避基础时长必须大于0"));
        }

        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(anyhow::anyhow!("抖动比例必须在0到1之间"));
        }

        if self.r#type == MessageQueueType::Rabbitmq {
            self.validate_rabbitmq_config()?;
        }

        Ok(())
    }

    /// Validate RabbitMQ configuration
    fn validate_rabbitmq_config(&self) -> anyhow::Result<()> {
        if self.url.is_empty() {
            return Err(anyhow::anyhow!("RabbitMQ URL不能为空"));
        }

        if !self.url.starts_with("amqp://") && !self.url.starts_with("amqps://") {
            return Err(anyhow::anyhow!("RabbitMQ URL必须是AMQP格式"));
        }

        Ok(())
    }

    pub fn is_rabbitmq(&self) -> bool {
        self.r#type == MessageQueueType::Rabbitmq
    }

    /// 新消息携带的重试策略
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay_ms: self.backoff_base_ms,
        }
    }
}
