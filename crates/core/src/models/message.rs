use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 路由请求负载
///
/// 同一请求的重复投递携带完全相同的内容和消息ID。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRequest {
    pub order_id: String,
    pub customer_latitude: f64,
    pub customer_longitude: f64,
    #[serde(default)]
    pub is_reassign: bool,
}

/// 重试次数耗尽或不可重试失败后写入死信队列的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterRecord {
    pub original: RoutingRequest,
    pub message_id: String,
    pub attempts: u32,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// 队列消息重试策略
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次尝试失败后的退避时长：`base * 2^(attempt-1)`
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay_ms.saturating_mul(1u64 << exponent)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessageType {
    RoutingRequest(RoutingRequest),
    DeadLetter(DeadLetterRecord),
}

/// 队列消息信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub message_type: MessageType,
    pub timestamp: DateTime<Utc>,
    /// 当前是第几次投递，从 1 开始
    pub attempt: u32,
    pub retry_policy: RetryPolicy,
    pub correlation_id: Option<String>,
}

impl Message {
    pub fn routing_request(request: RoutingRequest) -> Self {
        Self::routing_request_with_policy(request, RetryPolicy::default())
    }

    pub fn routing_request_with_policy(request: RoutingRequest, retry_policy: RetryPolicy) -> Self {
        let correlation_id = Some(request.order_id.clone());
        Self {
            id: Uuid::new_v4().to_string(),
            message_type: MessageType::RoutingRequest(request),
            timestamp: Utc::now(),
            attempt: 1,
            retry_policy,
            correlation_id,
        }
    }

    pub fn dead_letter(record: DeadLetterRecord) -> Self {
        let correlation_id = Some(record.original.order_id.clone());
        Self {
            id: Uuid::new_v4().to_string(),
            message_type: MessageType::DeadLetter(record),
            timestamp: Utc::now(),
            attempt: 1,
            retry_policy: RetryPolicy::default(),
            correlation_id,
        }
    }

    /// 下一次投递：保留消息ID和负载，只增加投递计数
    pub fn next_attempt(&self) -> Self {
        let mut next = self.clone();
        next.attempt += 1;
        next.timestamp = Utc::now();
        next
    }

    pub fn with_correlation_id(mut self, correlation_id: String) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn is_retry_exhausted(&self) -> bool {
        self.attempt >= self.retry_policy.max_attempts
    }

    pub fn serialize(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn deserialize(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn serialize_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn deserialize_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn message_type_str(&self) -> &'static str {
        match &self.message_type {
            MessageType::RoutingRequest(_) => "routing_request",
            MessageType::DeadLetter(_) => "dead_letter",
        }
    }

    pub fn as_routing_request(&self) -> Option<&RoutingRequest> {
        match &self.message_type {
            MessageType::RoutingRequest(request) => Some(request),
            MessageType::DeadLetter(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RoutingRequest {
        RoutingRequest {
            order_id: "o-1".to_string(),
            customer_latitude: 25.2,
            customer_longitude: 55.27,
            is_reassign: false,
        }
    }

    #[test]
    fn test_backoff_doubles_from_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_ms(1), 1000);
        assert_eq!(policy.backoff_ms(2), 2000);
        assert_eq!(policy.backoff_ms(3), 4000);
    }

    #[test]
    fn test_next_attempt_keeps_identity() {
        let message = Message::routing_request(request());
        let next = message.next_attempt();

        assert_eq!(next.id, message.id);
        assert_eq!(next.attempt, 2);
        assert_eq!(next.as_routing_request(), Some(&request()));
        assert!(!next.is_retry_exhausted());
        assert!(next.next_attempt().is_retry_exhausted());
    }

    #[test]
    fn test_request_wire_format() {
        let json = r#"{"orderId":"o-9","customerLatitude":1.5,"customerLongitude":-2.5}"#;
        let parsed: RoutingRequest = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.order_id, "o-9");
        assert!(!parsed.is_reassign);
    }

    #[test]
    fn test_message_bytes_round_trip() {
        let message = Message::routing_request(request());
        let bytes = message.serialize_bytes().unwrap();
        let decoded = Message::deserialize_bytes(&bytes).unwrap();

        assert_eq!(decoded.id, message.id);
        assert_eq!(decoded.message_type_str(), "routing_request");
        assert_eq!(decoded.correlation_id.as_deref(), Some("o-1"));
    }
}
