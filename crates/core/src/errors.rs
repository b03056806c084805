use thiserror::Error;

/// 路由引擎错误类型定义
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("数据库错误: {0}")]
    Database(String),

    #[error("订单未找到: {id}")]
    OrderNotFound { id: String },

    #[error("门店未找到: {id}")]
    BranchNotFound { id: String },

    #[error("门店目录不可用: {0}")]
    DirectoryUnavailable(String),

    #[error("没有任何可用的门店")]
    NoActiveBranches,

    #[error("订单 {order_id} 缺少预设门店")]
    MissingBranchAssignment { order_id: String },

    #[error("订单 {order_id} 已被并发修改 (期望版本 {expected_version})")]
    ConcurrentModification {
        order_id: String,
        expected_version: i64,
    },

    #[error("无效的路由请求: {0}")]
    InvalidRequest(String),

    #[error("消息队列错误: {0}")]
    MessageQueue(String),

    #[error("通知发送失败: {0}")]
    Notification(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl RoutingError {
    pub fn order_not_found<S: Into<String>>(id: S) -> Self {
        Self::OrderNotFound { id: id.into() }
    }

    pub fn branch_not_found<S: Into<String>>(id: S) -> Self {
        Self::BranchNotFound { id: id.into() }
    }

    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn directory_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::DirectoryUnavailable(msg.into())
    }

    pub fn concurrent_modification<S: Into<String>>(order_id: S, expected_version: i64) -> Self {
        Self::ConcurrentModification {
            order_id: order_id.into(),
            expected_version,
        }
    }

    /// 是否值得交给队列退避重试
    ///
    /// `OrderNotFound` 每次重投都会得到相同结果，因此直接进入死信，
    /// 不消耗剩余的重试次数。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RoutingError::Database(_)
                | RoutingError::DirectoryUnavailable(_)
                | RoutingError::ConcurrentModification { .. }
                | RoutingError::MessageQueue(_)
        )
    }

    /// 需要运维介入的环境类错误
    pub fn requires_operator(&self) -> bool {
        matches!(
            self,
            RoutingError::NoActiveBranches
                | RoutingError::MissingBranchAssignment { .. }
                | RoutingError::Configuration(_)
        )
    }

    /// 用于日志和指标标签的简短错误码
    pub fn code(&self) -> &'static str {
        match self {
            RoutingError::Database(_) => "database",
            RoutingError::OrderNotFound { .. } => "order_not_found",
            RoutingError::BranchNotFound { .. } => "branch_not_found",
            RoutingError::DirectoryUnavailable(_) => "directory_unavailable",
            RoutingError::NoActiveBranches => "no_active_branches",
            RoutingError::MissingBranchAssignment { .. } => "missing_branch_assignment",
            RoutingError::ConcurrentModification { .. } => "concurrent_modification",
            RoutingError::InvalidRequest(_) => "invalid_request",
            RoutingError::MessageQueue(_) => "message_queue",
            RoutingError::Notification(_) => "notification",
            RoutingError::Serialization(_) => "serialization",
            RoutingError::Configuration(_) => "configuration",
            RoutingError::Internal(_) => "internal",
        }
    }
}

impl From<sqlx::Error> for RoutingError {
    fn from(err: sqlx::Error) -> Self {
        RoutingError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for RoutingError {
    fn from(err: serde_json::Error) -> Self {
        RoutingError::Serialization(err.to_string())
    }
}

/// 统一的Result类型
pub type RoutingResult<T> = std::result::Result<T, RoutingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(RoutingError::Database("connection reset".into()).is_retryable());
        assert!(RoutingError::directory_unavailable("timeout").is_retryable());
        assert!(RoutingError::concurrent_modification("o-1", 3).is_retryable());

        assert!(!RoutingError::order_not_found("o-1").is_retryable());
        assert!(!RoutingError::NoActiveBranches.is_retryable());
        assert!(!RoutingError::invalid_request("bad").is_retryable());
        assert!(!RoutingError::Notification("closed".into()).is_retryable());
    }

    #[test]
    fn test_operator_errors() {
        assert!(RoutingError::NoActiveBranches.requires_operator());
        assert!(RoutingError::MissingBranchAssignment {
            order_id: "o-1".into()
        }
        .requires_operator());
        assert!(!RoutingError::order_not_found("o-1").requires_operator());
    }

    #[test]
    fn test_error_display() {
        let err = RoutingError::order_not_found("o-42");
        assert_eq!(err.to_string(), "订单未找到: o-42");
        assert_eq!(err.code(), "order_not_found");
    }

    #[test]
    fn test_from_serde_error() {
        let err: RoutingError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, RoutingError::Serialization(_)));
    }
}
