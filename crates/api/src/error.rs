use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use routing_core::RoutingError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("路由错误: {0}")]
    Routing(#[from] RoutingError),

    #[error("内部服务器错误: {0}")]
    Internal(String),

    #[error("未找到资源")]
    NotFound,

    #[error("请求参数错误: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, String, &'static str, Vec<String>) {
        match self {
            ApiError::Routing(RoutingError::OrderNotFound { id }) => (
                StatusCode::NOT_FOUND,
                format!("订单 {id} 不存在"),
                "ORDER_NOT_FOUND",
                vec!["请检查订单ID是否正确".to_string()],
            ),
            ApiError::Routing(RoutingError::BranchNotFound { id }) => (
                StatusCode::NOT_FOUND,
                format!("门店 {id} 不存在"),
                "BRANCH_NOT_FOUND",
                vec![
                    "请检查门店ID是否正确".to_string(),
                    "使用 GET /api/branches 查看营业中的门店".to_string(),
                ],
            ),
            ApiError::Routing(RoutingError::InvalidRequest(msg)) => (
                StatusCode::BAD_REQUEST,
                msg.clone(),
                "INVALID_REQUEST",
                vec![
                    "orderId 不能为空".to_string(),
                    "customerLatitude 取值 [-90, 90]，customerLongitude 取值 [-180, 180]"
                        .to_string(),
                ],
            ),
            ApiError::Routing(RoutingError::MissingBranchAssignment { order_id }) => (
                StatusCode::BAD_REQUEST,
                format!("订单 {order_id} 缺少门店"),
                "MISSING_BRANCH",
                vec!["自取和堂食订单必须提供 branchId".to_string()],
            ),
            ApiError::Routing(RoutingError::ConcurrentModification { order_id, .. }) => (
                StatusCode::CONFLICT,
                format!("订单 {order_id} 正在被修改"),
                "CONFLICT",
                vec!["请刷新订单状态后重试".to_string()],
            ),
            ApiError::Routing(
                e @ (RoutingError::MessageQueue(_)
                | RoutingError::Database(_)
                | RoutingError::DirectoryUnavailable(_)),
            ) => (
                StatusCode::SERVICE_UNAVAILABLE,
                e.to_string(),
                "SERVICE_UNAVAILABLE",
                vec![
                    "依赖服务暂时不可用，请稍后重试".to_string(),
                    "查看 GET /health 检查系统状态".to_string(),
                ],
            ),
            ApiError::Routing(_) | ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "系统内部错误".to_string(),
                "INTERNAL_ERROR",
                vec![
                    "系统遇到内部错误，请稍后重试".to_string(),
                    "如果问题持续存在，请联系系统管理员".to_string(),
                ],
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "请求的资源不存在".to_string(),
                "NOT_FOUND",
                vec!["请检查请求URL是否正确".to_string()],
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                format!("请求参数错误: {msg}"),
                "BAD_REQUEST",
                vec!["请检查请求格式和参数".to_string()],
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, error_type, suggestions) = self.parts();

        if status.is_server_error() {
            tracing::error!("请求处理失败: {}", self);
        }

        let body = Json(json!({
            "error": {
                "message": error_message,
                "type": error_type,
                "code": status.as_u16(),
                "suggestions": suggestions,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_error_conversion() {
        let api_error: ApiError = RoutingError::order_not_found("o-1").into();
        assert!(matches!(
            api_error,
            ApiError::Routing(RoutingError::OrderNotFound { ref id }) if id == "o-1"
        ));
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (RoutingError::order_not_found("o-1"), StatusCode::NOT_FOUND),
            (RoutingError::branch_not_found("b-1"), StatusCode::NOT_FOUND),
            (RoutingError::invalid_request("bad"), StatusCode::BAD_REQUEST),
            (
                RoutingError::MissingBranchAssignment {
                    order_id: "o-1".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                RoutingError::MessageQueue("down".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                RoutingError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(ApiError::from(error).into_response().status(), status);
        }
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(ApiError::NotFound.to_string(), "未找到资源");
    }
}
