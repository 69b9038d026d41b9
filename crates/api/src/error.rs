use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use scriptd_core::ScriptError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Script(#[from] ScriptError),

    #[error("验证错误: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("未认证")]
    Unauthorized,

    #[error("内部服务器错误: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Script(err) => match err {
                ScriptError::NotFound { .. } => StatusCode::NOT_FOUND,
                ScriptError::WebhookDisabled { .. }
                | ScriptError::InvalidCron { .. }
                | ScriptError::UnsupportedRuntime { .. }
                | ScriptError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                ScriptError::DuplicateIdentifier { .. } => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Script(err) => match err {
                ScriptError::NotFound { .. } => "SCRIPT_NOT_FOUND",
                ScriptError::WebhookDisabled { .. } => "WEBHOOK_DISABLED",
                ScriptError::InvalidCron { .. } => "INVALID_CRON_EXPRESSION",
                ScriptError::UnsupportedRuntime { .. } => "UNSUPPORTED_RUNTIME",
                ScriptError::InvalidArgument(_) => "INVALID_ARGUMENT",
                ScriptError::DuplicateIdentifier { .. } => "DUPLICATE_IDENTIFIER",
                ScriptError::SpawnFailure(_) => "SPAWN_FAILURE",
                ScriptError::TimeoutExceeded { .. } => "TIMEOUT_EXCEEDED",
                ScriptError::Storage(_) => "STORAGE_ERROR",
                _ => "INTERNAL_ERROR",
            },
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Validation(errors) => {
                let details: Vec<String> = errors
                    .field_errors()
                    .iter()
                    .map(|(field, errors)| {
                        let messages: Vec<String> = errors
                            .iter()
                            .map(|e| {
                                e.message
                                    .as_ref()
                                    .map(|m| m.to_string())
                                    .unwrap_or_else(|| "验证失败".to_string())
                            })
                            .collect();
                        format!("{}: {}", field, messages.join(", "))
                    })
                    .collect();
                format!("请求参数验证失败: {}", details.join("; "))
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("请求处理失败: {}", self);
        }

        let body = Json(json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": self.message(),
                "status": status.as_u16(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        let mut response = (status, body).into_response();
        if matches!(self, ApiError::Unauthorized) {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"scriptd\""),
            );
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
