use thiserror::Error;

/// 脚本运行时错误类型定义
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("脚本未找到: {id}")]
    NotFound { id: String },

    #[error("不支持的运行时类型: {kind}")]
    UnsupportedRuntime { kind: String },

    #[error("启动脚本进程失败: {0}")]
    SpawnFailure(String),

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    #[error("脚本执行超时: {id} ({timeout_ms}ms)")]
    TimeoutExceeded { id: String, timeout_ms: u64 },

    #[error("脚本ID重复: {id}")]
    DuplicateIdentifier { id: String },

    #[error("脚本未开启Webhook: {id}")]
    WebhookDisabled { id: String },

    #[error("无效的调用参数: {0}")]
    InvalidArgument(String),

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl ScriptError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// 调用方输入导致的错误（可直接返回给客户端）
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::UnsupportedRuntime { .. }
                | Self::InvalidCron { .. }
                | Self::DuplicateIdentifier { .. }
                | Self::WebhookDisabled { .. }
                | Self::InvalidArgument(_)
        )
    }
}

impl From<std::io::Error> for ScriptError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ScriptError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// 统一的Result类型
pub type ScriptResult<T> = std::result::Result<T, ScriptError>;
