//! # Scriptd Core
//!
//! 脚本运行时的核心类型：错误定义、数据模型、协作者接口、配置与结构化日志。

pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use errors::*;
pub use logging::StructuredLogger;
pub use models::{
    ExecutionOutcome, ExitState, InvocationContext, RuntimeKind, ScriptDescriptor, ScriptSummary,
};
pub use traits::{ScriptExecutor, ScriptStore};
