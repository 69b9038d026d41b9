//! # 数据模型
//!
//! 脚本运行时的核心数据结构。
//!
//! - [`ScriptDescriptor`]: 持久化的脚本元数据
//! - [`InvocationContext`]: 单次调用的参数与消息
//! - [`ExecutionOutcome`]: 单次调用的最终结果
//!
//! 所有模型都实现了 `serde` 序列化；描述符以 camelCase 字段名写入 `script.json`。

pub mod invocation;
pub mod script;

pub use invocation::{render_argument, ExecutionOutcome, ExitState, InvocationContext};
pub use script::{RuntimeKind, ScriptDescriptor, ScriptSummary, DEFAULT_TIMEOUT_MS};
