//! 脚本执行器接口定义
//!
//! 执行器提供两种调用方式，二者共享同一个进程启动原语：
//!
//! - `trigger`: 启动后立即返回调用ID，结果只写日志
//! - `run`: 等待进程结束并返回 [`ExecutionOutcome`]
//!
//! 调度器和 HTTP 层都只依赖此接口，测试中可以替换为记录调用的实现。

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::ScriptResult;
use crate::models::{ExecutionOutcome, InvocationContext, RuntimeKind, ScriptDescriptor};

#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    /// 启动脚本但不等待结果
    async fn trigger(
        &self,
        descriptor: &ScriptDescriptor,
        context: InvocationContext,
    ) -> ScriptResult<Uuid>;

    /// 启动脚本并等待最终结果
    ///
    /// 脚本的非零退出码不是错误，包含在结果中返回。
    async fn run(
        &self,
        descriptor: &ScriptDescriptor,
        context: InvocationContext,
    ) -> ScriptResult<ExecutionOutcome>;

    /// 是否存在该运行时的启动器
    fn supports_runtime(&self, kind: &RuntimeKind) -> bool;
}
