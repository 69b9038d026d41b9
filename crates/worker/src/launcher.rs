use std::path::Path;
use std::process::Stdio;

use scriptd_core::{RuntimeKind, ScriptError, ScriptResult};
use tokio::process::Command;

/// 进程启动器
///
/// 根据运行时类型构造子进程命令。入口文件路径之后依次追加调用参数，
/// 三个标准流全部通过管道接入。
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    interpreter: String,
}

impl ProcessLauncher {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }

    pub fn supports(&self, kind: &RuntimeKind) -> bool {
        matches!(kind, RuntimeKind::ManagedScriptProcess)
    }

    pub fn command(
        &self,
        kind: &RuntimeKind,
        entrypoint: &Path,
        working_dir: &Path,
        args: &[String],
    ) -> ScriptResult<Command> {
        match kind {
            RuntimeKind::ManagedScriptProcess => {
                let mut cmd = Command::new(&self.interpreter);
                cmd.arg(entrypoint)
                    .args(args)
                    .current_dir(working_dir)
                    .stdin(Stdio::piped())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .kill_on_drop(true);
                Ok(cmd)
            }
            RuntimeKind::Other(kind) => Err(ScriptError::UnsupportedRuntime { kind: kind.clone() }),
        }
    }
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self::new("sh")
    }
}
