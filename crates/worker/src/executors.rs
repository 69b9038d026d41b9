use std::collections::HashMap;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use scriptd_core::{
    ExecutionOutcome, ExitState, InvocationContext, RuntimeKind, ScriptDescriptor, ScriptError,
    ScriptExecutor, ScriptResult, ScriptStore, StructuredLogger,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tokio::sync::{oneshot, RwLock};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::launcher::ProcessLauncher;
use crate::signal::{InvocationState, MarkerScanner};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// 脚本进程执行器
///
/// 每次调用启动一个独立子进程，由一个后台任务负责读取输出、处理 stdin 握手和超时。
/// 同一脚本的多次调用互不影响，也不会排队。
pub struct ProcessExecutor {
    launcher: ProcessLauncher,
    store: Arc<dyn ScriptStore>,
    max_output_bytes: usize,
    /// 正在运行的调用，调用ID到脚本ID
    running: Arc<RwLock<HashMap<Uuid, String>>>,
}

impl ProcessExecutor {
    pub fn new(launcher: ProcessLauncher, store: Arc<dyn ScriptStore>) -> Self {
        Self {
            launcher,
            store,
            max_output_bytes: 8 * 1024 * 1024,
            running: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_max_output_bytes(mut self, max_output_bytes: usize) -> Self {
        self.max_output_bytes = max_output_bytes.max(1);
        self
    }

    /// 启动一次调用，返回进程句柄
    ///
    /// 启动前检查运行时类型和入口文件；启动之后的所有失败都体现在结果中。
    pub async fn execute(
        &self,
        descriptor: &ScriptDescriptor,
        context: InvocationContext,
    ) -> ScriptResult<ProcessHandle> {
        if !self.launcher.supports(&descriptor.runtime_kind) {
            return Err(ScriptError::UnsupportedRuntime {
                kind: descriptor.runtime_kind.to_string(),
            });
        }

        let script_dir = self.store.script_dir(&descriptor.id);
        let entrypoint = descriptor.entrypoint_path(&script_dir)?;
        if let Err(e) = tokio::fs::metadata(&entrypoint).await {
            return Err(ScriptError::SpawnFailure(format!(
                "入口文件不可用 {}: {e}",
                entrypoint.display()
            )));
        }

        let mut cmd = self.launcher.command(
            &descriptor.runtime_kind,
            &entrypoint,
            &script_dir,
            &context.args,
        )?;
        let mut child = cmd.spawn().map_err(|e| {
            ScriptError::SpawnFailure(format!("启动脚本进程失败 {}: {e}", descriptor.id))
        })?;
        let deadline = tokio::time::Instant::now() + Duration::from_millis(descriptor.timeout_ms);

        let pipes = (child.stdin.take(), child.stdout.take(), child.stderr.take());
        let (stdin, stdout, stderr) = match pipes {
            (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
            _ => {
                let _ = child.start_kill();
                return Err(ScriptError::SpawnFailure("无法获取子进程标准流".to_string()));
            }
        };

        let invocation_id = Uuid::new_v4();
        let pid = child.id();
        self.running
            .write()
            .await
            .insert(invocation_id, descriptor.id.clone());
        let concurrent = self.running_count(&descriptor.id).await;
        if concurrent > 1 {
            debug!(
                "脚本 {} 当前有 {} 个调用同时运行",
                descriptor.id, concurrent
            );
        }
        StructuredLogger::log_invocation_started(&descriptor.id, invocation_id, pid, &context.args);

        let supervisor = Supervisor {
            invocation_id,
            script_id: descriptor.id.clone(),
            child,
            stdin: Some(stdin),
            stdout,
            stderr,
            payload: context.payload,
            deadline,
            max_output_bytes: self.max_output_bytes,
        };

        let (tx, rx) = oneshot::channel();
        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            let outcome = supervisor.run().await;
            running.write().await.remove(&outcome.invocation_id);
            StructuredLogger::log_invocation_completed(&outcome);
            // 接收端已丢弃说明是 trigger 调用，结果只记录日志
            let _ = tx.send(outcome);
        });

        Ok(ProcessHandle {
            invocation_id,
            script_id: descriptor.id.clone(),
            pid,
            outcome: rx,
        })
    }

    /// 某个脚本正在运行的调用数
    pub async fn running_count(&self, script_id: &str) -> usize {
        self.running
            .read()
            .await
            .values()
            .filter(|id| id.as_str() == script_id)
            .count()
    }
}

#[async_trait]
impl ScriptExecutor for ProcessExecutor {
    async fn trigger(
        &self,
        descriptor: &ScriptDescriptor,
        context: InvocationContext,
    ) -> ScriptResult<Uuid> {
        match self.execute(descriptor, context).await {
            Ok(handle) => Ok(handle.detach()),
            Err(e) => {
                StructuredLogger::log_invocation_failed(&descriptor.id, &e);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        descriptor: &ScriptDescriptor,
        context: InvocationContext,
    ) -> ScriptResult<ExecutionOutcome> {
        let handle = match self.execute(descriptor, context).await {
            Ok(handle) => handle,
            Err(e) => {
                StructuredLogger::log_invocation_failed(&descriptor.id, &e);
                return Err(e);
            }
        };
        let outcome = handle.wait().await?;
        if let Some(err) = outcome.timeout_error(descriptor.timeout_ms) {
            warn!("{err}");
        }
        Ok(outcome)
    }

    fn supports_runtime(&self, kind: &RuntimeKind) -> bool {
        self.launcher.supports(kind)
    }
}

/// 进程句柄
///
/// `wait` 等待最终结果；`detach` 放弃结果，进程照常运行直至结束或超时。
#[derive(Debug)]
pub struct ProcessHandle {
    pub invocation_id: Uuid,
    pub script_id: String,
    pub pid: Option<u32>,
    outcome: oneshot::Receiver<ExecutionOutcome>,
}

impl ProcessHandle {
    pub async fn wait(self) -> ScriptResult<ExecutionOutcome> {
        self.outcome.await.map_err(|_| {
            ScriptError::Internal(format!("调用 {} 的监控任务异常退出", self.invocation_id))
        })
    }

    pub fn detach(self) -> Uuid {
        self.invocation_id
    }
}

/// 带上限的输出缓存
struct OutputBuffer {
    data: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl OutputBuffer {
    fn new(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            limit,
            truncated: false,
        }
    }

    fn extend(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.data.len());
        if chunk.len() > room {
            self.truncated = true;
        }
        self.data.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    fn into_string(self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// 单次调用的监控任务
struct Supervisor {
    invocation_id: Uuid,
    script_id: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: ChildStdout,
    stderr: ChildStderr,
    payload: Option<String>,
    deadline: tokio::time::Instant,
    max_output_bytes: usize,
}

impl Supervisor {
    async fn run(self) -> ExecutionOutcome {
        let Supervisor {
            invocation_id,
            script_id,
            mut child,
            mut stdin,
            mut stdout,
            mut stderr,
            payload,
            deadline,
            max_output_bytes,
        } = self;
        let started = Instant::now();

        let mut state = InvocationState::Spawned;
        let mut scanner = MarkerScanner::new();
        let mut out = OutputBuffer::new(max_output_bytes);
        let mut err = OutputBuffer::new(max_output_bytes);
        let mut out_chunk = vec![0u8; READ_CHUNK_SIZE];
        let mut err_chunk = vec![0u8; READ_CHUNK_SIZE];
        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut exit_status: Option<ExitStatus> = None;
        let mut wait_failed = false;
        let mut signal_sent = false;

        let timer = tokio::time::sleep_until(deadline);
        tokio::pin!(timer);

        loop {
            if (exit_status.is_some() || wait_failed) && !stdout_open && !stderr_open {
                break;
            }

            tokio::select! {
                read = stdout.read(&mut out_chunk), if stdout_open => match read {
                    Ok(0) => stdout_open = false,
                    Ok(n) => {
                        let chunk = &out_chunk[..n];
                        out.extend(chunk);
                        state = state.on_stdout();
                        if state == InvocationState::AwaitingSignal && scanner.observe(chunk) {
                            let (next, write) = state.on_marker();
                            state = next;
                            if write {
                                if let Some(stdin) = stdin.take() {
                                    send_payload(stdin, payload.as_deref(), &script_id, invocation_id);
                                    signal_sent = true;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!("读取stdout失败: invocation_id={invocation_id}, error={e}");
                        stdout_open = false;
                    }
                },
                read = stderr.read(&mut err_chunk), if stderr_open => match read {
                    Ok(0) => stderr_open = false,
                    Ok(n) => err.extend(&err_chunk[..n]),
                    Err(e) => {
                        warn!("读取stderr失败: invocation_id={invocation_id}, error={e}");
                        stderr_open = false;
                    }
                },
                status = child.wait(), if exit_status.is_none() && !wait_failed => match status {
                    Ok(status) => {
                        exit_status = Some(status);
                        state = state.on_exit();
                    }
                    Err(e) => {
                        error!("等待脚本进程失败: invocation_id={invocation_id}, error={e}");
                        wait_failed = true;
                    }
                },
                _ = &mut timer => {
                    if exit_status.is_none() {
                        state = state.on_timeout();
                    }
                    break;
                }
            }
        }

        // 先停止读取再终止进程，避免终止过程中的输出再次触发握手
        drop(stdout);
        drop(stderr);
        drop(stdin);

        if state == InvocationState::TimedOut {
            match child.try_wait() {
                Ok(Some(_)) => {
                    // 在超时与终止之间已经退出，不再发送信号
                    debug!("脚本在终止前已退出: invocation_id={invocation_id}");
                }
                Ok(None) => {
                    if let Err(e) = child.start_kill() {
                        warn!("终止脚本进程失败: invocation_id={invocation_id}, error={e}");
                    }
                    if let Err(e) = child.wait().await {
                        error!("回收脚本进程失败: invocation_id={invocation_id}, error={e}");
                    }
                }
                Err(e) => warn!("查询脚本进程状态失败: invocation_id={invocation_id}, error={e}"),
            }
        }

        if out.truncated || err.truncated {
            warn!(
                "脚本输出超过缓存上限 {} 字节，已截断: invocation_id={invocation_id}",
                max_output_bytes
            );
        }

        let status = match state {
            InvocationState::TimedOut => ExitState::TimedOut,
            _ => match exit_status.and_then(|s| s.code()) {
                Some(code) => ExitState::Exited { code },
                None => ExitState::Killed,
            },
        };

        ExecutionOutcome {
            invocation_id,
            script_id,
            status,
            stdout: out.into_string(),
            stderr: err.into_string(),
            duration_ms: started.elapsed().as_millis() as u64,
            signal_sent,
        }
    }
}

/// 把消息写入子进程 stdin，写完后关闭 stdin
///
/// 写入在独立任务中进行，子进程不读取 stdin 时不会阻塞输出读取和超时处理。
fn send_payload(
    mut stdin: ChildStdin,
    payload: Option<&str>,
    script_id: &str,
    invocation_id: Uuid,
) {
    let mut line = payload.unwrap_or_default().to_string();
    line.push('\n');
    StructuredLogger::log_signal_sent(script_id, invocation_id, line.len());

    tokio::spawn(async move {
        if let Err(e) = stdin.write_all(line.as_bytes()).await {
            warn!("写入stdin失败: invocation_id={invocation_id}, error={e}");
            return;
        }
        if let Err(e) = stdin.flush().await {
            warn!("刷新stdin失败: invocation_id={invocation_id}, error={e}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_buffer_limit() {
        let mut buffer = OutputBuffer::new(5);
        buffer.extend(b"abc");
        assert!(!buffer.truncated);
        buffer.extend(b"defg");
        assert!(buffer.truncated);
        buffer.extend(b"h");
        assert_eq!(buffer.into_string(), "abcde");
    }

    #[test]
    fn test_output_buffer_lossy_utf8() {
        let mut buffer = OutputBuffer::new(64);
        buffer.extend("你好".as_bytes());
        buffer.extend(&[0xff]);
        assert_eq!(buffer.into_string(), "你好\u{fffd}");
    }
}
