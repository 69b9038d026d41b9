use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ScriptError, ScriptResult};

/// 一次调用的上下文：位置参数和可选的 stdin 消息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationContext {
    pub args: Vec<String>,
    pub payload: Option<String>,
}

impl InvocationContext {
    pub fn new(args: Vec<String>, payload: Option<String>) -> Self {
        Self { args, payload }
    }

    /// 由键值对生成参数列表，每个参数渲染为 `--<key>="<value>"`
    pub fn from_params<K, V, I>(params: I, payload: Option<String>) -> ScriptResult<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let args = params
            .into_iter()
            .map(|(key, value)| render_argument(key.as_ref(), value.as_ref()))
            .collect::<ScriptResult<Vec<_>>>()?;
        Ok(Self { args, payload })
    }

    /// 定时触发使用的合成参数，只携带当前 Unix 时间
    ///
    /// 与其他参数渲染规则一致，双引号是参数的一部分：脚本收到的 `$1`
    /// 形如 `--time="1760400000"`，不经过 shell 去引号。
    pub fn scheduled(fired_at: DateTime<Utc>) -> Self {
        Self {
            args: vec![format!("--time=\"{}\"", fired_at.timestamp())],
            payload: None,
        }
    }
}

/// 渲染单个参数
///
/// 参数以 argv 形式直接传给子进程，不经过 shell。值中的 `\` 与 `"` 会被转义。
pub fn render_argument(key: &str, value: &str) -> ScriptResult<String> {
    let valid_key = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !valid_key {
        return Err(ScriptError::InvalidArgument(format!("参数名无效: {key:?}")));
    }

    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '"') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    Ok(format!("--{key}=\"{escaped}\""))
}

/// 进程的终止状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExitState {
    /// 正常退出
    Exited { code: i32 },
    /// 被外部信号终止
    Killed,
    /// 超时被强制终止
    TimedOut,
}

/// 一次调用的最终结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub invocation_id: Uuid,
    pub script_id: String,
    pub status: ExitState,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    /// 是否已向 stdin 写入消息
    pub signal_sent: bool,
}

impl ExecutionOutcome {
    pub fn exit_code(&self) -> Option<i32> {
        match self.status {
            ExitState::Exited { code } => Some(code),
            _ => None,
        }
    }

    pub fn timed_out(&self) -> bool {
        self.status == ExitState::TimedOut
    }

    pub fn success(&self) -> bool {
        self.exit_code() == Some(0)
    }

    /// 超时结果转换为 `TimeoutExceeded` 错误，供日志使用
    pub fn timeout_error(&self, timeout_ms: u64) -> Option<ScriptError> {
        self.timed_out().then(|| ScriptError::TimeoutExceeded {
            id: self.script_id.clone(),
            timeout_ms,
        })
    }
}
