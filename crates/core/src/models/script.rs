use std::fmt;
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::{ScriptError, ScriptResult};

/// 默认执行超时时间（毫秒）
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// 脚本描述符
///
/// 一个已注册脚本的持久化元数据，每个脚本在存储目录下对应一个 `script.json`。
///
/// # 字段说明
///
/// - `id`: 创建时生成的唯一标识，不可变
/// - `created` / `updated`: 秒级 Unix 时间戳，任何修改都会刷新 `updated`
/// - `runtime_kind`: 决定使用哪种进程启动器
/// - `entrypoint`: 脚本私有目录下的入口文件相对路径，由创建逻辑根据运行时类型决定
/// - `webhook_enabled`: 是否允许外部 trigger/run 请求
/// - `cron_enabled` / `cron_schedule`: 定时调度配置，仅在启用时 `cron_schedule` 有意义
/// - `timeout_ms`: 单次执行的最长墙钟时间
///
/// # 使用示例
///
/// ```rust
/// use scriptd_core::models::{RuntimeKind, ScriptDescriptor};
///
/// let descriptor = ScriptDescriptor::new("s1", "备份", RuntimeKind::ManagedScriptProcess).unwrap();
/// assert_eq!(descriptor.entrypoint, "main.sh");
/// assert!(!descriptor.cron_enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptDescriptor {
    pub id: String,
    pub created: i64,
    pub updated: i64,
    pub name: String,
    pub runtime_kind: RuntimeKind,
    pub webhook_enabled: bool,
    pub cron_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_schedule: Option<String>,
    pub entrypoint: String,
    #[serde(rename = "timeoutMillis", default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl ScriptDescriptor {
    /// 创建新的描述符，入口文件由运行时类型决定
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        runtime_kind: RuntimeKind,
    ) -> ScriptResult<Self> {
        let entrypoint = runtime_kind
            .entrypoint_file()
            .ok_or_else(|| ScriptError::UnsupportedRuntime {
                kind: runtime_kind.to_string(),
            })?;
        let now = Utc::now().timestamp();

        Ok(Self {
            id: id.into(),
            created: now,
            updated: now,
            name: name.into(),
            runtime_kind,
            webhook_enabled: false,
            cron_enabled: false,
            cron_schedule: None,
            entrypoint: entrypoint.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        })
    }

    /// 刷新更新时间
    pub fn touch(&mut self) {
        self.updated = Utc::now().timestamp().max(self.created);
    }

    /// 启用定时调度时返回CRON表达式
    pub fn active_schedule(&self) -> Option<&str> {
        if self.cron_enabled {
            self.cron_schedule.as_deref()
        } else {
            None
        }
    }

    /// 将入口文件解析为脚本目录下的绝对路径
    ///
    /// 入口必须是不含 `..` 或根路径的相对路径，否则拒绝解析。
    pub fn entrypoint_path(&self, script_dir: &Path) -> ScriptResult<PathBuf> {
        let relative = Path::new(&self.entrypoint);
        let escapes = relative.as_os_str().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(ScriptError::InvalidArgument(format!(
                "入口文件路径无效: {}",
                self.entrypoint
            )));
        }
        Ok(script_dir.join(relative))
    }

    pub fn summary(&self) -> ScriptSummary {
        ScriptSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            runtime_kind: self.runtime_kind.clone(),
        }
    }
}

/// 用于列表展示的脚本摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSummary {
    pub id: String,
    pub name: String,
    pub runtime_kind: RuntimeKind,
}

/// 运行时类型
///
/// 以字符串形式持久化；未知取值保留在 `Other` 中，由执行器在启动前拒绝。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuntimeKind {
    /// 由解释器托管的脚本进程
    ManagedScriptProcess,
    Other(String),
}

impl RuntimeKind {
    pub const MANAGED_SCRIPT_PROCESS: &'static str = "managed-script-process";

    /// 该运行时对应的入口文件名
    pub fn entrypoint_file(&self) -> Option<&'static str> {
        match self {
            RuntimeKind::ManagedScriptProcess => Some("main.sh"),
            RuntimeKind::Other(_) => None,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.entrypoint_file().is_some()
    }

    pub fn as_str(&self) -> &str {
        match self {
            RuntimeKind::ManagedScriptProcess => Self::MANAGED_SCRIPT_PROCESS,
            RuntimeKind::Other(kind) => kind,
        }
    }
}

impl Default for RuntimeKind {
    fn default() -> Self {
        RuntimeKind::ManagedScriptProcess
    }
}

impl From<String> for RuntimeKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            Self::MANAGED_SCRIPT_PROCESS => RuntimeKind::ManagedScriptProcess,
            _ => RuntimeKind::Other(value),
        }
    }
}

impl From<&str> for RuntimeKind {
    fn from(value: &str) -> Self {
        RuntimeKind::from(value.to_string())
    }
}

impl From<RuntimeKind> for String {
    fn from(kind: RuntimeKind) -> Self {
        match kind {
            RuntimeKind::ManagedScriptProcess => RuntimeKind::MANAGED_SCRIPT_PROCESS.to_string(),
            RuntimeKind::Other(kind) => kind,
        }
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_json_shape() {
        let mut descriptor =
            ScriptDescriptor::new("s1", "hello", RuntimeKind::ManagedScriptProcess).unwrap();
        descriptor.cron_enabled = true;
        descriptor.cron_schedule = Some("* * * * *".to_string());

        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["runtimeKind"], json!("managed-script-process"));
        assert_eq!(value["webhookEnabled"], json!(false));
        assert_eq!(value["cronSchedule"], json!("* * * * *"));
        assert_eq!(value["timeoutMillis"], json!(30000));
        assert_eq!(value["entrypoint"], json!("main.sh"));

        let back: ScriptDescriptor = serde_json::from_value(value).unwrap();
        assert_eq!(back, descriptor);
    }

    #[test]
    fn test_missing_timeout_uses_default() {
        let value = json!({
            "id": "s2",
            "created": 1,
            "updated": 1,
            "name": "n",
            "runtimeKind": "managed-script-process",
            "webhookEnabled": true,
            "cronEnabled": false,
            "entrypoint": "main.sh"
        });
        let descriptor: ScriptDescriptor = serde_json::from_value(value).unwrap();
        assert_eq!(descriptor.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(descriptor.cron_schedule.is_none());
    }

    #[test]
    fn test_unknown_runtime_kind_is_preserved() {
        let kind = RuntimeKind::from("deno");
        assert_eq!(kind, RuntimeKind::Other("deno".to_string()));
        assert!(!kind.is_supported());
        assert_eq!(String::from(kind), "deno");

        let err = ScriptDescriptor::new("x", "x", RuntimeKind::from("deno")).unwrap_err();
        assert!(matches!(err, ScriptError::UnsupportedRuntime { kind } if kind == "deno"));
    }

    #[test]
    fn test_active_schedule() {
        let mut descriptor =
            ScriptDescriptor::new("s1", "n", RuntimeKind::ManagedScriptProcess).unwrap();
        descriptor.cron_schedule = Some("* * * * *".to_string());
        assert_eq!(descriptor.active_schedule(), None);
        descriptor.cron_enabled = true;
        assert_eq!(descriptor.active_schedule(), Some("* * * * *"));
    }

    #[test]
    fn test_entrypoint_path_rejects_escape() {
        let dir = Path::new("/data/scripts/s1");
        let mut descriptor =
            ScriptDescriptor::new("s1", "n", RuntimeKind::ManagedScriptProcess).unwrap();
        assert_eq!(
            descriptor.entrypoint_path(dir).unwrap(),
            PathBuf::from("/data/scripts/s1/main.sh")
        );

        descriptor.entrypoint = "../other/main.sh".to_string();
        assert!(descriptor.entrypoint_path(dir).is_err());
        descriptor.entrypoint = "/etc/passwd".to_string();
        assert!(descriptor.entrypoint_path(dir).is_err());
    }
}
