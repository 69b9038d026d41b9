use serde::{Deserialize, Serialize};

use crate::models::DEFAULT_TIMEOUT_MS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 脚本根目录，每个脚本占用其中一个子目录
    pub scripts_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            scripts_dir: "data/scripts".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.scripts_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("脚本存储目录不能为空"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// 托管脚本进程使用的解释器
    pub interpreter: String,
    pub default_timeout_ms: u64,
    /// stdout/stderr 各自的最大缓存字节数
    pub max_output_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            interpreter: "sh".to_string(),
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_output_bytes: 8 * 1024 * 1024,
        }
    }
}

impl ExecutorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.interpreter.trim().is_empty() {
            return Err(anyhow::anyhow!("解释器不能为空"));
        }

        if self.default_timeout_ms == 0 {
            return Err(anyhow::anyhow!("默认超时时间必须大于0"));
        }

        if self.max_output_bytes == 0 {
            return Err(anyhow::anyhow!("输出缓存上限必须大于0"));
        }

        Ok(())
    }
}
