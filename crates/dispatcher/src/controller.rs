//! 脚本引擎
//!
//! HTTP 层和启动流程只通过 [`ScriptEngine`] 访问运行时。引擎负责把注册表、存储、
//! 定时调度器和执行器按正确的顺序组合起来：
//!
//! - 注册：写入口文件 → 写描述符 → 加入注册表 → 创建定时任务
//! - 删除：取消定时任务 → 删除存储目录 → 移出注册表，存储删除失败时恢复定时任务
//! - 调用：`trigger` 立即返回调用ID，`run` 等待最终结果
//!
//! 加载、注册、更新和删除在同一把互斥锁下串行执行，调用不持有该锁。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use scriptd_core::{
    models::DEFAULT_TIMEOUT_MS, ExecutionOutcome, InvocationContext, RuntimeKind,
    ScriptDescriptor, ScriptError, ScriptExecutor, ScriptResult, ScriptStore, ScriptSummary,
    StructuredLogger,
};

use crate::cron_utils::CronScheduler;
use crate::registry::ScriptRegistry;
use crate::scheduler::ScriptScheduler;

/// 注册新脚本的参数
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewScript {
    pub name: String,
    #[serde(default)]
    pub runtime_kind: RuntimeKind,
    #[serde(default)]
    pub webhook_enabled: bool,
    #[serde(default)]
    pub cron_enabled: bool,
    #[serde(default)]
    pub cron_schedule: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    pub content: String,
}

/// 更新脚本的参数，未提供的字段保持不变
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptUpdate {
    pub name: Option<String>,
    pub webhook_enabled: Option<bool>,
    pub cron_enabled: Option<bool>,
    pub cron_schedule: Option<String>,
    pub timeout_ms: Option<u64>,
    pub content: Option<String>,
}

pub struct ScriptEngine {
    registry: Arc<ScriptRegistry>,
    scheduler: ScriptScheduler,
    store: Arc<dyn ScriptStore>,
    executor: Arc<dyn ScriptExecutor>,
    default_timeout_ms: u64,
    mutations: Mutex<()>,
}

impl ScriptEngine {
    pub fn new(store: Arc<dyn ScriptStore>, executor: Arc<dyn ScriptExecutor>) -> Self {
        let registry = Arc::new(ScriptRegistry::new(store.clone()));
        let scheduler = ScriptScheduler::new(registry.clone(), executor.clone());
        Self {
            registry,
            scheduler,
            store,
            executor,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            mutations: Mutex::new(()),
        }
    }

    pub fn with_default_timeout(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    pub fn registry(&self) -> &Arc<ScriptRegistry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &ScriptScheduler {
        &self.scheduler
    }

    /// 从存储恢复全部脚本，返回成功恢复的数量
    ///
    /// 运行时不受支持、入口文件缺失或CRON表达式无效的脚本被跳过。
    pub async fn load(&self) -> ScriptResult<usize> {
        let _guard = self.mutations.lock().await;
        let descriptors = self.store.load_all().await?;
        let total = descriptors.len();
        let mut restored = 0;

        for descriptor in descriptors {
            if let Err(e) = self.restore(descriptor.clone()).await {
                StructuredLogger::log_script_skipped(&descriptor.id, &e);
                continue;
            }
            restored += 1;
        }

        info!("已恢复 {}/{} 个脚本", restored, total);
        Ok(restored)
    }

    async fn restore(&self, descriptor: ScriptDescriptor) -> ScriptResult<()> {
        self.ensure_runtime(&descriptor.runtime_kind)?;

        let entrypoint = descriptor.entrypoint_path(&self.store.script_dir(&descriptor.id))?;
        if !tokio::fs::try_exists(&entrypoint).await.unwrap_or(false) {
            return Err(ScriptError::Storage(format!(
                "入口文件不存在: {}",
                entrypoint.display()
            )));
        }
        if let Some(expression) = descriptor.active_schedule() {
            CronScheduler::validate_cron_expression(expression)?;
        }

        self.registry.register(descriptor.clone()).await?;
        if let Err(e) = self.scheduler.schedule(&descriptor) {
            self.registry.remove(&descriptor.id).await?;
            return Err(e);
        }
        debug!("脚本 {} 已恢复", descriptor.id);
        Ok(())
    }

    /// 注册新脚本
    pub async fn register(&self, request: NewScript) -> ScriptResult<ScriptDescriptor> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ScriptError::InvalidArgument("脚本名称不能为空".to_string()));
        }
        self.ensure_runtime(&request.runtime_kind)?;
        let cron_schedule = normalize_schedule(request.cron_schedule);
        validate_cron(request.cron_enabled, cron_schedule.as_deref())?;
        let timeout_ms = validate_timeout(request.timeout_ms.unwrap_or(self.default_timeout_ms))?;

        let _guard = self.mutations.lock().await;
        let mut descriptor =
            ScriptDescriptor::new(Uuid::new_v4().to_string(), name, request.runtime_kind)?;
        descriptor.webhook_enabled = request.webhook_enabled;
        descriptor.cron_enabled = request.cron_enabled;
        descriptor.cron_schedule = cron_schedule;
        descriptor.timeout_ms = timeout_ms;

        if let Err(e) = self.persist_new(&descriptor, request.content.as_bytes()).await {
            self.discard_storage(&descriptor.id).await;
            return Err(e);
        }
        if let Err(e) = self.registry.register(descriptor.clone()).await {
            self.discard_storage(&descriptor.id).await;
            return Err(e);
        }
        if let Err(e) = self.scheduler.schedule(&descriptor) {
            self.registry.remove(&descriptor.id).await?;
            self.discard_storage(&descriptor.id).await;
            return Err(e);
        }

        StructuredLogger::log_script_registered(&descriptor);
        Ok(descriptor)
    }

    /// 更新脚本内容或元数据
    pub async fn update(&self, id: &str, changes: ScriptUpdate) -> ScriptResult<ScriptDescriptor> {
        // 持锁后再确认脚本仍然存在，之后的存储写入不会与删除交错
        let _guard = self.mutations.lock().await;
        let current = self.registry.find(id).await?;

        let name = match changes.name {
            Some(name) if name.trim().is_empty() => {
                return Err(ScriptError::InvalidArgument("脚本名称不能为空".to_string()));
            }
            Some(name) => name.trim().to_string(),
            None => current.name.clone(),
        };
        let cron_enabled = changes.cron_enabled.unwrap_or(current.cron_enabled);
        let cron_schedule = match changes.cron_schedule {
            Some(schedule) => normalize_schedule(Some(schedule)),
            None => current.cron_schedule.clone(),
        };
        validate_cron(cron_enabled, cron_schedule.as_deref())?;
        let timeout_ms = validate_timeout(changes.timeout_ms.unwrap_or(current.timeout_ms))?;
        let webhook_enabled = changes.webhook_enabled.unwrap_or(current.webhook_enabled);

        if let Some(content) = &changes.content {
            self.store
                .write_entrypoint(&current, content.as_bytes())
                .await?;
        }

        let updated = self
            .registry
            .update(id, move |descriptor| {
                descriptor.name = name;
                descriptor.webhook_enabled = webhook_enabled;
                descriptor.cron_enabled = cron_enabled;
                descriptor.cron_schedule = cron_schedule;
                descriptor.timeout_ms = timeout_ms;
            })
            .await?;

        if current.active_schedule() != updated.active_schedule() {
            self.scheduler.reschedule(&updated)?;
        }

        StructuredLogger::log_script_updated(&updated);
        Ok(updated)
    }

    /// 删除脚本
    ///
    /// 定时任务、存储目录和注册表记录要么全部删除，要么全部保留。
    pub async fn delete(&self, id: &str) -> ScriptResult<()> {
        let _guard = self.mutations.lock().await;
        let descriptor = self.registry.find(id).await?;

        self.scheduler.unschedule(id);
        if let Err(e) = self.store.remove_all(id).await {
            warn!("删除脚本 {} 的存储失败，恢复定时调度: {}", id, e);
            if let Err(restore_err) = self.scheduler.schedule(&descriptor) {
                warn!("恢复脚本 {} 的定时调度失败: {}", id, restore_err);
            }
            return Err(e);
        }
        self.registry.remove(id).await?;

        StructuredLogger::log_script_deleted(id);
        Ok(())
    }

    pub async fn get(&self, id: &str) -> ScriptResult<ScriptDescriptor> {
        self.registry.find(id).await
    }

    pub async fn list(&self) -> Vec<ScriptSummary> {
        self.registry.list().await
    }

    /// 读取入口文件内容，非UTF-8字节按替换字符显示
    pub async fn source(&self, id: &str) -> ScriptResult<String> {
        let descriptor = self.registry.find(id).await?;
        let bytes = self.store.read_entrypoint(&descriptor).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// 异步触发，进程启动后立即返回调用ID
    pub async fn trigger(&self, id: &str, context: InvocationContext) -> ScriptResult<Uuid> {
        let descriptor = self.invocable(id).await?;
        self.executor.trigger(&descriptor, context).await
    }

    /// 同步执行，等待进程结束
    pub async fn run(&self, id: &str, context: InvocationContext) -> ScriptResult<ExecutionOutcome> {
        let descriptor = self.invocable(id).await?;
        self.executor.run(&descriptor, context).await
    }

    /// 取消全部定时任务
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    async fn invocable(&self, id: &str) -> ScriptResult<ScriptDescriptor> {
        let descriptor = self.registry.find(id).await?;
        if !descriptor.webhook_enabled {
            return Err(ScriptError::WebhookDisabled { id: id.to_string() });
        }
        Ok(descriptor)
    }

    fn ensure_runtime(&self, kind: &RuntimeKind) -> ScriptResult<()> {
        if self.executor.supports_runtime(kind) {
            Ok(())
        } else {
            Err(ScriptError::UnsupportedRuntime {
                kind: kind.to_string(),
            })
        }
    }

    async fn persist_new(&self, descriptor: &ScriptDescriptor, content: &[u8]) -> ScriptResult<()> {
        self.store.write_entrypoint(descriptor, content).await?;
        self.store.write_descriptor(descriptor).await
    }

    async fn discard_storage(&self, id: &str) {
        if let Err(e) = self.store.remove_all(id).await {
            warn!("清理脚本 {} 的存储失败: {}", id, e);
        }
    }
}

fn normalize_schedule(schedule: Option<String>) -> Option<String> {
    schedule
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn validate_cron(enabled: bool, schedule: Option<&str>) -> ScriptResult<()> {
    match (enabled, schedule) {
        (_, Some(expression)) => CronScheduler::validate_cron_expression(expression),
        (true, None) => Err(ScriptError::InvalidCron {
            expr: String::new(),
            message: "启用定时调度时必须提供CRON表达式".to_string(),
        }),
        (false, None) => Ok(()),
    }
}

fn validate_timeout(timeout_ms: u64) -> ScriptResult<u64> {
    if timeout_ms == 0 {
        return Err(ScriptError::InvalidArgument("超时时间必须大于0".to_string()));
    }
    Ok(timeout_ms)
}
