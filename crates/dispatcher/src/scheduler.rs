use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use scriptd_core::{
    InvocationContext, ScriptDescriptor, ScriptExecutor, ScriptResult, StructuredLogger,
};

use crate::cron_utils::CronScheduler;
use crate::registry::ScriptRegistry;

/// 定时调度器
///
/// 为每个启用定时调度的脚本维护一个循环定时任务。取消句柄保存在以脚本ID为键的侧表中，
/// 不写入描述符。定时任务每次触发时都从注册表重新查找描述符，调度器从不修改注册表。
/// 发现脚本已不存在的定时任务会把自己从侧表中移除。
pub struct ScriptScheduler {
    registry: Arc<ScriptRegistry>,
    executor: Arc<dyn ScriptExecutor>,
    timers: Arc<TimerTable>,
    generation: AtomicU64,
}

type TimerTable = Mutex<HashMap<String, TimerEntry>>;

struct TimerEntry {
    generation: u64,
    handle: JoinHandle<()>,
}

impl ScriptScheduler {
    pub fn new(registry: Arc<ScriptRegistry>, executor: Arc<dyn ScriptExecutor>) -> Self {
        Self {
            registry,
            executor,
            timers: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// 为描述符创建定时任务
    ///
    /// 未启用定时调度时不创建任务；已存在的定时任务会被替换。
    pub fn schedule(&self, descriptor: &ScriptDescriptor) -> ScriptResult<()> {
        let Some(expression) = descriptor.active_schedule() else {
            debug!("脚本 {} 未启用定时调度", descriptor.id);
            return Ok(());
        };
        let cron = CronScheduler::new(expression)?;

        if let Some(next) = cron.next_execution_time(Utc::now()) {
            info!(
                "脚本 {} 已加入定时调度: '{}'，下次执行 {}",
                descriptor.id,
                expression,
                next.format("%Y-%m-%d %H:%M:%S UTC")
            );
        } else {
            warn!("脚本 {} 的CRON表达式 '{}' 没有后续执行时间", descriptor.id, expression);
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let timer = Timer {
            script_id: descriptor.id.clone(),
            generation,
            cron,
            registry: self.registry.clone(),
            executor: self.executor.clone(),
            timers: self.timers.clone(),
        };

        // 持锁插入，定时任务的自我清理一定发生在插入之后
        let mut timers = self.timers();
        let handle = tokio::spawn(timer.run());
        let entry = TimerEntry { generation, handle };
        if let Some(previous) = timers.insert(descriptor.id.clone(), entry) {
            previous.handle.abort();
        }
        Ok(())
    }

    /// 取消定时任务，不存在时无操作
    pub fn unschedule(&self, script_id: &str) -> bool {
        match self.timers().remove(script_id) {
            Some(entry) => {
                entry.handle.abort();
                info!("脚本 {} 的定时调度已取消", script_id);
                true
            }
            None => false,
        }
    }

    /// 先取消再按当前配置重新调度
    pub fn reschedule(&self, descriptor: &ScriptDescriptor) -> ScriptResult<()> {
        self.unschedule(&descriptor.id);
        self.schedule(descriptor)
    }

    pub fn is_scheduled(&self, script_id: &str) -> bool {
        self.timers().contains_key(script_id)
    }

    pub fn scheduled_count(&self) -> usize {
        self.timers().len()
    }

    /// 取消全部定时任务
    pub fn shutdown(&self) {
        let timers: Vec<(String, TimerEntry)> = self.timers().drain().collect();
        for (_, entry) in &timers {
            entry.handle.abort();
        }
        info!("定时调度器已停止，取消 {} 个定时任务", timers.len());
    }

    fn timers(&self) -> MutexGuard<'_, HashMap<String, TimerEntry>> {
        lock_timers(&self.timers)
    }
}

fn lock_timers(timers: &TimerTable) -> MutexGuard<'_, HashMap<String, TimerEntry>> {
    // 锁内不会 panic，中毒时沿用内部数据
    timers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Drop for ScriptScheduler {
    fn drop(&mut self) {
        for (_, entry) in self.timers().drain() {
            entry.handle.abort();
        }
    }
}

/// 单个脚本的循环定时任务
struct Timer {
    script_id: String,
    generation: u64,
    cron: CronScheduler,
    registry: Arc<ScriptRegistry>,
    executor: Arc<dyn ScriptExecutor>,
    timers: Arc<TimerTable>,
}

impl Timer {
    async fn run(self) {
        let mut last_fire = Utc::now();
        loop {
            let from = Utc::now().max(last_fire);
            let Some(next) = self.cron.next_execution_time(from) else {
                warn!("脚本 {} 没有后续执行时间，定时任务结束", self.script_id);
                self.release();
                return;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            last_fire = next;

            let descriptor = match self.registry.find(&self.script_id).await {
                Ok(descriptor) => descriptor,
                Err(_) => {
                    debug!("脚本 {} 已不在注册表中，定时任务结束", self.script_id);
                    self.release();
                    return;
                }
            };

            let fired_at = Utc::now();
            StructuredLogger::log_cron_fired(&self.script_id, fired_at);
            if let Err(e) = self
                .executor
                .trigger(&descriptor, InvocationContext::scheduled(fired_at))
                .await
            {
                // 没有调用方在等待，错误只记录
                warn!("脚本 {} 定时执行失败: {}", self.script_id, e);
            }
        }
    }

    /// 从侧表移除自己的条目，已被替换的条目保持不变
    fn release(&self) {
        let mut timers = lock_timers(&self.timers);
        if timers
            .get(&self.script_id)
            .is_some_and(|entry| entry.generation == self.generation)
        {
            timers.remove(&self.script_id);
        }
    }
}
