use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

use scriptd_api::{create_app, AppState};
use scriptd_core::{AppConfig, ScriptExecutor, ScriptStore};
use scriptd_dispatcher::ScriptEngine;
use scriptd_infrastructure::FileScriptStore;
use scriptd_worker::{ProcessExecutor, ProcessLauncher};

/// 应用实例：持有配置和脚本引擎
pub struct Application {
    config: AppConfig,
    engine: Arc<ScriptEngine>,
}

impl Application {
    /// 打开存储、创建执行器和引擎，并恢复已持久化的脚本
    pub async fn new(config: AppConfig) -> Result<Self> {
        let store = FileScriptStore::open(&config.storage.scripts_dir)
            .await
            .with_context(|| format!("打开脚本目录失败: {}", config.storage.scripts_dir))?;
        let store: Arc<dyn ScriptStore> = Arc::new(store);

        let launcher = ProcessLauncher::new(config.executor.interpreter.clone());
        let executor: Arc<dyn ScriptExecutor> = Arc::new(
            ProcessExecutor::new(launcher, store.clone())
                .with_max_output_bytes(config.executor.max_output_bytes),
        );

        let engine = Arc::new(
            ScriptEngine::new(store, executor)
                .with_default_timeout(config.executor.default_timeout_ms),
        );
        let restored = engine.load().await.context("恢复脚本失败")?;
        info!("脚本引擎已就绪，恢复 {} 个脚本", restored);

        Ok(Self { config, engine })
    }

    /// 运行HTTP服务直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let app = create_app(
            AppState::new(self.engine.clone(), self.config.api.auth.clone()),
            self.config.api.cors_enabled,
        );

        // 创建TCP监听器
        let listener = TcpListener::bind(&self.config.api.bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {}", self.config.api.bind_address))?;

        info!("API服务器启动在 http://{}", self.config.api.bind_address);
        if self.config.api.auth.enabled {
            info!("已启用HTTP Basic认证");
        }

        let result = axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("API服务器收到关闭信号");
            })
            .await
            .context("API服务器运行失败");

        // 停止全部定时任务
        self.engine.shutdown();
        result
    }
}
