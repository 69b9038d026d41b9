use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use scriptd_core::config::AuthConfig;
use scriptd_dispatcher::ScriptEngine;

use crate::auth::basic_auth_middleware;
use crate::handlers::{
    health::health_check,
    scripts::{
        create_script, delete_script, get_script, list_scripts, run_script, trigger_script,
        update_script,
    },
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ScriptEngine>,
    pub auth: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(engine: Arc<ScriptEngine>, auth: AuthConfig) -> Self {
        Self {
            engine,
            auth: Arc::new(auth),
        }
    }
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    let scripts = Router::new()
        .route("/api/scripts", get(list_scripts).post(create_script))
        .route("/api/scripts/{id}", get(get_script))
        .route("/api/scripts/{id}/update", post(update_script))
        .route("/api/scripts/{id}/delete", post(delete_script))
        .route(
            "/api/scripts/{id}/trigger",
            get(trigger_script).post(trigger_script),
        )
        .route("/api/scripts/{id}/run", get(run_script).post(run_script))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            basic_auth_middleware,
        ));

    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        .merge(scripts)
        .with_state(state)
}
