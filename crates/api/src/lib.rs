//! # Scriptd API
//!
//! 脚本运行时的 HTTP 外壳，基于 Axum 构建。所有业务操作都委托给
//! [`ScriptEngine`](scriptd_dispatcher::ScriptEngine)。
//!
//! ## API 端点
//!
//! - `GET /health` - 健康检查（不需要认证）
//! - `GET /api/scripts` - 脚本列表
//! - `POST /api/scripts` - 注册脚本
//! - `GET /api/scripts/{id}` - 脚本详情和源码
//! - `POST /api/scripts/{id}/update` - 更新脚本
//! - `POST /api/scripts/{id}/delete` - 删除脚本
//! - `GET|POST /api/scripts/{id}/trigger` - 异步触发，立即返回
//! - `GET|POST /api/scripts/{id}/run` - 同步执行，返回输出
//!
//! 查询参数会渲染为 `--key="value"` 形式的命令行参数，`message` 参数或 POST 请求体
//! 作为 stdin 消息。

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use axum::Router;

pub use error::{ApiError, ApiResult};
pub use routes::{create_routes, AppState};

/// 创建带中间件的完整应用
pub fn create_app(state: AppState, cors_enabled: bool) -> Router {
    let mut app = create_routes(state)
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(middleware::trace_layer());

    if cors_enabled {
        app = app.layer(middleware::cors_layer());
    }
    app
}
