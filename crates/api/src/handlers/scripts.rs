use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

use scriptd_core::{InvocationContext, RuntimeKind, ScriptDescriptor};
use scriptd_dispatcher::{NewScript, ScriptUpdate};

use crate::{
    error::ApiResult,
    response::{created, success, ApiResponse},
    routes::AppState,
};

/// 作为 stdin 消息的查询参数名
pub const MESSAGE_PARAM: &str = "message";

/// 脚本注册请求
#[derive(Debug, Deserialize, Validate)]
pub struct CreateScriptRequest {
    #[validate(length(min = 1, max = 255, message = "脚本名称长度必须在1到255个字符之间"))]
    pub name: String,
    pub runtime_kind: Option<String>,
    #[serde(default)]
    pub webhook_enabled: bool,
    #[serde(default)]
    pub cron_enabled: bool,
    pub cron_schedule: Option<String>,
    #[validate(range(min = 1, message = "超时时间必须大于0"))]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub content: String,
}

/// 脚本更新请求
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateScriptRequest {
    #[validate(length(min = 1, max = 255, message = "脚本名称长度必须在1到255个字符之间"))]
    pub name: Option<String>,
    pub webhook_enabled: Option<bool>,
    pub cron_enabled: Option<bool>,
    pub cron_schedule: Option<String>,
    #[validate(range(min = 1, message = "超时时间必须大于0"))]
    pub timeout_ms: Option<u64>,
    pub content: Option<String>,
}

/// 脚本详情：描述符和入口文件内容
#[derive(Debug, Serialize)]
pub struct ScriptDetail {
    #[serde(flatten)]
    pub descriptor: ScriptDescriptor,
    pub source: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub message: String,
    pub invocation_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    pub message: String,
    pub output: String,
    #[serde(rename = "outputError")]
    pub output_error: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

/// 注册脚本
pub async fn create_script(
    State(state): State<AppState>,
    Json(request): Json<CreateScriptRequest>,
) -> ApiResult<impl IntoResponse> {
    request.validate()?;

    let descriptor = state
        .engine
        .register(NewScript {
            name: request.name,
            runtime_kind: request
                .runtime_kind
                .map(RuntimeKind::from)
                .unwrap_or_default(),
            webhook_enabled: request.webhook_enabled,
            cron_enabled: request.cron_enabled,
            cron_schedule: request.cron_schedule,
            timeout_ms: request.timeout_ms,
            content: request.content,
        })
        .await?;

    Ok(created(descriptor))
}

/// 脚本列表
pub async fn list_scripts(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(success(state.engine.list().await))
}

/// 脚本详情
pub async fn get_script(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let descriptor = state.engine.get(&id).await?;
    let source = state.engine.source(&id).await?;
    Ok(success(ScriptDetail { descriptor, source }))
}

/// 更新脚本
pub async fn update_script(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateScriptRequest>,
) -> ApiResult<impl IntoResponse> {
    request.validate()?;

    let descriptor = state
        .engine
        .update(
            &id,
            ScriptUpdate {
                name: request.name,
                webhook_enabled: request.webhook_enabled,
                cron_enabled: request.cron_enabled,
                cron_schedule: request.cron_schedule,
                timeout_ms: request.timeout_ms,
                content: request.content,
            },
        )
        .await?;

    Ok(success(descriptor))
}

/// 删除脚本
pub async fn delete_script(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.engine.delete(&id).await?;
    Ok(ApiResponse::success_empty_with_message(format!(
        "脚本 {id} 已删除"
    )))
}

/// 异步触发脚本，进程启动后立即返回
pub async fn trigger_script(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    body: String,
) -> ApiResult<Json<TriggerResponse>> {
    // 脚本不存在时先返回 404，再校验参数
    state.engine.get(&id).await?;
    let context = invocation_context(params, body)?;
    let invocation_id = state.engine.trigger(&id, context).await?;

    Ok(Json(TriggerResponse {
        message: format!("脚本 {id} 已触发"),
        invocation_id,
    }))
}

/// 同步执行脚本，等待进程结束后返回输出
///
/// 脚本的非零退出码不会转换为 HTTP 错误。
pub async fn run_script(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    body: String,
) -> ApiResult<Json<RunResponse>> {
    state.engine.get(&id).await?;
    let context = invocation_context(params, body)?;
    let outcome = state.engine.run(&id, context).await?;

    let message = if outcome.timed_out() {
        format!("脚本 {id} 执行超时")
    } else {
        format!("脚本 {id} 执行完成")
    };
    Ok(Json(RunResponse {
        message,
        exit_code: outcome.exit_code(),
        timed_out: outcome.timed_out(),
        output: outcome.stdout,
        output_error: outcome.stderr,
    }))
}

/// 查询参数转为命令行参数，`message` 参数优先作为消息，其次是请求体
fn invocation_context(
    params: Vec<(String, String)>,
    body: String,
) -> ApiResult<InvocationContext> {
    let mut payload = None;
    let mut args = Vec::with_capacity(params.len());
    for (key, value) in params {
        if key == MESSAGE_PARAM {
            payload = Some(value);
        } else {
            args.push((key, value));
        }
    }
    if payload.is_none() && !body.is_empty() {
        payload = Some(body);
    }

    debug!("调用参数: {} 个，携带消息: {}", args.len(), payload.is_some());
    Ok(InvocationContext::from_params(args, payload)?)
}
