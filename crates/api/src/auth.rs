//! HTTP Basic 认证
//!
//! 认证只作用于 `/api` 路由，健康检查始终开放。未启用认证时所有请求直接放行。

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose, Engine as _};
use tracing::warn;

use scriptd_core::config::AuthConfig;

use crate::error::ApiError;
use crate::routes::AppState;

pub const BASIC_PREFIX: &str = "Basic ";

pub async fn basic_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.auth.enabled {
        return Ok(next.run(req).await);
    }

    match extract_basic_credentials(req.headers()) {
        Some((username, password)) if credentials_match(&state.auth, &username, &password) => {
            Ok(next.run(req).await)
        }
        Some((username, _)) => {
            warn!("认证失败: 用户 {} 凭证错误 {}", username, req.uri().path());
            Err(ApiError::Unauthorized)
        }
        None => {
            warn!("认证失败: 缺少Basic认证信息 {}", req.uri().path());
            Err(ApiError::Unauthorized)
        }
    }
}

/// 解析 `Authorization: Basic <base64(user:pass)>`
pub fn extract_basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix(BASIC_PREFIX)?.trim();
    let decoded = general_purpose::STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn credentials_match(config: &AuthConfig, username: &str, password: &str) -> bool {
    constant_time_eq(config.username.as_bytes(), username.as_bytes())
        & constant_time_eq(config.password.as_bytes(), password.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
