//! 令牌认证中间件

use crate::{
    error::{AccessError, AppError},
    models::ResolvedUser,
    services::{has_permission, AccessControlService},
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

// 在 handler 中直接提取当前用户
impl<S> FromRequestParts<S> for ResolvedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ResolvedUser>()
            .cloned()
            .ok_or(AppError::Unauthorized("missing_token"))
    }
}

/// 从 Authorization 头提取令牌；`Bearer ` 前缀可省略
pub fn extract_token(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.strip_prefix("Bearer ").unwrap_or(s).trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(AppError::Unauthorized("missing_token"))
}

/// 认证中间件：校验令牌并把解析后的用户附加到请求扩展
pub async fn access_auth_middleware(
    State(access): State<Arc<AccessControlService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(req.headers())?;

    let user = access.verify_token(&token).await.map_err(|e| match e {
        // 账户已删除的令牌按未认证处理
        AccessError::UserNotFound => AppError::Unauthorized("unknown_user"),
        other => AppError::from(other),
    })?;

    tracing::debug!(user_id = %user.id, "Request authenticated");
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// 权限检查
pub fn require_permission(user: &ResolvedUser, permission: &str) -> Result<(), AppError> {
    if has_permission(user, permission) {
        Ok(())
    } else {
        tracing::warn!(user_id = %user.id, permission, "Permission denied");
        Err(AppError::Forbidden)
    }
}
