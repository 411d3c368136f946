//! 认证相关的 HTTP 处理器

use crate::{error::AppError, middleware::AppState, models::*};
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()
        .map_err(|_| AppError::Unauthorized("invalid_credentials"))?;

    let user = state
        .access
        .authenticate(&req.login, &req.password)
        .await?
        .ok_or(AppError::Unauthorized("invalid_credentials"))?;

    let token = state.access.issue_token(&user.id)?;

    Ok(Json(LoginResponse { token, user }))
}

/// 当前用户
pub async fn me(user: ResolvedUser) -> Json<ResolvedUser> {
    Json(user)
}

/// 登出（令牌无状态，客户端丢弃即可）
pub async fn logout(user: ResolvedUser) -> impl IntoResponse {
    tracing::info!(user_id = %user.id, "User logged out");
    Json(json!({ "ok": true }))
}

/// 当前用户可见的员工范围
pub async fn my_scope(
    State(state): State<Arc<AppState>>,
    user: ResolvedUser,
) -> Result<Json<ScopeResponse>, AppError> {
    let response = match state.access.visible_employee_ids(&user).await? {
        None => ScopeResponse {
            unrestricted: true,
            employee_ids: Vec::new(),
        },
        Some(ids) => ScopeResponse {
            unrestricted: false,
            employee_ids: ids.into_iter().collect(),
        },
    };

    Ok(Json(response))
}
