//! 角色与账户管理的 HTTP 处理器

use crate::{
    auth::require_permission,
    error::AppError,
    middleware::AppState,
    models::*,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

const ACCESS_PERMISSION: &str = "access";

/// Account as returned by management endpoints; credentials stripped
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: String,
    pub login: String,
    pub role_id: Option<String>,
    pub permissions: Override<Grant>,
    pub bot_buttons: Override<Grant>,
    pub allowed_employee_ids: Override<Vec<String>>,
    pub allowed_departments: Override<Vec<String>>,
}

impl From<UserAccount> for AccountResponse {
    fn from(account: UserAccount) -> Self {
        Self {
            id: account.id,
            login: account.login,
            role_id: account.role_id,
            permissions: account.permissions,
            bot_buttons: account.bot_buttons,
            allowed_employee_ids: account.allowed_employee_ids,
            allowed_departments: account.allowed_departments,
        }
    }
}

/// 访问控制页面数据
pub async fn get_access_config(
    State(state): State<Arc<AppState>>,
    user: ResolvedUser,
) -> Result<Json<AccessConfigResponse>, AppError> {
    require_permission(&user, ACCESS_PERMISSION)?;

    Ok(Json(state.access.access_config().await?))
}

/// 创建角色
pub async fn create_role(
    State(state): State<Arc<AppState>>,
    user: ResolvedUser,
    Json(req): Json<RoleSpec>,
) -> Result<impl IntoResponse, AppError> {
    require_permission(&user, ACCESS_PERMISSION)?;

    let role = state.access.create_role(req).await?;
    tracing::info!(actor = %user.id, role_id = %role.id, "Role created via API");

    Ok((StatusCode::CREATED, Json(role)))
}

/// 更新角色
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    user: ResolvedUser,
    Path(id): Path<String>,
    Json(req): Json<RolePatch>,
) -> Result<Json<Role>, AppError> {
    require_permission(&user, ACCESS_PERMISSION)?;

    Ok(Json(state.access.update_role(&id, req).await?))
}

/// 删除角色
pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    user: ResolvedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    require_permission(&user, ACCESS_PERMISSION)?;

    state.access.delete_role(&id).await?;

    Ok(Json(json!({ "ok": true })))
}

/// 创建用户
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    user: ResolvedUser,
    Json(req): Json<UserSpec>,
) -> Result<impl IntoResponse, AppError> {
    require_permission(&user, ACCESS_PERMISSION)?;

    let account = state.access.create_user(req).await?;
    tracing::info!(actor = %user.id, user_id = %account.id, "User created via API");

    Ok((StatusCode::CREATED, Json(AccountResponse::from(account))))
}

/// 更新用户
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    user: ResolvedUser,
    Path(id): Path<String>,
    Json(req): Json<UserPatch>,
) -> Result<Json<AccountResponse>, AppError> {
    require_permission(&user, ACCESS_PERMISSION)?;

    let account = state.access.update_user(&id, req).await?;

    Ok(Json(account.into()))
}

/// 删除用户
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    user: ResolvedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    require_permission(&user, ACCESS_PERMISSION)?;

    state.access.delete_user(&id).await?;

    Ok(Json(json!({ "ok": true })))
}
