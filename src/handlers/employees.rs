//! 员工查询（按调用者的可见范围过滤）

use crate::{
    auth::require_permission,
    error::AppError,
    middleware::AppState,
    models::{EmployeeOption, ResolvedUser},
};
use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

const EMPLOYEES_PERMISSION: &str = "employees";

/// 员工列表
pub async fn list_employees(
    State(state): State<Arc<AppState>>,
    user: ResolvedUser,
) -> Result<Json<Vec<EmployeeOption>>, AppError> {
    require_permission(&user, EMPLOYEES_PERMISSION)?;

    let employees = state.access.available_employees().await?;
    let employees = match state.access.visible_employee_ids(&user).await? {
        None => employees,
        Some(visible) => employees
            .into_iter()
            .filter(|e| visible.contains(&e.id))
            .collect(),
    };

    Ok(Json(employees))
}

/// 单个员工
pub async fn get_employee(
    State(state): State<Arc<AppState>>,
    user: ResolvedUser,
    Path(id): Path<String>,
) -> Result<Json<EmployeeOption>, AppError> {
    require_permission(&user, EMPLOYEES_PERMISSION)?;

    let employee = state
        .access
        .available_employees()
        .await?
        .into_iter()
        .find(|e| e.id == id);

    // 范围外的 id 与不存在的 id 一律 403，不暴露目录内容
    let department = employee
        .as_ref()
        .map(|e| e.department.as_str())
        .filter(|d| !d.is_empty());
    if !state
        .access
        .is_employee_visible(&user, Some(&id), department)
        .await?
    {
        tracing::warn!(user_id = %user.id, employee_id = %id, "Employee outside caller scope");
        return Err(AppError::Forbidden);
    }

    employee.map(Json).ok_or(AppError::NotFound)
}
