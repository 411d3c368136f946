//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};

use crate::{auth::access_auth_middleware, handlers, middleware::AppState};

/// 请求体上限
const MAX_BODY_BYTES: usize = 64 * 1024;

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    // 公开端点
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/v1/auth/login", post(handlers::auth::login))
        // 机器人侧按用户 id 查询，不走令牌
        .route("/api/v1/bot/buttons", get(handlers::bot::get_buttons));

    // 需要认证的路由
    let authenticated_routes = Router::new()
        .route("/api/v1/auth/me", get(handlers::auth::me))
        .route("/api/v1/auth/me/scope", get(handlers::auth::my_scope))
        .route("/api/v1/auth/logout", post(handlers::auth::logout))
        // 访问控制管理（需要 access 权限）
        .route("/api/v1/access", get(handlers::access::get_access_config))
        .route("/api/v1/access/roles", post(handlers::access::create_role))
        .route(
            "/api/v1/access/roles/{id}",
            patch(handlers::access::update_role).delete(handlers::access::delete_role),
        )
        .route("/api/v1/access/users", post(handlers::access::create_user))
        .route(
            "/api/v1/access/users/{id}",
            patch(handlers::access::update_user).delete(handlers::access::delete_user),
        )
        // 员工（按可见范围过滤）
        .route("/api/v1/employees", get(handlers::employees::list_employees))
        .route("/api/v1/employees/{id}", get(handlers::employees::get_employee))
        .layer(axum::middleware::from_fn_with_state(
            state.access.clone(),
            access_auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(crate::middleware::request_tracking_middleware))
        .with_state(state)
}
