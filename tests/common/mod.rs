//! 测试公共模块
//! 提供测试辅助函数和测试工具

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use secrecy::Secret;
use staff_access::{
    auth::{PasswordHasher, TokenService},
    catalog::Catalog,
    config::{
        AppConfig, DirectoryConfig, LoggingConfig, SecurityConfig, ServerConfig, StorageConfig,
    },
    directory::{Employee, EmployeeDirectory, StaticDirectory},
    middleware::AppState,
    repository::{CredentialBackend, MemoryBackend},
    routes,
    services::{AccessControlService, CredentialStore},
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test-secret-key-for-testing-only-min-32-chars";
pub const BOOTSTRAP_PASSWORD: &str = "admin";

/// 创建测试配置
pub fn create_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            graceful_shutdown_timeout_secs: 5,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            environment: "development".to_string(),
            secret_key: Some(Secret::new(TEST_SECRET.to_string())),
            token_ttl_secs: 300,
            bootstrap_admin_password: Secret::new(BOOTSTRAP_PASSWORD.to_string()),
            // 测试用轻量参数
            argon2_memory_kib: 1024,
            argon2_iterations: 1,
            argon2_parallelism: 1,
        },
        storage: StorageConfig {
            backend: "json".to_string(),
            json_path: "unused.json".to_string(),
            database_url: None,
            max_connections: 1,
        },
        directory: DirectoryConfig {
            employees_file: None,
        },
    }
}

/// 测试员工目录：两个 Sales，一个 Warehouse，一个没有部门
pub fn test_directory() -> Arc<StaticDirectory> {
    Arc::new(StaticDirectory::new(vec![
        Employee::new("e1", "Alice", Some("Sales")),
        Employee::new("e2", "Bob", Some("Warehouse")),
        Employee::new("e3", "carol", Some(" Sales ")),
        Employee::new("e4", "Dan", None),
    ]))
}

pub fn test_hasher() -> PasswordHasher {
    PasswordHasher::with_params(1024, 1, 1).expect("valid argon2 params")
}

pub fn test_tokens() -> TokenService {
    TokenService::new(&Secret::new(TEST_SECRET.to_string()), Duration::from_secs(300))
}

/// 在给定后端上构建服务
pub async fn build_service_with(
    backend: Arc<dyn CredentialBackend>,
    catalog: Catalog,
    directory: Arc<dyn EmployeeDirectory>,
) -> Arc<AccessControlService> {
    let catalog = Arc::new(catalog);
    let store = CredentialStore::open(
        backend,
        catalog.clone(),
        directory.clone(),
        test_hasher(),
        &Secret::new(BOOTSTRAP_PASSWORD.to_string()),
    )
    .await
    .expect("Failed to open credential store");

    Arc::new(AccessControlService::new(
        Arc::new(store),
        test_tokens(),
        directory,
        catalog,
    ))
}

/// 内存后端 + 内置目录
pub async fn build_service() -> Arc<AccessControlService> {
    build_service_with(
        Arc::new(MemoryBackend::new()),
        Catalog::builtin(),
        test_directory(),
    )
    .await
}

/// 创建测试应用
pub async fn create_test_app() -> (Router, Arc<AccessControlService>) {
    let access = build_service().await;
    let state = Arc::new(AppState {
        config: create_test_config(),
        access: access.clone(),
    });
    (routes::create_router(state), access)
}

/// 发送请求并解析 JSON 响应
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

/// 以 admin 登录并返回令牌
pub async fn login_admin(app: &Router) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(serde_json::json!({ "login": "admin", "password": BOOTSTRAP_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "admin login failed: {body}");
    body["token"].as_str().unwrap().to_string()
}
