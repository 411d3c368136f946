//! 统一错误模型
//! 定义访问控制核心的错误分类，以及 HTTP 边界上的错误响应格式

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 令牌校验错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,

    #[error("token expired")]
    Expired,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// 存储后端错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// 员工目录错误
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Employee directory unavailable: {0}")]
    Unavailable(String),
}

/// 访问控制核心的错误（封闭集合）
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("role already exists")]
    RoleExists,

    #[error("role not found")]
    RoleNotFound,

    #[error("role is referenced by at least one user")]
    RoleInUse,

    #[error("user already exists")]
    UserExists,

    #[error("login already taken")]
    LoginExists,

    #[error("user not found")]
    UserNotFound,

    #[error("login and password are required")]
    LoginPasswordRequired,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("crypto error: {0}")]
    Crypto(String),
}

impl AccessError {
    /// 稳定的错误码，调用方据此映射用户提示
    pub fn code(&self) -> &'static str {
        match self {
            AccessError::RoleExists => "role_exists",
            AccessError::RoleNotFound => "role_not_found",
            AccessError::RoleInUse => "role_in_use",
            AccessError::UserExists => "user_exists",
            AccessError::LoginExists => "login_exists",
            AccessError::UserNotFound => "user_not_found",
            AccessError::LoginPasswordRequired => "login_password_required",
            AccessError::InvalidToken => "invalid_token",
            AccessError::TokenExpired => "token_expired",
            AccessError::Storage(_) => "storage_error",
            AccessError::Directory(_) => "directory_error",
            AccessError::Crypto(_) => "crypto_error",
        }
    }
}

impl From<TokenError> for AccessError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Invalid => AccessError::InvalidToken,
            TokenError::Expired => AccessError::TokenExpired,
            TokenError::Signing(msg) => AccessError::Crypto(msg),
        }
    }
}

/// 应用错误类型（HTTP 边界）
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(&'static str),

    #[error("Access denied")]
    Forbidden,

    #[error("Resource not found")]
    NotFound,

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Access(e) => match e {
                AccessError::RoleNotFound | AccessError::UserNotFound => StatusCode::NOT_FOUND,
                AccessError::InvalidToken | AccessError::TokenExpired => StatusCode::UNAUTHORIZED,
                AccessError::RoleExists
                | AccessError::RoleInUse
                | AccessError::UserExists
                | AccessError::LoginExists
                | AccessError::LoginPasswordRequired => StatusCode::BAD_REQUEST,
                AccessError::Storage(_) | AccessError::Directory(_) | AccessError::Crypto(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 获取用户可见的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            AppError::Access(e) => e.code().to_string(),
            AppError::Unauthorized(reason) => reason.to_string(),
            AppError::Forbidden => "forbidden".to_string(),
            AppError::NotFound => "not_found".to_string(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Config(_) => "configuration_error".to_string(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> u16 {
        self.status_code().as_u16()
    }
}

/// 错误响应 DTO
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub message: String,
    pub request_id: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                code = self.code(),
                message = %self,
                request_id = %request_id,
                "Application error"
            );
        } else {
            tracing::debug!(
                code = self.code(),
                message = %self,
                request_id = %request_id,
                "Request rejected"
            );
        }

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code(),
                message: self.user_message(),
                request_id,
            },
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        AppError::Access(e.into())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::BadRequest(e.to_string())
    }
}
