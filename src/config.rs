//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

/// 未配置密钥时使用的开发密钥；生产环境会被拒绝
pub const INSECURE_DEV_SECRET: &str = "change_me";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:8080"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// 运行环境: development, production
    pub environment: String,
    /// 令牌签名密钥（使用 Secret 包装，防止日志泄露）
    pub secret_key: Option<Secret<String>>,
    /// 令牌有效期（秒）
    pub token_ttl_secs: u64,
    /// 首次启动时 admin 账户的密码
    pub bootstrap_admin_password: Secret<String>,
    /// Argon2 内存开销（KiB）
    pub argon2_memory_kib: u32,
    /// Argon2 迭代次数
    pub argon2_iterations: u32,
    /// Argon2 并行度
    pub argon2_parallelism: u32,
}

impl SecurityConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// 实际使用的签名密钥；未配置时回退到开发密钥并记录警告
    pub fn signing_secret(&self) -> Secret<String> {
        match &self.secret_key {
            Some(key) if !key.expose_secret().is_empty() => key.clone(),
            _ => {
                tracing::warn!(
                    "No secret key configured, falling back to the insecure development key"
                );
                Secret::new(INSECURE_DEV_SECRET.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 存储后端: json, postgres
    pub backend: String,
    /// JSON 文件路径
    pub json_path: String,
    /// 数据库连接 URL（postgres 后端必填）
    pub database_url: Option<Secret<String>>,
    /// 最大连接数
    pub max_connections: u32,
}

impl StorageConfig {
    /// 规范化后的后端名称（去空白、小写）
    pub fn backend_kind(&self) -> String {
        self.backend.trim().to_lowercase()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// 员工目录 JSON 文件（可选）
    pub employees_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
    pub directory: DirectoryConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("server.addr", "0.0.0.0:8080")?
            .set_default("server.graceful_shutdown_timeout_secs", 10)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("security.environment", "development")?
            .set_default("security.token_ttl_secs", 60 * 60 * 12)?
            .set_default("security.bootstrap_admin_password", "admin")?
            .set_default("security.argon2_memory_kib", 19456)?
            .set_default("security.argon2_iterations", 2)?
            .set_default("security.argon2_parallelism", 1)?
            .set_default("storage.backend", "json")?
            .set_default("storage.json_path", "access_control.json")?
            .set_default("storage.max_connections", 5)?;

        // 从环境变量加载配置（前缀为 STAFF_）
        settings = settings.add_source(
            Environment::with_prefix("STAFF")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        match self.security.environment.to_lowercase().as_str() {
            "development" | "production" => {}
            other => {
                return Err(ConfigError::Message(format!(
                    "Invalid environment: {other}. Must be one of: development, production"
                )))
            }
        }

        // 生产环境必须提供足够强度的密钥
        if self.security.is_production() {
            let key = self
                .security
                .secret_key
                .as_ref()
                .map(|k| k.expose_secret().as_str())
                .unwrap_or_default();
            if key.is_empty() || key == INSECURE_DEV_SECRET {
                return Err(ConfigError::Message(
                    "A secret key must be configured in production".to_string(),
                ));
            }
            if key.len() < 32 {
                return Err(ConfigError::Message(
                    "Secret key must be at least 32 characters long".to_string(),
                ));
            }
        }

        // 验证令牌有效期
        if self.security.token_ttl_secs < 60 || self.security.token_ttl_secs > 604800 {
            return Err(ConfigError::Message(
                "token_ttl_secs must be between 60 and 604800 (1 minute to 7 days)".to_string(),
            ));
        }

        if self.security.argon2_parallelism == 0 || self.security.argon2_iterations == 0 {
            return Err(ConfigError::Message(
                "argon2 iterations and parallelism must be positive".to_string(),
            ));
        }

        match self.storage.backend_kind().as_str() {
            "json" => {}
            "postgres" => {
                if self.storage.database_url.is_none() {
                    return Err(ConfigError::Message(
                        "storage.database_url is required for the postgres backend".to_string(),
                    ));
                }
            }
            other => {
                return Err(ConfigError::Message(format!(
                    "Invalid storage backend: {other}. Must be one of: json, postgres"
                )))
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "STAFF_SERVER__ADDR",
        "STAFF_LOGGING__LEVEL",
        "STAFF_SECURITY__ENVIRONMENT",
        "STAFF_SECURITY__SECRET_KEY",
        "STAFF_SECURITY__TOKEN_TTL_SECS",
        "STAFF_STORAGE__BACKEND",
        "STAFF_STORAGE__DATABASE_URL",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_env();

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.server.addr, "0.0.0.0:8080");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.security.token_ttl_secs, 43200);
        assert_eq!(config.storage.backend, "json");
        assert!(config.security.secret_key.is_none());
        assert_eq!(
            config.security.signing_secret().expose_secret(),
            INSECURE_DEV_SECRET
        );
    }

    #[test]
    #[serial]
    fn test_production_rejects_missing_secret() {
        clear_env();
        std::env::set_var("STAFF_SECURITY__ENVIRONMENT", "production");

        assert!(AppConfig::from_env().is_err());

        std::env::set_var("STAFF_SECURITY__SECRET_KEY", INSECURE_DEV_SECRET);
        assert!(AppConfig::from_env().is_err());

        std::env::set_var(
            "STAFF_SECURITY__SECRET_KEY",
            "a-production-secret-that-is-long-enough",
        );
        assert!(AppConfig::from_env().is_ok());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_validation_invalid_log_level() {
        clear_env();
        std::env::set_var("STAFF_LOGGING__LEVEL", "invalid");

        assert!(AppConfig::from_env().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_postgres_backend_requires_url() {
        clear_env();
        std::env::set_var("STAFF_STORAGE__BACKEND", "postgres");

        assert!(AppConfig::from_env().is_err());

        std::env::set_var("STAFF_STORAGE__DATABASE_URL", "postgresql://localhost/staff");
        assert!(AppConfig::from_env().is_ok());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_backend_name_is_case_insensitive() {
        clear_env();
        std::env::set_var("STAFF_STORAGE__BACKEND", " Postgres ");
        std::env::set_var("STAFF_STORAGE__DATABASE_URL", "postgresql://localhost/staff");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.storage.backend_kind(), "postgres");

        clear_env();
    }
}
