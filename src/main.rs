//! 员工访问控制服务主入口

use anyhow::Context;
use staff_access::{
    auth::{PasswordHasher, TokenService},
    catalog::Catalog,
    config::AppConfig,
    directory::{EmployeeDirectory, StaticDirectory},
    handlers::health,
    middleware::AppState,
    repository::{CredentialBackend, JsonFileBackend, PgBackend},
    routes,
    services::{AccessControlService, CredentialStore},
    telemetry,
};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("staff-access {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("未知参数: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    // 加载 .env 文件（开发环境）
    dotenv::from_filename(".env.local").ok();
    dotenv::dotenv().ok();

    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志
    telemetry::init_telemetry(&config.logging);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Staff access service starting...");

    // 3. 存储后端
    let backend: Arc<dyn CredentialBackend> = match config.storage.backend_kind().as_str() {
        "postgres" => {
            let url = config
                .storage
                .database_url
                .as_ref()
                .context("storage.database_url is required for the postgres backend")?;
            Arc::new(PgBackend::connect(url, config.storage.max_connections).await?)
        }
        _ => {
            tracing::info!(path = %config.storage.json_path, "Using JSON file storage");
            Arc::new(JsonFileBackend::new(&config.storage.json_path))
        }
    };

    // 4. 员工目录
    let directory: Arc<dyn EmployeeDirectory> = match &config.directory.employees_file {
        Some(path) => Arc::new(StaticDirectory::from_json_file(path).await?),
        None => {
            tracing::warn!("No employee directory configured, scopes will match nobody");
            Arc::new(StaticDirectory::empty())
        }
    };

    // 5. 构建服务
    let catalog = Arc::new(Catalog::builtin());
    let store = Arc::new(
        CredentialStore::open(
            backend,
            catalog.clone(),
            directory.clone(),
            PasswordHasher::from_config(&config.security)?,
            &config.security.bootstrap_admin_password,
        )
        .await?,
    );
    let tokens = TokenService::new(
        &config.security.signing_secret(),
        Duration::from_secs(config.security.token_ttl_secs),
    );
    let access = Arc::new(AccessControlService::new(store, tokens, directory, catalog));

    let app_state = Arc::new(AppState {
        config: config.clone(),
        access,
    });

    // 6. 构建路由
    let app = routes::create_router(app_state);

    // 7. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    // 8. 优雅关闭：收到信号后最多等待 graceful_shutdown_timeout_secs
    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(());
        })
        .into_future();
    let timeout = Duration::from_secs(config.server.graceful_shutdown_timeout_secs);

    tokio::select! {
        result = server => result?,
        _ = async {
            if signalled_rx.await.is_ok() {
                tokio::time::sleep(timeout).await;
            } else {
                std::future::pending::<()>().await;
            }
        } => {
            tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        }
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }
}

/// 打印帮助信息
fn print_help() {
    println!("staff-access {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: staff-access [选项]");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 STAFF_ 前缀的环境变量完成");
    println!("  例如 STAFF_SECURITY__SECRET_KEY, STAFF_STORAGE__BACKEND");
}
