use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{info, warn};

use student_api::app::{create_routes, AppState};
use student_api::infrastructure::{
    config::AppConfig, database::ConnectionManager, logger::Logger,
    mysql::MySqlConnectionFactory, token::RdsTokenProvider,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;

    // 初始化日志
    Logger::init(&config.logging);

    info!("Starting student records service...");
    config.log_summary();

    let tokens = Arc::new(RdsTokenProvider::load(&config.database.region).await);
    let factory = Arc::new(MySqlConnectionFactory::new());
    let db = Arc::new(ConnectionManager::new(
        config.database.clone(),
        tokens,
        factory,
    ));

    let app = create_routes(AppState::new(db.clone()), config.server.request_timeout());

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("🚀 Server running on http://{}", listener.local_addr()?);
    info!("   GET /health    - Database health check");
    info!("   GET /students  - List student records");

    let stop = Arc::new(Notify::new());
    let server = {
        let stop = stop.clone();
        axum::serve(listener, app).with_graceful_shutdown(async move { stop.notified().await })
    };
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut server => {
            result.context("server task panicked")?.context("server error")?;
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, draining in-flight requests...");
            stop.notify_one();
            let grace = config.server.shutdown_timeout();
            match tokio::time::timeout(grace, &mut server).await {
                Ok(result) => {
                    result.context("server task panicked")?.context("server error")?;
                }
                Err(_) => {
                    warn!("In-flight requests did not finish within {:?}, aborting", grace);
                    server.abort();
                }
            }
        }
    }

    // 被中止的连接任务若稍后归还连接，会被直接关闭而不是放回空闲集合
    db.drain().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
