//! Relay - 多人共享收听会话协调服务

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tracing_subscriber::EnvFilter;

use relay::application::PlayerPort;
use relay::config::{load_config, print_config, AppConfig};
use relay::infrastructure::adapters::{FakePlayer, HttpPlayerClient, HttpPlayerClientConfig};
use relay::infrastructure::events::EventPublisher;
use relay::infrastructure::http::{AppState, HttpServer, ServerConfig};
use relay::infrastructure::memory::InMemoryTimerManager;
use relay::infrastructure::persistence::sqlite::{
    create_pool, run_migrations, DatabaseConfig, SqliteSessionRepository,
};
use relay::infrastructure::persistence::SessionLocks;
use relay::infrastructure::worker::{ArchiveWorker, ArchiveWorkerConfig};

fn init_tracing(config: &AppConfig) {
    let log_filter = format!(
        "{},relay={},tower_http=debug",
        config.log.level, config.log.level
    );
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_player(config: &AppConfig) -> anyhow::Result<Arc<dyn PlayerPort>> {
    if config.player.use_fake {
        tracing::warn!("Using in-memory FakePlayer, no real device will play");
        return Ok(Arc::new(FakePlayer::default()));
    }

    let client = HttpPlayerClient::new(HttpPlayerClientConfig {
        base_url: config.player.base_url.clone(),
        access_token: config.player.access_token.clone(),
        timeout_secs: config.player.timeout_secs,
    })?;
    Ok(Arc::new(client))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);
    tracing::info!("Relay - shared listening session coordinator");
    print_config(&config);

    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // 初始化数据库
    let db_config = DatabaseConfig::new(&config.database.path, config.database.max_connections);
    let pool = create_pool(&db_config).await?;
    run_migrations(&pool).await?;

    let locks = Arc::new(SessionLocks::new());
    let session_repo = Arc::new(SqliteSessionRepository::new(pool.clone(), locks));
    let player = build_player(&config)?;
    let event_publisher = EventPublisher::new().arc();
    let timer_manager = InMemoryTimerManager::new().arc();

    let session_ttl = ChronoDuration::try_days(config.archive.ttl_days)
        .ok_or_else(|| anyhow::anyhow!("Session TTL out of range: {} days", config.archive.ttl_days))?;
    let state = AppState::new(
        session_repo.clone(),
        player,
        timer_manager,
        event_publisher,
        config.scheduler.sync_settings(),
        session_ttl,
    );

    // 启动归档 Worker
    let archive_handle = if config.archive.enabled {
        let worker = ArchiveWorker::new(
            ArchiveWorkerConfig {
                interval: Duration::from_secs(config.archive.interval_secs),
            },
            session_repo,
        );
        Some(tokio::spawn(worker.run()))
    } else {
        None
    };

    let server_config = ServerConfig::new(&config.server.host, config.server.port);
    let server = HttpServer::new(server_config, state);

    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                return;
            }
            tracing::info!("Received shutdown signal");
        })
        .await?;

    if let Some(handle) = archive_handle {
        handle.abort();
    }
    pool.close().await;

    tracing::info!("Server shutdown complete");

    Ok(())
}
