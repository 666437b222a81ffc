//! Configuration Loader
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

const ENV_PREFIX: &str = "RELAY";

/// 会话有效期上限（天）
pub const MAX_SESSION_TTL_DAYS: i64 = 3650;

/// 加载应用配置
///
/// # 环境变量示例
/// - `RELAY_SERVER__PORT=8080`
/// - `RELAY_PLAYER__ACCESS_TOKEN=...`
/// - `RELAY_PLAYER__USE_FAKE=true`
/// - `RELAY_SCHEDULER__SYNC_OFFSET_MS=-2000`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置，`None` 时搜索默认文件名
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("player.base_url", "https://api.spotify.com")?
        .set_default("player.access_token", "")?
        .set_default("player.timeout_secs", 10)?
        .set_default("player.use_fake", false)?
        .set_default("database.path", "data/relay.db")?
        .set_default("database.max_connections", 5)?
        .set_default("scheduler.start_grace_ms", 5000)?
        .set_default("scheduler.sync_offset_ms", -2000)?
        .set_default("scheduler.track_end_wait_ms", 7000)?
        .set_default("scheduler.skip_settle_ms", 300)?
        .set_default("archive.enabled", true)?
        .set_default("archive.interval_secs", 3600)?
        .set_default("archive.ttl_days", 3)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 层级分隔符为双下划线，例如 RELAY_ARCHIVE__INTERVAL_SECS
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let app_config: AppConfig = builder.build()?.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if !config.player.use_fake && config.player.base_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "Player base URL cannot be empty".to_string(),
        ));
    }

    if config.database.path.is_empty() {
        return Err(ConfigError::ValidationError(
            "Database path cannot be empty".to_string(),
        ));
    }

    if config.archive.enabled && config.archive.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "Archive interval cannot be 0 when archiving is enabled".to_string(),
        ));
    }

    if config.archive.ttl_days <= 0 || config.archive.ttl_days > MAX_SESSION_TTL_DAYS {
        return Err(ConfigError::ValidationError(format!(
            "Session TTL must be between 1 and {} days",
            MAX_SESSION_TTL_DAYS
        )));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}", config.server.addr());
    if config.player.use_fake {
        tracing::info!("Player: fake (in-memory)");
    } else {
        tracing::info!("Player: {}", config.player.base_url);
        tracing::info!("Player Timeout: {}s", config.player.timeout_secs);
        tracing::info!("Player Token Set: {}", !config.player.access_token.is_empty());
    }
    tracing::info!("Database: {}", config.database.path);
    tracing::info!("Database Max Connections: {}", config.database.max_connections);
    tracing::info!(
        "Scheduler: grace={}ms offset={}ms track_end_wait={}ms skip_settle={}ms",
        config.scheduler.start_grace_ms,
        config.scheduler.sync_offset_ms,
        config.scheduler.track_end_wait_ms,
        config.scheduler.skip_settle_ms
    );
    tracing::info!("Archive Enabled: {}", config.archive.enabled);
    if config.archive.enabled {
        tracing::info!("Archive Interval: {}s", config.archive.interval_secs);
    }
    tracing::info!("Session TTL: {} days", config.archive.ttl_days);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
