//! Configuration Module
//!
//! 配置来源（优先级从高到低）：
//! - 环境变量（`RELAY_` 前缀）
//! - 配置文件（TOML 格式）
//! - 默认值

mod loader;
mod types;

pub use loader::{load_config, load_config_from_path, print_config, ConfigError, MAX_SESSION_TTL_DAYS};
pub use types::{
    AppConfig, ArchiveConfig, DatabaseConfig, LogConfig, PlayerConfig, SchedulerConfig,
    ServerConfig,
};
