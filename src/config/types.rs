//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::time::Duration;

use crate::application::SyncSettings;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 外部播放器配置
    #[serde(default)]
    pub player: PlayerConfig,

    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,

    /// 曲目结束同步时序
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// 过期会话归档
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 外部播放器配置
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    /// Web API 基础 URL
    #[serde(default = "default_player_url")]
    pub base_url: String,

    /// Bearer token
    #[serde(default)]
    pub access_token: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_player_timeout")]
    pub timeout_secs: u64,

    /// 使用内存中的 FakePlayer（本地运行）
    #[serde(default)]
    pub use_fake: bool,
}

fn default_player_url() -> String {
    "https://api.spotify.com".to_string()
}

fn default_player_timeout() -> u64 {
    10
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            base_url: default_player_url(),
            access_token: String::new(),
            timeout_secs: default_player_timeout(),
            use_fake: false,
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite 数据库文件路径
    #[serde(default = "default_db_path")]
    pub path: String,

    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/relay.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// 同步时序配置（毫秒）
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_start_grace_ms")]
    pub start_grace_ms: u64,

    /// 可为负: 提前于曲目结束检查
    #[serde(default = "default_sync_offset_ms")]
    pub sync_offset_ms: i64,

    #[serde(default = "default_track_end_wait_ms")]
    pub track_end_wait_ms: u64,

    #[serde(default = "default_skip_settle_ms")]
    pub skip_settle_ms: u64,
}

fn default_start_grace_ms() -> u64 {
    5000
}

fn default_sync_offset_ms() -> i64 {
    -2000
}

fn default_track_end_wait_ms() -> u64 {
    7000
}

fn default_skip_settle_ms() -> u64 {
    300
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            start_grace_ms: default_start_grace_ms(),
            sync_offset_ms: default_sync_offset_ms(),
            track_end_wait_ms: default_track_end_wait_ms(),
            skip_settle_ms: default_skip_settle_ms(),
        }
    }
}

impl SchedulerConfig {
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            start_grace: Duration::from_millis(self.start_grace_ms),
            sync_offset_ms: self.sync_offset_ms,
            track_end_wait: Duration::from_millis(self.track_end_wait_ms),
            skip_settle: Duration::from_millis(self.skip_settle_ms),
        }
    }
}

/// 过期会话归档配置
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_archive_enabled")]
    pub enabled: bool,

    /// 扫描间隔（秒）
    #[serde(default = "default_archive_interval")]
    pub interval_secs: u64,

    /// 会话有效期（天）
    #[serde(default = "default_ttl_days")]
    pub ttl_days: i64,
}

fn default_archive_enabled() -> bool {
    true
}

fn default_archive_interval() -> u64 {
    3600
}

fn default_ttl_days() -> i64 {
    3
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: default_archive_enabled(),
            interval_secs: default_archive_interval(),
            ttl_days: default_ttl_days(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
