//! Player Port - 外部播放服务抽象
//!
//! 真正的音频播放发生在外部播放服务上，这里只定义控制与查询接口

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::session::CurrentPlayingInfo;

/// 外部播放器错误
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("No active device")]
    NoActiveDevice,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl PlayerError {
    pub fn is_no_active_device(&self) -> bool {
        matches!(self, PlayerError::NoActiveDevice)
    }
}

/// Player Port
///
/// `device_id` 为 None 时由外部播放器使用当前活动设备
#[async_trait]
pub trait PlayerPort: Send + Sync {
    /// 查询当前播放快照
    async fn currently_playing(&self) -> Result<CurrentPlayingInfo, PlayerError>;

    /// 恢复播放
    async fn play(&self, device_id: Option<&str>) -> Result<(), PlayerError>;

    /// 从给定曲目开始播放
    async fn play_with_tracks(&self, device_id: Option<&str>, track_uris: &[String]) -> Result<(), PlayerError>;

    async fn pause(&self, device_id: Option<&str>) -> Result<(), PlayerError>;

    /// 加入外部播放器自身的队列
    async fn enqueue(&self, track_uri: &str, device_id: Option<&str>) -> Result<(), PlayerError>;

    async fn set_repeat_mode(&self, on: bool, device_id: Option<&str>) -> Result<(), PlayerError>;

    async fn set_shuffle_mode(&self, on: bool, device_id: Option<&str>) -> Result<(), PlayerError>;

    async fn skip_current_track(&self, device_id: Option<&str>) -> Result<(), PlayerError>;
}
