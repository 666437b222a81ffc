//! Data Transfer Objects

use serde::{Deserialize, Serialize};

use crate::application::SessionDetail;
use crate::domain::session::{CurrentPlayingInfo, QueueTrack, Session};

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

/// 空数据响应
#[derive(Debug, Serialize)]
pub struct Empty {}

impl ApiResponse<Empty> {
    /// 成功但无数据
    pub fn ok() -> Self {
        Self::success(Empty {})
    }
}

// ============================================================================
// Session DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddQueueTrackRequest {
    pub uri: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePlaybackStateRequest {
    /// "PLAY" | "PAUSE" | "STOP" | "ARCHIVED"
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct SetDeviceRequest {
    pub device_id: String,
}

#[derive(Debug, Serialize)]
pub struct QueueTrackDto {
    pub index: usize,
    pub uri: String,
}

impl From<&QueueTrack> for QueueTrackDto {
    fn from(track: &QueueTrack) -> Self {
        Self {
            index: track.index(),
            uri: track.uri().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlayingDto {
    pub track_uri: String,
    pub progress_ms: u64,
    pub duration_ms: u64,
    pub remain_ms: u64,
    pub device_id: Option<String>,
    pub is_playing: bool,
}

impl From<CurrentPlayingInfo> for PlayingDto {
    fn from(info: CurrentPlayingInfo) -> Self {
        Self {
            remain_ms: info.remain().as_millis() as u64,
            progress_ms: info.progress.as_millis() as u64,
            duration_ms: info.duration.as_millis() as u64,
            track_uri: info.track_uri,
            device_id: info.device_id,
            is_playing: info.is_playing,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub name: String,
    pub creator_id: String,
    pub device_id: Option<String>,
    pub state: String,
    pub queue_head: usize,
    pub queue_tracks: Vec<QueueTrackDto>,
    pub expired_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playing: Option<PlayingDto>,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id().to_string(),
            name: session.name().to_string(),
            creator_id: session.creator_id().to_string(),
            device_id: session.device_id().map(str::to_string),
            state: session.state().as_str().to_string(),
            queue_head: session.queue_head(),
            queue_tracks: session.queue_tracks().iter().map(QueueTrackDto::from).collect(),
            expired_at: session.expired_at().to_rfc3339(),
            playing: None,
        }
    }
}

impl From<SessionDetail> for SessionResponse {
    fn from(detail: SessionDetail) -> Self {
        let mut response = SessionResponse::from(&detail.session);
        response.playing = detail.playing.map(PlayingDto::from);
        response
    }
}

#[derive(Debug, Serialize)]
pub struct AddQueueTrackResponseDto {
    pub index: usize,
    pub uri: String,
    pub enqueued: bool,
}

#[derive(Debug, Serialize)]
pub struct PlaybackStateResponseDto {
    pub session_id: String,
    pub state: String,
}
