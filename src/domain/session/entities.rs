//! Session Context - Entities

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 队列中的一首曲目
///
/// 不变量:
/// - index 在会话内从 0 开始连续递增，由存储层按 max(index)+1 分配
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueTrack {
    index: usize,
    uri: String,
    session_id: String,
}

impl QueueTrack {
    pub fn new(index: usize, uri: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            index,
            uri: uri.into(),
            session_id: session_id.into(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// 外部播放器报告的当前播放快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentPlayingInfo {
    pub track_uri: String,
    pub progress: Duration,
    pub duration: Duration,
    pub device_id: Option<String>,
    pub is_playing: bool,
}

impl CurrentPlayingInfo {
    /// 当前曲目剩余时长
    pub fn remain(&self) -> Duration {
        self.duration.saturating_sub(self.progress)
    }
}
