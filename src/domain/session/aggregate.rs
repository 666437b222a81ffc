//! Session Context - Aggregate Root

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{CurrentPlayingInfo, QueueTrack, SessionError, StateType};

/// Session 聚合根
///
/// 不变量:
/// - 新会话处于 Stop 状态
/// - 处于 Play 时 queue_head 必须指向有效的队列曲目
/// - queue_tracks 按 index 升序且连续，只追加
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    name: String,
    creator_id: String,
    device_id: Option<String>,
    state: StateType,
    queue_head: usize,
    queue_tracks: Vec<QueueTrack>,
    expired_at: DateTime<Utc>,
}

impl Session {
    /// 创建新会话
    pub fn new(
        name: impl Into<String>,
        creator_id: impl Into<String>,
        expired_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SessionError::InvalidName(name));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name,
            creator_id: creator_id.into(),
            device_id: None,
            state: StateType::Stop,
            queue_head: 0,
            queue_tracks: Vec::new(),
            expired_at,
        })
    }

    /// 从存储层重建（不做校验）
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: String,
        name: String,
        creator_id: String,
        device_id: Option<String>,
        state: StateType,
        queue_head: usize,
        mut queue_tracks: Vec<QueueTrack>,
        expired_at: DateTime<Utc>,
    ) -> Self {
        queue_tracks.sort_by_key(|t| t.index());
        Self {
            id,
            name,
            creator_id,
            device_id,
            state,
            queue_head,
            queue_tracks,
            expired_at,
        }
    }

    /// 追加一首已由存储层分配 index 的曲目
    pub(crate) fn push_queue_track(&mut self, track: QueueTrack) {
        self.queue_tracks.push(track);
    }

    // ========== 状态迁移 ==========

    /// 开始播放，任何状态均可进入，但队列不能为空
    pub fn move_to_play(&mut self) -> Result<(), SessionError> {
        if self.queue_tracks.is_empty() || self.queue_head >= self.queue_tracks.len() {
            return Err(SessionError::QueueTrackNotFound);
        }
        self.state = StateType::Play;
        Ok(())
    }

    /// 暂停，只允许从 Play 或 Pause 进入
    pub fn move_to_pause(&mut self) -> Result<(), SessionError> {
        match self.state {
            StateType::Play | StateType::Pause => {
                self.state = StateType::Pause;
                Ok(())
            }
            from => Err(SessionError::ChangeStateNotPermitted {
                from,
                to: StateType::Pause,
            }),
        }
    }

    /// 停止（中断或全部播放完毕）；已归档的会话只能通过 unarchive 回到 Stop
    pub fn move_to_stop(&mut self) -> Result<(), SessionError> {
        if self.state == StateType::Archived {
            return Err(SessionError::ChangeStateNotPermitted {
                from: StateType::Archived,
                to: StateType::Stop,
            });
        }
        self.state = StateType::Stop;
        Ok(())
    }

    pub fn archive(&mut self) {
        self.state = StateType::Archived;
    }

    /// 取消归档并重置过期时间
    pub fn unarchive(&mut self, expired_at: DateTime<Utc>) -> Result<(), SessionError> {
        if self.state != StateType::Archived {
            return Err(SessionError::ChangeStateNotPermitted {
                from: self.state,
                to: StateType::Stop,
            });
        }
        self.state = StateType::Stop;
        self.expired_at = expired_at;
        Ok(())
    }

    /// 播放头前进一首；已是最后一首时返回 AllTracksFinished 且不修改 head
    pub fn go_next_track(&mut self) -> Result<(), SessionError> {
        if self.queue_head + 1 >= self.queue_tracks.len() {
            return Err(SessionError::AllTracksFinished);
        }
        self.queue_head += 1;
        Ok(())
    }

    // ========== 同步校验 ==========

    /// 校验外部播放器正在播放 queue_tracks[queue_head]
    pub fn is_playing_correct_track(&self, info: &CurrentPlayingInfo) -> Result<(), SessionError> {
        let expected = self
            .current_track()
            .ok_or(SessionError::QueueTrackNotFound)?;

        if expected.uri() != info.track_uri {
            return Err(SessionError::PlayingDifferentTrack {
                expected: expected.uri().to_string(),
                actual: info.track_uri.clone(),
            });
        }

        if let (Some(expected_device), Some(actual_device)) = (&self.device_id, &info.device_id) {
            if expected_device != actual_device {
                return Err(SessionError::PlayingDifferentTrack {
                    expected: format!("{}@{}", expected.uri(), expected_device),
                    actual: format!("{}@{}", info.track_uri, actual_device),
                });
            }
        }

        Ok(())
    }

    /// Pause -> Play 视为恢复播放，不需要重新下发队列
    pub fn is_resume(&self, next: StateType) -> bool {
        self.state == StateType::Pause && next == StateType::Play
    }

    /// 播放结束时需要预先加入外部播放器队列的曲目
    pub fn track_uri_should_be_added_when_handle_track_end(&self) -> Option<&str> {
        self.queue_tracks
            .get(self.queue_head + 1)
            .map(|t| t.uri())
    }

    /// 新追加的曲目恰好是下一首时需要立即加入外部播放器队列
    pub fn should_call_add_queue_api_now(&self) -> bool {
        matches!(self.state, StateType::Play | StateType::Pause)
            && self.queue_tracks.len() == self.queue_head + 2
    }

    pub fn set_device(&mut self, user_id: &str, device_id: impl Into<String>) -> Result<(), SessionError> {
        if !self.is_creator(user_id) {
            return Err(SessionError::NotCreator(user_id.to_string()));
        }
        self.device_id = Some(device_id.into());
        Ok(())
    }

    // Getters
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn creator_id(&self) -> &str {
        &self.creator_id
    }

    pub fn is_creator(&self, user_id: &str) -> bool {
        self.creator_id == user_id
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn state(&self) -> StateType {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == StateType::Play
    }

    pub fn queue_head(&self) -> usize {
        self.queue_head
    }

    pub fn queue_tracks(&self) -> &[QueueTrack] {
        &self.queue_tracks
    }

    pub fn current_track(&self) -> Option<&QueueTrack> {
        self.queue_tracks.get(self.queue_head)
    }

    /// 播放头及之后的曲目 URI（冷启动时下发给外部播放器）
    pub fn track_uris_on_and_after_queue_head(&self) -> Vec<String> {
        self.queue_tracks
            .iter()
            .skip(self.queue_head)
            .map(|t| t.uri().to_string())
            .collect()
    }

    pub fn expired_at(&self) -> DateTime<Utc> {
        self.expired_at
    }
}
