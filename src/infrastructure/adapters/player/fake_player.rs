//! Fake Player - 内存中的外部播放器
//!
//! 模拟一个单设备播放器: 当前曲目按时间推进，播完后自动切到自身队列的下一首。
//! 用于本地运行和测试，记录所有调用

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::application::ports::{PlayerError, PlayerPort};
use crate::domain::session::CurrentPlayingInfo;

/// 记录的播放器调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCall {
    CurrentlyPlaying,
    Play { device_id: Option<String> },
    PlayWithTracks { device_id: Option<String>, track_uris: Vec<String> },
    Pause { device_id: Option<String> },
    Enqueue { track_uri: String, device_id: Option<String> },
    SetRepeatMode(bool),
    SetShuffleMode(bool),
    SkipCurrentTrack { device_id: Option<String> },
}

struct FakeState {
    active: bool,
    device_id: Option<String>,
    current: Option<String>,
    queue: VecDeque<String>,
    track_duration: Duration,
    /// 暂停时累计的进度
    position: Duration,
    /// 播放中时，进度从该时刻开始累计
    resumed_at: Option<Instant>,
    fail_enqueue: bool,
    calls: Vec<PlayerCall>,
}

impl FakeState {
    fn progress(&self, now: Instant) -> Duration {
        let running = self
            .resumed_at
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or_default();
        (self.position + running).min(self.track_duration)
    }

    fn start(&mut self, uri: String, now: Instant) {
        self.current = Some(uri);
        self.position = Duration::ZERO;
        self.resumed_at = Some(now);
    }

    /// 当前曲目播完时切到队列中的下一首
    fn roll_over(&mut self, now: Instant) {
        while self.current.is_some() && self.resumed_at.is_some() {
            let elapsed = self.position
                + self
                    .resumed_at
                    .map(|at| now.saturating_duration_since(at))
                    .unwrap_or_default();
            if elapsed < self.track_duration {
                break;
            }
            match self.queue.pop_front() {
                Some(next) => {
                    let overflow = elapsed - self.track_duration;
                    self.current = Some(next);
                    self.position = Duration::ZERO;
                    self.resumed_at = Some(now.checked_sub(overflow).unwrap_or(now));
                }
                None => {
                    self.position = self.track_duration;
                    self.resumed_at = None;
                }
            }
        }
    }

    fn ensure_active(&self) -> Result<(), PlayerError> {
        if self.active {
            Ok(())
        } else {
            Err(PlayerError::NoActiveDevice)
        }
    }

    fn bind_device(&mut self, device_id: Option<&str>) {
        if let Some(device_id) = device_id {
            self.device_id = Some(device_id.to_string());
        }
    }
}

/// Fake Player
pub struct FakePlayer {
    state: Mutex<FakeState>,
}

impl FakePlayer {
    /// 创建一个有活动设备的播放器，每首曲目时长为 `track_duration`
    pub fn new(track_duration: Duration) -> Self {
        tracing::info!(
            track_duration_ms = track_duration.as_millis() as u64,
            "FakePlayer initialized"
        );
        Self {
            state: Mutex::new(FakeState {
                active: true,
                device_id: None,
                current: None,
                queue: VecDeque::new(),
                track_duration,
                position: Duration::ZERO,
                resumed_at: None,
                fail_enqueue: false,
                calls: Vec::new(),
            }),
        }
    }

    /// 模拟设备上线/离线
    pub async fn set_active(&self, active: bool) {
        self.state.lock().await.active = active;
    }

    /// 模拟用户在外部播放器上直接切歌
    pub async fn set_current_track(&self, uri: &str) {
        let mut state = self.state.lock().await;
        state.start(uri.to_string(), Instant::now());
    }

    pub async fn set_fail_enqueue(&self, fail: bool) {
        self.state.lock().await.fail_enqueue = fail;
    }

    pub async fn calls(&self) -> Vec<PlayerCall> {
        self.state.lock().await.calls.clone()
    }

    /// 外部播放器自身队列中尚未播放的曲目
    pub async fn queued(&self) -> Vec<String> {
        let mut state = self.state.lock().await;
        state.roll_over(Instant::now());
        state.queue.iter().cloned().collect()
    }
}

impl Default for FakePlayer {
    fn default() -> Self {
        Self::new(Duration::from_secs(180))
    }
}

#[async_trait]
impl PlayerPort for FakePlayer {
    async fn currently_playing(&self) -> Result<CurrentPlayingInfo, PlayerError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.calls.push(PlayerCall::CurrentlyPlaying);
        state.ensure_active()?;
        state.roll_over(now);

        let track_uri = state.current.clone().ok_or(PlayerError::NoActiveDevice)?;
        Ok(CurrentPlayingInfo {
            track_uri,
            progress: state.progress(now),
            duration: state.track_duration,
            device_id: state.device_id.clone(),
            is_playing: state.resumed_at.is_some(),
        })
    }

    async fn play(&self, device_id: Option<&str>) -> Result<(), PlayerError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.calls.push(PlayerCall::Play {
            device_id: device_id.map(str::to_string),
        });
        state.ensure_active()?;
        state.bind_device(device_id);
        if state.current.is_some() && state.resumed_at.is_none() {
            state.resumed_at = Some(now);
        }
        Ok(())
    }

    async fn play_with_tracks(&self, device_id: Option<&str>, track_uris: &[String]) -> Result<(), PlayerError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.calls.push(PlayerCall::PlayWithTracks {
            device_id: device_id.map(str::to_string),
            track_uris: track_uris.to_vec(),
        });
        state.ensure_active()?;
        state.bind_device(device_id);

        let mut uris = track_uris.iter().cloned();
        let first = uris
            .next()
            .ok_or_else(|| PlayerError::ServiceError("no tracks to play".to_string()))?;
        state.queue = uris.collect();
        state.start(first, now);
        Ok(())
    }

    async fn pause(&self, device_id: Option<&str>) -> Result<(), PlayerError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.calls.push(PlayerCall::Pause {
            device_id: device_id.map(str::to_string),
        });
        state.ensure_active()?;
        state.roll_over(now);
        let progress = state.progress(now);
        state.position = progress;
        state.resumed_at = None;
        Ok(())
    }

    async fn enqueue(&self, track_uri: &str, device_id: Option<&str>) -> Result<(), PlayerError> {
        let mut state = self.state.lock().await;
        state.calls.push(PlayerCall::Enqueue {
            track_uri: track_uri.to_string(),
            device_id: device_id.map(str::to_string),
        });
        state.ensure_active()?;
        if state.fail_enqueue {
            return Err(PlayerError::ServiceError("enqueue rejected".to_string()));
        }
        state.queue.push_back(track_uri.to_string());
        Ok(())
    }

    async fn set_repeat_mode(&self, on: bool, _device_id: Option<&str>) -> Result<(), PlayerError> {
        let mut state = self.state.lock().await;
        state.calls.push(PlayerCall::SetRepeatMode(on));
        state.ensure_active()
    }

    async fn set_shuffle_mode(&self, on: bool, _device_id: Option<&str>) -> Result<(), PlayerError> {
        let mut state = self.state.lock().await;
        state.calls.push(PlayerCall::SetShuffleMode(on));
        state.ensure_active()
    }

    async fn skip_current_track(&self, device_id: Option<&str>) -> Result<(), PlayerError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.calls.push(PlayerCall::SkipCurrentTrack {
            device_id: device_id.map(str::to_string),
        });
        state.ensure_active()?;
        state.roll_over(now);
        match state.queue.pop_front() {
            Some(next) => state.start(next, now),
            None => {
                state.position = state.track_duration;
                state.resumed_at = None;
            }
        }
        Ok(())
    }
}
