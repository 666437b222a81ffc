//! Track End Reconciler - 曲目结束时的同步事务
//!
//! 一次同步周期: 获取会话锁 -> 重新读取 -> 推进播放头 -> 校验外部播放器 -> 写回。
//! 无论走哪条分支，读取到的会话都会在周期结束时写回一次

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::SyncSettings;
use crate::application::ports::{
    PlayerError, PlayerPort, RepositoryError, SessionRepositoryPort, SyncCheckTimer,
    TimerManagerPort,
};
use crate::domain::session::{Session, SessionError, SessionEvent, StateType};
use crate::infrastructure::events::EventPublisher;

/// 一次同步周期的结果
#[derive(Debug)]
pub enum SyncOutcome {
    /// 已切到下一首，调度循环改为等待这个计时器
    NextTrack(Arc<SyncCheckTimer>),
    /// 队列已播完，会话回到 Stop
    AllTracksFinished,
    /// 会话在周期开始前已被归档
    Archived,
    /// 会话已不在播放（暂停等操作先拿到了锁）
    Halted(StateType),
}

/// 同步错误
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("failed to load session {session_id}: {source}")]
    Load {
        session_id: String,
        source: RepositoryError,
    },

    #[error("failed to enqueue {track_uri}: {source}")]
    Enqueue {
        track_uri: String,
        source: PlayerError,
    },

    #[error("active device not found")]
    ActiveDeviceNotFound,

    #[error("failed to get currently playing: {0}")]
    CurrentlyPlaying(#[source] PlayerError),

    #[error("interrupted: {0}")]
    PlayingDifferentTrack(#[source] SessionError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("failed to persist session {session_id}: {source}{}", describe_cause(.cause))]
    Persist {
        session_id: String,
        source: RepositoryError,
        cause: Option<Box<SyncError>>,
    },
}

fn describe_cause(cause: &Option<Box<SyncError>>) -> String {
    cause
        .as_ref()
        .map(|c| format!(" (while handling: {})", c))
        .unwrap_or_default()
}

impl SyncError {
    /// 外部播放器与会话失去同步（设备离线或播放了其他曲目）
    pub fn is_interrupt(&self) -> bool {
        match self {
            SyncError::ActiveDeviceNotFound | SyncError::PlayingDifferentTrack(_) => true,
            SyncError::Persist { cause: Some(cause), .. } => cause.is_interrupt(),
            _ => false,
        }
    }
}

/// 曲目结束同步器
pub struct TrackEndReconciler {
    session_repo: Arc<dyn SessionRepositoryPort>,
    player: Arc<dyn PlayerPort>,
    timer_manager: Arc<dyn TimerManagerPort>,
    event_publisher: Arc<EventPublisher>,
    settings: SyncSettings,
}

impl TrackEndReconciler {
    pub fn new(
        session_repo: Arc<dyn SessionRepositoryPort>,
        player: Arc<dyn PlayerPort>,
        timer_manager: Arc<dyn TimerManagerPort>,
        event_publisher: Arc<EventPublisher>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            session_repo,
            player,
            timer_manager,
            event_publisher,
            settings,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// 计时器自然到期
    ///
    /// 先等待外部播放器切到下一首，再进入同步周期
    pub async fn handle_track_end(&self, session_id: &str) -> Result<SyncOutcome, SyncError> {
        tokio::time::sleep(self.settings.track_end_wait).await;
        self.advance(session_id, None).await
    }

    /// 用户跳过当前曲目
    ///
    /// 拿到锁之后等待一小段时间，让外部播放器的状态追上刚发出的跳过命令
    pub async fn handle_skip_track(&self, session_id: &str) -> Result<SyncOutcome, SyncError> {
        self.advance(session_id, Some(self.settings.skip_settle)).await
    }

    async fn advance(&self, session_id: &str, settle: Option<Duration>) -> Result<SyncOutcome, SyncError> {
        let mut session = self
            .session_repo
            .find_by_id_for_update(session_id)
            .await
            .map_err(|source| SyncError::Load {
                session_id: session_id.to_string(),
                source,
            })?
            .ok_or_else(|| SyncError::SessionNotFound(session_id.to_string()))?;

        if let Some(settle) = settle {
            tokio::time::sleep(settle).await;
        }

        let result = self.next_track(&mut session).await;

        if let Err(source) = self.session_repo.update(&session).await {
            // 写回失败时新计时器不能继续驱动循环
            if let Ok(SyncOutcome::NextTrack(timer)) = &result {
                timer.stop();
                self.timer_manager.delete_timer_if(session_id, timer);
            }
            return Err(SyncError::Persist {
                session_id: session_id.to_string(),
                source,
                cause: result.err().map(Box::new),
            });
        }

        result
    }

    async fn next_track(&self, session: &mut Session) -> Result<SyncOutcome, SyncError> {
        let session_id = session.id().to_string();

        match session.state() {
            StateType::Play => {}
            StateType::Archived => {
                tracing::info!(session_id = %session_id, "Session archived during playback");
                self.event_publisher.push(&session_id, SessionEvent::Archived);
                return Ok(SyncOutcome::Archived);
            }
            state => {
                tracing::debug!(session_id = %session_id, state = %state, "Session no longer playing");
                return Ok(SyncOutcome::Halted(state));
            }
        }

        if let Err(SessionError::AllTracksFinished) = session.go_next_track() {
            session.move_to_stop()?;
            tracing::info!(session_id = %session_id, "All tracks finished");
            self.event_publisher.push(&session_id, SessionEvent::Stop);
            return Ok(SyncOutcome::AllTracksFinished);
        }

        if let Some(track_uri) = session
            .track_uri_should_be_added_when_handle_track_end()
            .map(str::to_string)
        {
            self.player
                .enqueue(&track_uri, session.device_id())
                .await
                .map_err(|source| SyncError::Enqueue { track_uri, source })?;
        }

        let info = match self.player.currently_playing().await {
            Ok(info) => info,
            Err(PlayerError::NoActiveDevice) => {
                self.interrupt(session)?;
                return Err(SyncError::ActiveDeviceNotFound);
            }
            Err(e) => return Err(SyncError::CurrentlyPlaying(e)),
        };

        if let Err(e) = session.is_playing_correct_track(&info) {
            self.interrupt(session)?;
            return Err(SyncError::PlayingDifferentTrack(e));
        }

        let queue_head = session.queue_head();
        self.event_publisher
            .push(&session_id, SessionEvent::NextTrack { head: queue_head });

        let remain = info.remain();
        let timer = self.timer_manager.create_timer(&session_id);
        timer.set_timer(remain);

        tracing::info!(
            session_id = %session_id,
            queue_head = queue_head,
            remain_ms = remain.as_millis() as u64,
            "Moved to next track"
        );
        Ok(SyncOutcome::NextTrack(timer))
    }

    fn interrupt(&self, session: &mut Session) -> Result<(), SyncError> {
        session.move_to_stop()?;
        self.event_publisher
            .push(session.id(), SessionEvent::Interrupt);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::LockedSession;
    use crate::domain::session::QueueTrack;
    use crate::infrastructure::adapters::{FakePlayer, PlayerCall};
    use crate::infrastructure::memory::{InMemorySessionRepository, InMemoryTimerManager};
    use chrono::{Duration as ChronoDuration, Utc};
    use tokio::sync::broadcast;
    use tokio::time::Instant;

    struct Fixture {
        repo: Arc<InMemorySessionRepository>,
        player: Arc<FakePlayer>,
        timers: Arc<InMemoryTimerManager>,
        publisher: Arc<EventPublisher>,
        reconciler: TrackEndReconciler,
    }

    fn fixture() -> Fixture {
        let repo = InMemorySessionRepository::new().arc();
        let player = Arc::new(FakePlayer::new(Duration::from_secs(30)));
        let timers = InMemoryTimerManager::new().arc();
        let publisher = EventPublisher::new().arc();
        let reconciler = TrackEndReconciler::new(
            repo.clone(),
            player.clone(),
            timers.clone(),
            publisher.clone(),
            SyncSettings::default(),
        );
        Fixture {
            repo,
            player,
            timers,
            publisher,
            reconciler,
        }
    }

    fn uri(i: usize) -> String {
        format!("spotify:track:{}", i)
    }

    /// 创建处于 Play、播放头为 0 的会话，外部播放器正在播放第一首并已预加载第二首
    async fn playing_session(f: &Fixture, tracks: usize) -> String {
        let mut session =
            Session::new("friday", "creator", Utc::now() + ChronoDuration::days(3)).unwrap();
        f.repo.store_session(&session).await.unwrap();
        for i in 0..tracks {
            f.repo.store_queue_track(&uri(i), session.id()).await.unwrap();
        }
        session = f.repo.find_by_id(session.id()).await.unwrap().unwrap();
        session.move_to_play().unwrap();
        f.repo.update(&session).await.unwrap();

        f.player.play_with_tracks(None, &[uri(0)]).await.unwrap();
        if tracks > 1 {
            f.player.enqueue(&uri(1), None).await.unwrap();
        }
        session.id().to_string()
    }

    fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_tracks_advance_then_finish() {
        let f = fixture();
        let id = playing_session(&f, 3).await;
        let mut rx = f.publisher.register_session(&id);

        tokio::time::sleep(Duration::from_secs(28)).await;
        let outcome = f.reconciler.handle_track_end(&id).await.unwrap();
        assert!(matches!(outcome, SyncOutcome::NextTrack(_)));
        assert_eq!(f.repo.find_by_id(&id).await.unwrap().unwrap().queue_head(), 1);
        assert_eq!(f.player.queued().await, vec![uri(2)]);

        tokio::time::sleep(Duration::from_secs(23)).await;
        let outcome = f.reconciler.handle_track_end(&id).await.unwrap();
        let SyncOutcome::NextTrack(timer) = outcome else {
            panic!("expected next track");
        };
        assert!(Arc::ptr_eq(&timer, &f.timers.get_timer(&id).unwrap()));
        assert_eq!(f.repo.find_by_id(&id).await.unwrap().unwrap().queue_head(), 2);

        let outcome = f.reconciler.handle_track_end(&id).await.unwrap();
        assert!(matches!(outcome, SyncOutcome::AllTracksFinished));
        let session = f.repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(session.state(), StateType::Stop);
        assert_eq!(session.queue_head(), 2);

        assert_eq!(
            drain(&mut rx),
            vec![
                SessionEvent::NextTrack { head: 1 },
                SessionEvent::NextTrack { head: 2 },
                SessionEvent::Stop,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_track_interrupts() {
        let f = fixture();
        let id = playing_session(&f, 3).await;
        let mut rx = f.publisher.register_session(&id);
        f.player.set_current_track("spotify:track:elsewhere").await;

        let err = f.reconciler.handle_track_end(&id).await.unwrap_err();
        assert!(matches!(err, SyncError::PlayingDifferentTrack(_)));
        assert!(err.is_interrupt());

        let session = f.repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(session.state(), StateType::Stop);
        assert_eq!(drain(&mut rx), vec![SessionEvent::Interrupt]);
        assert!(!f.timers.exists(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_active_device_interrupts() {
        let f = fixture();
        let id = playing_session(&f, 2).await;
        let mut rx = f.publisher.register_session(&id);
        f.player.set_active(false).await;

        let err = f.reconciler.handle_skip_track(&id).await.unwrap_err();
        assert!(matches!(err, SyncError::ActiveDeviceNotFound));
        assert!(err.is_interrupt());

        let session = f.repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(session.state(), StateType::Stop);
        assert_eq!(session.queue_head(), 1);
        assert_eq!(drain(&mut rx), vec![SessionEvent::Interrupt]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_archived_during_flight() {
        let f = fixture();
        let id = playing_session(&f, 3).await;
        let mut rx = f.publisher.register_session(&id);

        let mut session = f.repo.find_by_id(&id).await.unwrap().unwrap();
        session.archive();
        f.repo.update(&session).await.unwrap();
        let calls_before = f.player.calls().await.len();

        let outcome = f.reconciler.handle_track_end(&id).await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Archived));

        let session = f.repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(session.state(), StateType::Archived);
        assert_eq!(session.queue_head(), 0);
        assert_eq!(drain(&mut rx), vec![SessionEvent::Archived]);
        assert_eq!(f.player.calls().await.len(), calls_before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_session_halts_quietly() {
        let f = fixture();
        let id = playing_session(&f, 3).await;
        let mut rx = f.publisher.register_session(&id);

        let mut session = f.repo.find_by_id(&id).await.unwrap().unwrap();
        session.move_to_pause().unwrap();
        f.repo.update(&session).await.unwrap();

        let outcome = f.reconciler.handle_skip_track(&id).await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Halted(StateType::Pause)));
        assert_eq!(f.repo.find_by_id(&id).await.unwrap().unwrap().queue_head(), 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_failure_still_commits_advance() {
        let f = fixture();
        let id = playing_session(&f, 3).await;
        f.player.set_fail_enqueue(true).await;

        let err = f.reconciler.handle_skip_track(&id).await.unwrap_err();
        assert!(matches!(err, SyncError::Enqueue { .. }));
        assert!(!err.is_interrupt());
        assert_eq!(f.repo.find_by_id(&id).await.unwrap().unwrap().queue_head(), 1);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let f = fixture();
        assert!(matches!(
            f.reconciler.handle_skip_track("missing").await,
            Err(SyncError::SessionNotFound(_))
        ));
    }

    /// 包装内存仓储: 记录加锁请求的时刻，可让 update 失败
    struct ScriptedRepo {
        inner: Arc<InMemorySessionRepository>,
        fail_update: bool,
        lock_requests: std::sync::Mutex<Vec<Instant>>,
    }

    impl ScriptedRepo {
        fn new(inner: Arc<InMemorySessionRepository>, fail_update: bool) -> Arc<Self> {
            Arc::new(Self {
                inner,
                fail_update,
                lock_requests: std::sync::Mutex::new(Vec::new()),
            })
        }

        fn lock_requests(&self) -> Vec<Instant> {
            self.lock_requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl SessionRepositoryPort for ScriptedRepo {
        async fn store_session(&self, session: &Session) -> Result<(), RepositoryError> {
            self.inner.store_session(session).await
        }

        async fn find_by_id(&self, id: &str) -> Result<Option<Session>, RepositoryError> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_id_for_update(&self, id: &str) -> Result<Option<LockedSession>, RepositoryError> {
            self.lock_requests.lock().unwrap().push(Instant::now());
            self.inner.find_by_id_for_update(id).await
        }

        async fn update(&self, session: &Session) -> Result<(), RepositoryError> {
            if self.fail_update {
                return Err(RepositoryError::DatabaseError("disk full".to_string()));
            }
            self.inner.update(session).await
        }

        async fn store_queue_track(&self, uri: &str, session_id: &str) -> Result<QueueTrack, RepositoryError> {
            self.inner.store_queue_track(uri, session_id).await
        }

        async fn archive_sessions_for_batch(&self) -> Result<u64, RepositoryError> {
            self.inner.archive_sessions_for_batch().await
        }
    }

    fn reconciler_over(f: &Fixture, repo: Arc<ScriptedRepo>) -> Arc<TrackEndReconciler> {
        Arc::new(TrackEndReconciler::new(
            repo,
            f.player.clone(),
            f.timers.clone(),
            f.publisher.clone(),
            SyncSettings::default(),
        ))
    }

    async fn currently_playing_calls(f: &Fixture) -> usize {
        f.player
            .calls()
            .await
            .iter()
            .filter(|c| matches!(c, PlayerCall::CurrentlyPlaying))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_persist_failure_keeps_interrupt_cause() {
        let f = fixture();
        let id = playing_session(&f, 3).await;
        f.player.set_current_track("spotify:track:elsewhere").await;
        let reconciler = reconciler_over(&f, ScriptedRepo::new(f.repo.clone(), true));

        let err = reconciler.handle_skip_track(&id).await.unwrap_err();
        let SyncError::Persist { cause, .. } = &err else {
            panic!("expected persist error, got {:?}", err);
        };
        assert!(matches!(
            cause.as_deref(),
            Some(SyncError::PlayingDifferentTrack(_))
        ));
        assert!(err.is_interrupt());

        let message = err.to_string();
        assert!(message.contains("disk full"));
        assert!(message.contains("interrupted"));

        // 写回失败，存储中的会话保持原样
        let session = f.repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(session.state(), StateType::Play);
        assert_eq!(session.queue_head(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persist_failure_discards_new_timer() {
        let f = fixture();
        let id = playing_session(&f, 3).await;
        let reconciler = reconciler_over(&f, ScriptedRepo::new(f.repo.clone(), true));

        tokio::time::sleep(Duration::from_secs(28)).await;
        let err = reconciler.handle_track_end(&id).await.unwrap_err();
        assert!(matches!(err, SyncError::Persist { cause: None, .. }));
        assert!(!err.is_interrupt());
        assert!(!f.timers.exists(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_track_end_waits_before_locking() {
        let f = fixture();
        let id = playing_session(&f, 3).await;
        f.player.skip_current_track(None).await.unwrap();
        let repo = ScriptedRepo::new(f.repo.clone(), false);
        let reconciler = reconciler_over(&f, repo.clone());
        let wait = reconciler.settings().track_end_wait;

        let start = Instant::now();
        let task = {
            let reconciler = reconciler.clone();
            let id = id.clone();
            tokio::spawn(async move { reconciler.handle_track_end(&id).await })
        };

        tokio::time::sleep(wait - Duration::from_secs(1)).await;
        assert!(repo.lock_requests().is_empty());

        let outcome = task.await.unwrap().unwrap();
        assert!(matches!(outcome, SyncOutcome::NextTrack(_)));
        let requests = repo.lock_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0] - start >= wait);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_settles_while_holding_lock() {
        let f = fixture();
        let id = playing_session(&f, 3).await;
        f.player.skip_current_track(None).await.unwrap();
        let repo = ScriptedRepo::new(f.repo.clone(), false);
        let reconciler = reconciler_over(&f, repo.clone());
        let settle = reconciler.settings().skip_settle;

        let guard = f.repo.find_by_id_for_update(&id).await.unwrap().unwrap();
        let task = {
            let reconciler = reconciler.clone();
            let id = id.clone();
            tokio::spawn(async move { reconciler.handle_skip_track(&id).await })
        };

        // 跳过不等待，直接排队拿锁
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(repo.lock_requests().len(), 1);
        assert_eq!(currently_playing_calls(&f).await, 0);

        drop(guard);
        tokio::time::sleep(settle - Duration::from_millis(100)).await;
        assert_eq!(currently_playing_calls(&f).await, 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(currently_playing_calls(&f).await, 1);

        let outcome = task.await.unwrap().unwrap();
        assert!(matches!(outcome, SyncOutcome::NextTrack(_)));
    }
}
