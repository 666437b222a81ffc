//! Session Command Handlers
//!
//! 每个写操作都在会话锁内完成读-改-写

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;

use crate::application::commands::session_commands::*;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    LockedSession, PlayerError, PlayerPort, SessionRepositoryPort, TimerManagerPort,
};
use crate::application::sync::TrackEndScheduler;
use crate::domain::session::{Session, SessionEvent, StateType};
use crate::infrastructure::events::EventPublisher;

/// 默认会话有效期（天）
pub const DEFAULT_SESSION_TTL_DAYS: i64 = 3;

/// 从当前时刻起算的过期时间
fn expiry_from_now(session_ttl: ChronoDuration) -> Result<DateTime<Utc>, ApplicationError> {
    Utc::now()
        .checked_add_signed(session_ttl)
        .ok_or_else(|| ApplicationError::internal("session ttl out of range"))
}

async fn lock_session(
    session_repo: &Arc<dyn SessionRepositoryPort>,
    session_id: &str,
) -> Result<LockedSession, ApplicationError> {
    session_repo
        .find_by_id_for_update(session_id)
        .await?
        .ok_or_else(|| ApplicationError::not_found("Session", session_id))
}

/// CreateSession Handler
pub struct CreateSessionHandler {
    session_repo: Arc<dyn SessionRepositoryPort>,
    session_ttl: ChronoDuration,
}

impl CreateSessionHandler {
    pub fn new(session_repo: Arc<dyn SessionRepositoryPort>, session_ttl: ChronoDuration) -> Self {
        Self {
            session_repo,
            session_ttl,
        }
    }

    pub async fn handle(&self, cmd: CreateSessionCommand) -> Result<CreateSessionResponse, ApplicationError> {
        let session = Session::new(cmd.name, cmd.creator_id, expiry_from_now(self.session_ttl)?)?;
        self.session_repo.store_session(&session).await?;

        tracing::info!(
            session_id = %session.id(),
            creator_id = %session.creator_id(),
            "Session created"
        );
        Ok(CreateSessionResponse { session })
    }
}

/// AddQueueTrack Handler
pub struct AddQueueTrackHandler {
    session_repo: Arc<dyn SessionRepositoryPort>,
    player: Arc<dyn PlayerPort>,
    event_publisher: Arc<EventPublisher>,
}

impl AddQueueTrackHandler {
    pub fn new(
        session_repo: Arc<dyn SessionRepositoryPort>,
        player: Arc<dyn PlayerPort>,
        event_publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            session_repo,
            player,
            event_publisher,
        }
    }

    pub async fn handle(&self, cmd: AddQueueTrackCommand) -> Result<AddQueueTrackResponse, ApplicationError> {
        if cmd.track_uri.trim().is_empty() {
            return Err(ApplicationError::validation("track_uri is required"));
        }

        let mut session = lock_session(&self.session_repo, &cmd.session_id).await?;
        if session.state() == StateType::Archived {
            return Err(ApplicationError::invalid_state("session is archived"));
        }

        let track = self
            .session_repo
            .store_queue_track(&cmd.track_uri, &cmd.session_id)
            .await?;
        session.push_queue_track(track.clone());

        // 新曲目恰好是下一首时，外部播放器的队列里还没有它
        let enqueued = session.should_call_add_queue_api_now();
        if enqueued {
            self.player
                .enqueue(track.uri(), session.device_id())
                .await?;
        }
        drop(session);

        self.event_publisher
            .push(&cmd.session_id, SessionEvent::AddTrack);

        tracing::info!(
            session_id = %cmd.session_id,
            index = track.index(),
            enqueued = enqueued,
            "Queue track added"
        );
        Ok(AddQueueTrackResponse { track, enqueued })
    }
}

/// SetDevice Handler
pub struct SetDeviceHandler {
    session_repo: Arc<dyn SessionRepositoryPort>,
}

impl SetDeviceHandler {
    pub fn new(session_repo: Arc<dyn SessionRepositoryPort>) -> Self {
        Self { session_repo }
    }

    pub async fn handle(&self, cmd: SetDeviceCommand) -> Result<(), ApplicationError> {
        if cmd.device_id.trim().is_empty() {
            return Err(ApplicationError::validation("device_id is required"));
        }

        let mut session = lock_session(&self.session_repo, &cmd.session_id).await?;
        session.set_device(&cmd.user_id, cmd.device_id.as_str())?;
        self.session_repo.update(&session).await?;

        tracing::info!(
            session_id = %cmd.session_id,
            device_id = %cmd.device_id,
            "Session device set"
        );
        Ok(())
    }
}

/// ChangePlaybackState Handler
pub struct ChangePlaybackStateHandler {
    session_repo: Arc<dyn SessionRepositoryPort>,
    player: Arc<dyn PlayerPort>,
    timer_manager: Arc<dyn TimerManagerPort>,
    scheduler: TrackEndScheduler,
    event_publisher: Arc<EventPublisher>,
    session_ttl: ChronoDuration,
}

impl ChangePlaybackStateHandler {
    pub fn new(
        session_repo: Arc<dyn SessionRepositoryPort>,
        player: Arc<dyn PlayerPort>,
        timer_manager: Arc<dyn TimerManagerPort>,
        scheduler: TrackEndScheduler,
        event_publisher: Arc<EventPublisher>,
        session_ttl: ChronoDuration,
    ) -> Self {
        Self {
            session_repo,
            player,
            timer_manager,
            scheduler,
            event_publisher,
            session_ttl,
        }
    }

    pub async fn handle(
        &self,
        cmd: ChangePlaybackStateCommand,
    ) -> Result<ChangePlaybackStateResponse, ApplicationError> {
        let event = match cmd.state {
            StateType::Play => self.play(&cmd.session_id).await?,
            StateType::Pause => self.pause(&cmd.session_id).await?,
            StateType::Archived => self.archive(&cmd.session_id).await?,
            StateType::Stop => self.unarchive(&cmd.session_id).await?,
        };
        self.event_publisher.push(&cmd.session_id, event);

        tracing::info!(
            session_id = %cmd.session_id,
            state = %cmd.state,
            "Playback state changed"
        );
        Ok(ChangePlaybackStateResponse {
            session_id: cmd.session_id,
            state: cmd.state,
        })
    }

    async fn play(&self, session_id: &str) -> Result<SessionEvent, ApplicationError> {
        let mut session = lock_session(&self.session_repo, session_id).await?;
        if session.state() == StateType::Archived {
            return Err(ApplicationError::invalid_state("session is archived"));
        }
        if session.queue_tracks().is_empty() {
            return Err(ApplicationError::invalid_state("queue is empty"));
        }

        let device_id = session.device_id().map(str::to_string);
        let device_id = device_id.as_deref();
        self.player.set_repeat_mode(false, device_id).await?;
        self.player.set_shuffle_mode(false, device_id).await?;

        if session.is_resume(StateType::Play) {
            self.player.play(device_id).await?;
        } else {
            let track_uris = session.track_uris_on_and_after_queue_head();
            let head = track_uris
                .first()
                .ok_or_else(|| ApplicationError::invalid_state("queue head out of range"))?;
            self.player
                .play_with_tracks(device_id, std::slice::from_ref(head))
                .await?;
            if let Some(next) = track_uris.get(1) {
                self.player.enqueue(next, device_id).await?;
            }
        }

        session.move_to_play()?;
        self.session_repo.update(&session).await?;
        drop(session);

        self.scheduler.spawn(session_id);
        Ok(SessionEvent::Play)
    }

    async fn pause(&self, session_id: &str) -> Result<SessionEvent, ApplicationError> {
        let mut session = lock_session(&self.session_repo, session_id).await?;
        session.move_to_pause()?;

        match self.player.pause(session.device_id()).await {
            Ok(()) | Err(PlayerError::NoActiveDevice) => {}
            Err(e) => return Err(e.into()),
        }

        self.timer_manager.stop_timer(session_id);
        self.session_repo.update(&session).await?;
        Ok(SessionEvent::Pause)
    }

    async fn archive(&self, session_id: &str) -> Result<SessionEvent, ApplicationError> {
        let mut session = lock_session(&self.session_repo, session_id).await?;
        self.timer_manager.stop_timer(session_id);
        session.archive();
        self.session_repo.update(&session).await?;
        Ok(SessionEvent::Archived)
    }

    async fn unarchive(&self, session_id: &str) -> Result<SessionEvent, ApplicationError> {
        let mut session = lock_session(&self.session_repo, session_id).await?;
        session.unarchive(expiry_from_now(self.session_ttl)?)?;
        self.session_repo.update(&session).await?;
        Ok(SessionEvent::Unarchived)
    }
}

/// SkipTrack Handler
pub struct SkipTrackHandler {
    session_repo: Arc<dyn SessionRepositoryPort>,
    player: Arc<dyn PlayerPort>,
    timer_manager: Arc<dyn TimerManagerPort>,
    scheduler: TrackEndScheduler,
}

impl SkipTrackHandler {
    pub fn new(
        session_repo: Arc<dyn SessionRepositoryPort>,
        player: Arc<dyn PlayerPort>,
        timer_manager: Arc<dyn TimerManagerPort>,
        scheduler: TrackEndScheduler,
    ) -> Self {
        Self {
            session_repo,
            player,
            timer_manager,
            scheduler,
        }
    }

    pub async fn handle(&self, cmd: SkipTrackCommand) -> Result<(), ApplicationError> {
        let session = lock_session(&self.session_repo, &cmd.session_id).await?;
        if !session.is_playing() {
            return Err(ApplicationError::invalid_state(format!(
                "cannot skip while {}",
                session.state()
            )));
        }

        self.player.skip_current_track(session.device_id()).await?;
        // 同步周期需要自己拿锁
        drop(session);

        if let Err(e) = self.timer_manager.skip_timer(&cmd.session_id) {
            tracing::info!(
                session_id = %cmd.session_id,
                error = %e,
                "No running timer, restarting track end trigger"
            );
            self.scheduler.spawn_after_skip(&cmd.session_id);
        }
        Ok(())
    }
}

/// ConnectPusher Handler
///
/// 收听者建立推送连接时检查调度循环是否在运行；
/// 进程重启后计时器全部丢失，播放中的会话在这里恢复
pub struct ConnectPusherHandler {
    session_repo: Arc<dyn SessionRepositoryPort>,
    timer_manager: Arc<dyn TimerManagerPort>,
    scheduler: TrackEndScheduler,
}

impl ConnectPusherHandler {
    pub fn new(
        session_repo: Arc<dyn SessionRepositoryPort>,
        timer_manager: Arc<dyn TimerManagerPort>,
        scheduler: TrackEndScheduler,
    ) -> Self {
        Self {
            session_repo,
            timer_manager,
            scheduler,
        }
    }

    pub async fn handle(&self, cmd: ConnectPusherCommand) -> Result<ConnectPusherResponse, ApplicationError> {
        let session = self
            .session_repo
            .find_by_id(&cmd.session_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Session", &cmd.session_id))?;

        let recovered = session.is_playing() && !self.timer_manager.exists(&cmd.session_id);
        if recovered {
            tracing::info!(session_id = %cmd.session_id, "Session timer not found, restarting");
            self.scheduler.spawn(&cmd.session_id);
        }

        Ok(ConnectPusherResponse {
            session_id: cmd.session_id,
            recovered,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::sync::{SyncSettings, TrackEndReconciler};
    use crate::infrastructure::adapters::{FakePlayer, PlayerCall};
    use crate::infrastructure::memory::{InMemorySessionRepository, InMemoryTimerManager};
    use std::time::Duration;

    struct Fixture {
        repo: Arc<InMemorySessionRepository>,
        player: Arc<FakePlayer>,
        timers: Arc<InMemoryTimerManager>,
        publisher: Arc<EventPublisher>,
        scheduler: TrackEndScheduler,
    }

    fn fixture() -> Fixture {
        let repo = InMemorySessionRepository::new().arc();
        let player = Arc::new(FakePlayer::new(Duration::from_secs(30)));
        let timers = InMemoryTimerManager::new().arc();
        let publisher = EventPublisher::new().arc();
        let reconciler = Arc::new(TrackEndReconciler::new(
            repo.clone(),
            player.clone(),
            timers.clone(),
            publisher.clone(),
            SyncSettings::default(),
        ));
        let scheduler = TrackEndScheduler::new(reconciler, player.clone(), timers.clone());
        Fixture {
            repo,
            player,
            timers,
            publisher,
            scheduler,
        }
    }

    impl Fixture {
        fn ttl() -> ChronoDuration {
            ChronoDuration::days(DEFAULT_SESSION_TTL_DAYS)
        }

        fn create(&self) -> CreateSessionHandler {
            CreateSessionHandler::new(self.repo.clone(), Self::ttl())
        }

        fn add_track(&self) -> AddQueueTrackHandler {
            AddQueueTrackHandler::new(self.repo.clone(), self.player.clone(), self.publisher.clone())
        }

        fn change_state(&self) -> ChangePlaybackStateHandler {
            ChangePlaybackStateHandler::new(
                self.repo.clone(),
                self.player.clone(),
                self.timers.clone(),
                self.scheduler.clone(),
                self.publisher.clone(),
                Self::ttl(),
            )
        }

        fn skip(&self) -> SkipTrackHandler {
            SkipTrackHandler::new(
                self.repo.clone(),
                self.player.clone(),
                self.timers.clone(),
                self.scheduler.clone(),
            )
        }

        fn connect(&self) -> ConnectPusherHandler {
            ConnectPusherHandler::new(self.repo.clone(), self.timers.clone(), self.scheduler.clone())
        }

        async fn session_with_tracks(&self, n: usize) -> String {
            let response = self
                .create()
                .handle(CreateSessionCommand {
                    name: "friday".to_string(),
                    creator_id: "creator".to_string(),
                })
                .await
                .unwrap();
            let id = response.session.id().to_string();
            for i in 0..n {
                self.add_track()
                    .handle(AddQueueTrackCommand {
                        session_id: id.clone(),
                        track_uri: format!("spotify:track:{}", i),
                    })
                    .await
                    .unwrap();
            }
            id
        }

        async fn set_state(&self, id: &str, state: StateType) -> Result<ChangePlaybackStateResponse, ApplicationError> {
            self.change_state()
                .handle(ChangePlaybackStateCommand {
                    session_id: id.to_string(),
                    state,
                })
                .await
        }

        async fn state_of(&self, id: &str) -> StateType {
            self.repo.find_by_id(id).await.unwrap().unwrap().state()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_play_sends_head_and_next() {
        let f = fixture();
        let id = f.session_with_tracks(3).await;
        let mut rx = f.publisher.register_session(&id);

        f.set_state(&id, StateType::Play).await.unwrap();

        assert_eq!(f.state_of(&id).await, StateType::Play);
        assert!(f.timers.exists(&id));
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::Play);

        let calls = f.player.calls().await;
        assert!(calls.contains(&PlayerCall::SetRepeatMode(false)));
        assert!(calls.contains(&PlayerCall::SetShuffleMode(false)));
        assert!(calls.contains(&PlayerCall::PlayWithTracks {
            device_id: None,
            track_uris: vec!["spotify:track:0".to_string()],
        }));
        assert_eq!(f.player.queued().await, vec!["spotify:track:1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_rejects_empty_queue_and_archived() {
        let f = fixture();
        let id = f.session_with_tracks(0).await;
        assert!(matches!(
            f.set_state(&id, StateType::Play).await,
            Err(ApplicationError::InvalidState(_))
        ));

        let id = f.session_with_tracks(1).await;
        f.set_state(&id, StateType::Archived).await.unwrap();
        assert!(matches!(
            f.set_state(&id, StateType::Play).await,
            Err(ApplicationError::InvalidState(_))
        ));
        assert!(f.player.calls().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_then_resume() {
        let f = fixture();
        let id = f.session_with_tracks(2).await;
        f.set_state(&id, StateType::Play).await.unwrap();
        let timer = f.timers.get_timer(&id).unwrap();

        f.set_state(&id, StateType::Pause).await.unwrap();
        assert_eq!(f.state_of(&id).await, StateType::Pause);
        assert!(timer.is_stopped());

        f.set_state(&id, StateType::Play).await.unwrap();
        let calls = f.player.calls().await;
        assert_eq!(calls.last(), Some(&PlayerCall::Play { device_id: None }));
        assert!(f.timers.exists(&id));
    }

    #[tokio::test]
    async fn test_pause_from_stop_is_not_permitted() {
        let f = fixture();
        let id = f.session_with_tracks(1).await;
        assert!(matches!(
            f.set_state(&id, StateType::Pause).await,
            Err(ApplicationError::InvalidState(_))
        ));
        assert_eq!(f.state_of(&id).await, StateType::Stop);
    }

    #[tokio::test]
    async fn test_pause_ignores_missing_device() {
        let f = fixture();
        let id = f.session_with_tracks(1).await;
        f.set_state(&id, StateType::Play).await.unwrap();

        f.player.set_active(false).await;
        f.set_state(&id, StateType::Pause).await.unwrap();
        assert_eq!(f.state_of(&id).await, StateType::Pause);
    }

    #[tokio::test]
    async fn test_archive_and_unarchive() {
        let f = fixture();
        let id = f.session_with_tracks(1).await;
        let mut rx = f.publisher.register_session(&id);

        assert!(f.set_state(&id, StateType::Stop).await.is_err());

        f.set_state(&id, StateType::Archived).await.unwrap();
        assert_eq!(f.state_of(&id).await, StateType::Archived);
        assert!(f
            .add_track()
            .handle(AddQueueTrackCommand {
                session_id: id.clone(),
                track_uri: "spotify:track:x".to_string(),
            })
            .await
            .is_err());

        f.set_state(&id, StateType::Stop).await.unwrap();
        assert_eq!(f.state_of(&id).await, StateType::Stop);

        assert_eq!(rx.try_recv().unwrap(), SessionEvent::Archived);
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::Unarchived);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_track_enqueues_next_while_playing() {
        let f = fixture();
        let id = f.session_with_tracks(1).await;
        f.set_state(&id, StateType::Play).await.unwrap();
        assert!(f.player.queued().await.is_empty());

        let response = f
            .add_track()
            .handle(AddQueueTrackCommand {
                session_id: id.clone(),
                track_uri: "spotify:track:1".to_string(),
            })
            .await
            .unwrap();
        assert!(response.enqueued);
        assert_eq!(response.track.index(), 1);

        // 第三首由同步周期在切歌时加入
        let response = f
            .add_track()
            .handle(AddQueueTrackCommand {
                session_id: id.clone(),
                track_uri: "spotify:track:2".to_string(),
            })
            .await
            .unwrap();
        assert!(!response.enqueued);
        assert_eq!(f.player.queued().await, vec!["spotify:track:1".to_string()]);
    }

    #[tokio::test]
    async fn test_set_device_creator_only() {
        let f = fixture();
        let id = f.session_with_tracks(0).await;
        let handler = SetDeviceHandler::new(f.repo.clone());

        let result = handler
            .handle(SetDeviceCommand {
                session_id: id.clone(),
                user_id: "someone".to_string(),
                device_id: "device-a".to_string(),
            })
            .await;
        assert!(matches!(result, Err(ApplicationError::Forbidden(_))));

        handler
            .handle(SetDeviceCommand {
                session_id: id.clone(),
                user_id: "creator".to_string(),
                device_id: "device-a".to_string(),
            })
            .await
            .unwrap();
        let session = f.repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(session.device_id(), Some("device-a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_requires_play_and_signals_timer() {
        let f = fixture();
        let id = f.session_with_tracks(3).await;
        let skip = SkipTrackCommand {
            session_id: id.clone(),
        };
        assert!(matches!(
            f.skip().handle(skip.clone()).await,
            Err(ApplicationError::InvalidState(_))
        ));

        let mut rx = f.publisher.register_session(&id);
        f.set_state(&id, StateType::Play).await.unwrap();
        f.skip().handle(skip).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), SessionEvent::Play);
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::NextTrack { head: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_without_timer_recovers() {
        let f = fixture();
        let id = f.session_with_tracks(3).await;
        f.set_state(&id, StateType::Play).await.unwrap();

        // 模拟进程重启: 计时器全部丢失
        f.timers.stop_timer(&id);
        f.timers.delete_timer(&id);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut rx = f.publisher.register_session(&id);
        f.skip()
            .handle(SkipTrackCommand {
                session_id: id.clone(),
            })
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::NextTrack { head: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_pusher_restarts_lost_loop() {
        let f = fixture();
        let id = f.session_with_tracks(2).await;

        let response = f
            .connect()
            .handle(ConnectPusherCommand {
                session_id: id.clone(),
            })
            .await
            .unwrap();
        assert!(!response.recovered);

        f.set_state(&id, StateType::Play).await.unwrap();
        f.timers.stop_timer(&id);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!f.timers.exists(&id));

        let response = f
            .connect()
            .handle(ConnectPusherCommand {
                session_id: id.clone(),
            })
            .await
            .unwrap();
        assert!(response.recovered);
        assert!(f.timers.exists(&id));

        assert!(matches!(
            f.connect()
                .handle(ConnectPusherCommand {
                    session_id: "missing".to_string(),
                })
                .await,
            Err(ApplicationError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_out_of_range_ttl() {
        let f = fixture();
        let handler = CreateSessionHandler::new(f.repo.clone(), ChronoDuration::days(365 * 1_000_000));

        let result = handler
            .handle(CreateSessionCommand {
                name: "friday".to_string(),
                creator_id: "creator".to_string(),
            })
            .await;
        assert!(matches!(result, Err(ApplicationError::InternalError(_))));
    }
}
