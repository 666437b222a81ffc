//! Application State
//!
//! 持有端口实现与所有 Command/Query Handlers

use std::sync::Arc;

use chrono::Duration as ChronoDuration;

use crate::application::{
    // Command handlers
    AddQueueTrackHandler, ChangePlaybackStateHandler, ConnectPusherHandler, CreateSessionHandler,
    SetDeviceHandler, SkipTrackHandler,
    // Query handlers
    GetSessionHandler,
    // Sync
    SyncSettings, TrackEndReconciler, TrackEndScheduler,
    // Ports
    PlayerPort, SessionRepositoryPort, TimerManagerPort,
};
use crate::infrastructure::events::EventPublisher;

/// 应用状态
pub struct AppState {
    // ========== Ports ==========
    pub session_repo: Arc<dyn SessionRepositoryPort>,
    pub player: Arc<dyn PlayerPort>,
    pub timer_manager: Arc<dyn TimerManagerPort>,
    pub event_publisher: Arc<EventPublisher>,

    // ========== Command Handlers ==========
    pub create_session_handler: CreateSessionHandler,
    pub add_queue_track_handler: AddQueueTrackHandler,
    pub set_device_handler: SetDeviceHandler,
    pub change_playback_state_handler: ChangePlaybackStateHandler,
    pub skip_track_handler: SkipTrackHandler,
    pub connect_pusher_handler: ConnectPusherHandler,

    // ========== Query Handlers ==========
    pub get_session_handler: GetSessionHandler,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        session_repo: Arc<dyn SessionRepositoryPort>,
        player: Arc<dyn PlayerPort>,
        timer_manager: Arc<dyn TimerManagerPort>,
        event_publisher: Arc<EventPublisher>,
        sync_settings: SyncSettings,
        session_ttl: ChronoDuration,
    ) -> Self {
        let reconciler = Arc::new(TrackEndReconciler::new(
            session_repo.clone(),
            player.clone(),
            timer_manager.clone(),
            event_publisher.clone(),
            sync_settings,
        ));
        let scheduler = TrackEndScheduler::new(reconciler, player.clone(), timer_manager.clone());

        Self {
            // Command handlers
            create_session_handler: CreateSessionHandler::new(session_repo.clone(), session_ttl),
            add_queue_track_handler: AddQueueTrackHandler::new(
                session_repo.clone(),
                player.clone(),
                event_publisher.clone(),
            ),
            set_device_handler: SetDeviceHandler::new(session_repo.clone()),
            change_playback_state_handler: ChangePlaybackStateHandler::new(
                session_repo.clone(),
                player.clone(),
                timer_manager.clone(),
                scheduler.clone(),
                event_publisher.clone(),
                session_ttl,
            ),
            skip_track_handler: SkipTrackHandler::new(
                session_repo.clone(),
                player.clone(),
                timer_manager.clone(),
                scheduler.clone(),
            ),
            connect_pusher_handler: ConnectPusherHandler::new(
                session_repo.clone(),
                timer_manager.clone(),
                scheduler,
            ),

            // Query handlers
            get_session_handler: GetSessionHandler::new(session_repo.clone(), player.clone()),

            // Ports
            session_repo,
            player,
            timer_manager,
            event_publisher,
        }
    }
}
