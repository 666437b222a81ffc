//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（Player、SessionRepository、TimerManager）
//! - sync: 曲目结束同步（reconciler + 调度循环）
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod queries;
pub mod sync;

// Re-exports
pub use commands::{
    AddQueueTrackCommand,
    AddQueueTrackResponse,
    ChangePlaybackStateCommand,
    ChangePlaybackStateResponse,
    ConnectPusherCommand,
    ConnectPusherResponse,
    CreateSessionCommand,
    CreateSessionResponse,
    SetDeviceCommand,
    SkipTrackCommand,
    // Handlers
    handlers::{
        AddQueueTrackHandler, ChangePlaybackStateHandler, ConnectPusherHandler,
        CreateSessionHandler, SetDeviceHandler, SkipTrackHandler, DEFAULT_SESSION_TTL_DAYS,
    },
};

pub use error::ApplicationError;

pub use ports::{
    LockedSession, PlayerError, PlayerPort, RepositoryError, SessionRepositoryPort,
    SyncCheckTimer, TimerError, TimerManagerPort, TimerSignal,
};

pub use queries::{
    GetSession,
    handlers::{GetSessionHandler, SessionDetail},
};

pub use sync::{SyncError, SyncOutcome, SyncSettings, TrackEndReconciler, TrackEndScheduler};
