//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod player;
mod repositories;
mod timer_manager;

pub use player::{PlayerError, PlayerPort};
pub use repositories::{LockedSession, RepositoryError, SessionRepositoryPort};
pub use timer_manager::{SyncCheckTimer, TimerError, TimerManagerPort, TimerSignal};
