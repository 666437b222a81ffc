//! Session Context - 共享收听会话限界上下文
//!
//! 职责:
//! - 会话聚合（队列、播放头、生命周期状态）
//! - 与外部播放器快照的同步校验
//! - 推送给收听者的会话事件

mod aggregate;
mod entities;
mod errors;
mod events;
mod value_objects;

pub use aggregate::Session;
pub use entities::{CurrentPlayingInfo, QueueTrack};
pub use errors::SessionError;
pub use events::SessionEvent;
pub use value_objects::StateType;
