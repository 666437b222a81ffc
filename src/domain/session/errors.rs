//! Session Context - Errors

use thiserror::Error;

use super::StateType;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("不允许的状态变更: {from} -> {to}")]
    ChangeStateNotPermitted { from: StateType, to: StateType },

    #[error("队列中的曲目已全部播放完毕")]
    AllTracksFinished,

    #[error("外部播放器正在播放其他曲目: expected={expected}, actual={actual}")]
    PlayingDifferentTrack { expected: String, actual: String },

    #[error("队列中没有曲目")]
    QueueTrackNotFound,

    #[error("用户不是会话创建者: {0}")]
    NotCreator(String),

    #[error("无效的会话名称: {0}")]
    InvalidName(String),

    #[error("无效的状态: {0}")]
    InvalidStateType(String),
}
