//! Session Commands - 会话相关命令

use crate::domain::session::{QueueTrack, Session, StateType};

/// 创建会话命令
#[derive(Debug, Clone)]
pub struct CreateSessionCommand {
    pub name: String,
    pub creator_id: String,
}

/// 创建会话响应
#[derive(Debug, Clone)]
pub struct CreateSessionResponse {
    pub session: Session,
}

/// 追加曲目命令
#[derive(Debug, Clone)]
pub struct AddQueueTrackCommand {
    pub session_id: String,
    pub track_uri: String,
}

/// 追加曲目响应
#[derive(Debug, Clone)]
pub struct AddQueueTrackResponse {
    pub track: QueueTrack,
    /// 是否已立即加入外部播放器队列
    pub enqueued: bool,
}

/// 绑定播放设备命令
#[derive(Debug, Clone)]
pub struct SetDeviceCommand {
    pub session_id: String,
    pub user_id: String,
    pub device_id: String,
}

/// 切换播放状态命令
///
/// Play/Pause 控制播放；Archived 归档；Stop 只用于取消归档
#[derive(Debug, Clone)]
pub struct ChangePlaybackStateCommand {
    pub session_id: String,
    pub state: StateType,
}

/// 切换播放状态响应
#[derive(Debug, Clone)]
pub struct ChangePlaybackStateResponse {
    pub session_id: String,
    pub state: StateType,
}

/// 跳过当前曲目命令
#[derive(Debug, Clone)]
pub struct SkipTrackCommand {
    pub session_id: String,
}

/// 推送连接检查命令
#[derive(Debug, Clone)]
pub struct ConnectPusherCommand {
    pub session_id: String,
}

/// 推送连接检查响应
#[derive(Debug, Clone)]
pub struct ConnectPusherResponse {
    pub session_id: String,
    /// 是否重新启动了调度循环
    pub recovered: bool,
}
