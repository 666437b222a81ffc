//! Session Context - Events
//!
//! 推送给会话所有收听者的事件，序列化为 `{"type": "NEXTTRACK", "head": 1}` 形式

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum SessionEvent {
    /// 队列新增曲目
    AddTrack,
    /// 开始播放
    Play,
    /// 暂停
    Pause,
    /// 切换到下一首，携带新的播放头
    NextTrack { head: usize },
    /// 全部播放完毕
    Stop,
    /// 与外部播放器失去同步
    Interrupt,
    /// 会话被归档
    Archived,
    /// 会话取消归档
    Unarchived,
}
