//! Session Context - Value Objects

use serde::{Deserialize, Serialize};

use super::SessionError;

/// 会话播放状态
///
/// 持久化与推送时使用大写字符串（"PLAY"、"PAUSE" ...）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StateType {
    /// 停止（初始状态）
    Stop,
    /// 播放中
    Play,
    /// 暂停
    Pause,
    /// 已归档
    Archived,
}

impl StateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateType::Stop => "STOP",
            StateType::Play => "PLAY",
            StateType::Pause => "PAUSE",
            StateType::Archived => "ARCHIVED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "STOP" => Some(StateType::Stop),
            "PLAY" => Some(StateType::Play),
            "PAUSE" => Some(StateType::Pause),
            "ARCHIVED" => Some(StateType::Archived),
            _ => None,
        }
    }

    /// 解析外部输入，未知值返回错误
    pub fn parse(s: &str) -> Result<Self, SessionError> {
        Self::from_str(s).ok_or_else(|| SessionError::InvalidStateType(s.to_string()))
    }
}

impl Default for StateType {
    fn default() -> Self {
        StateType::Stop
    }
}

impl std::fmt::Display for StateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
