//! 应用层错误定义
//!
//! 统一的命令/查询错误类型

use thiserror::Error;

use crate::application::ports::{PlayerError, RepositoryError};
use crate::domain::session::SessionError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 状态无效
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// 无权操作
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// 外部播放器没有活动设备
    #[error("Active device not found")]
    ActiveDeviceNotFound,

    /// 仓储错误
    #[error("Repository error: {0}")]
    RepositoryError(String),

    /// 外部服务错误
    #[error("External service error: {0}")]
    ExternalServiceError(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// 创建状态无效错误
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => Self::not_found("Session", id),
            err => Self::RepositoryError(err.to_string()),
        }
    }
}

impl From<PlayerError> for ApplicationError {
    fn from(err: PlayerError) -> Self {
        match err {
            PlayerError::NoActiveDevice => Self::ActiveDeviceNotFound,
            err => Self::ExternalServiceError(err.to_string()),
        }
    }
}

impl From<SessionError> for ApplicationError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotCreator(_) => Self::Forbidden(err.to_string()),
            SessionError::InvalidName(_) | SessionError::InvalidStateType(_) => {
                Self::ValidationError(err.to_string())
            }
            err => Self::InvalidState(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::StateType;

    #[test]
    fn test_conversions() {
        assert!(matches!(
            ApplicationError::from(PlayerError::NoActiveDevice),
            ApplicationError::ActiveDeviceNotFound
        ));
        assert!(matches!(
            ApplicationError::from(RepositoryError::NotFound("s1".into())),
            ApplicationError::NotFound { resource_type: "Session", .. }
        ));
        assert!(matches!(
            ApplicationError::from(SessionError::ChangeStateNotPermitted {
                from: StateType::Stop,
                to: StateType::Pause,
            }),
            ApplicationError::InvalidState(_)
        ));
        assert!(matches!(
            ApplicationError::from(SessionError::NotCreator("u".into())),
            ApplicationError::Forbidden(_)
        ));
    }
}
