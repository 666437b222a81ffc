//! Repository Ports - 出站端口
//!
//! 定义会话持久化的抽象接口
//! 具体实现在 infrastructure 层（SQLite / 内存）

use async_trait::async_trait;
use std::ops::{Deref, DerefMut};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

use crate::domain::session::{QueueTrack, Session};

/// Repository 错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entity: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// 持有会话排他锁的 Session
///
/// 锁在 guard 被 drop 时释放，即一次读-改-写周期的事务边界
pub struct LockedSession {
    session: Session,
    _guard: OwnedMutexGuard<()>,
}

impl LockedSession {
    pub fn new(session: Session, guard: OwnedMutexGuard<()>) -> Self {
        Self {
            session,
            _guard: guard,
        }
    }

    /// 释放锁并取出 Session
    pub fn into_inner(self) -> Session {
        self.session
    }
}

impl Deref for LockedSession {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl DerefMut for LockedSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.session
    }
}

impl std::fmt::Debug for LockedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedSession")
            .field("session", &self.session)
            .finish()
    }
}

/// Session Repository Port
#[async_trait]
pub trait SessionRepositoryPort: Send + Sync {
    /// 保存新会话（不含队列曲目）
    async fn store_session(&self, session: &Session) -> Result<(), RepositoryError>;

    /// 读取会话及其队列
    async fn find_by_id(&self, id: &str) -> Result<Option<Session>, RepositoryError>;

    /// 获取会话排他锁后读取
    ///
    /// 同一 id 的调用串行化，直到返回的 LockedSession 被 drop
    async fn find_by_id_for_update(&self, id: &str) -> Result<Option<LockedSession>, RepositoryError>;

    /// 更新会话标量字段（设备、状态、播放头、过期时间）
    async fn update(&self, session: &Session) -> Result<(), RepositoryError>;

    /// 追加一首曲目，index 由存储层按 max(index)+1 分配
    async fn store_queue_track(&self, uri: &str, session_id: &str) -> Result<QueueTrack, RepositoryError>;

    /// 归档所有已过期且未归档的会话，返回归档数量
    async fn archive_sessions_for_batch(&self) -> Result<u64, RepositoryError>;
}
