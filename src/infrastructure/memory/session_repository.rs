//! In-Memory Session Repository
//!
//! 与 SQLite 实现语义一致，供本地运行和用例测试使用

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

use crate::application::ports::{LockedSession, RepositoryError, SessionRepositoryPort};
use crate::domain::session::{QueueTrack, Session, StateType};
use crate::infrastructure::persistence::SessionLocks;

/// 内存会话仓储
#[derive(Default)]
pub struct InMemorySessionRepository {
    /// session_id -> Session
    sessions: DashMap<String, Session>,
    locks: Arc<SessionLocks>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl SessionRepositoryPort for InMemorySessionRepository {
    async fn store_session(&self, session: &Session) -> Result<(), RepositoryError> {
        if self.sessions.contains_key(session.id()) {
            return Err(RepositoryError::Duplicate(session.id().to_string()));
        }
        self.sessions
            .insert(session.id().to_string(), session.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Session>, RepositoryError> {
        Ok(self.sessions.get(id).map(|s| s.clone()))
    }

    async fn find_by_id_for_update(&self, id: &str) -> Result<Option<LockedSession>, RepositoryError> {
        let guard = self.locks.acquire(id).await;
        Ok(self
            .sessions
            .get(id)
            .map(|s| s.clone())
            .map(|session| LockedSession::new(session, guard)))
    }

    async fn update(&self, session: &Session) -> Result<(), RepositoryError> {
        let mut stored = self
            .sessions
            .get_mut(session.id())
            .ok_or_else(|| RepositoryError::NotFound(session.id().to_string()))?;

        // 队列只能通过 store_queue_track 追加，这里保留已存储的曲目
        let tracks = stored.queue_tracks().to_vec();
        *stored = Session::restore(
            session.id().to_string(),
            session.name().to_string(),
            session.creator_id().to_string(),
            session.device_id().map(str::to_string),
            session.state(),
            session.queue_head(),
            tracks,
            session.expired_at(),
        );
        Ok(())
    }

    async fn store_queue_track(&self, uri: &str, session_id: &str) -> Result<QueueTrack, RepositoryError> {
        let mut stored = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| RepositoryError::NotFound(session_id.to_string()))?;

        let index = stored
            .queue_tracks()
            .iter()
            .map(|t| t.index() + 1)
            .max()
            .unwrap_or(0);
        let track = QueueTrack::new(index, uri, session_id);
        stored.push_queue_track(track.clone());
        Ok(track)
    }

    async fn archive_sessions_for_batch(&self) -> Result<u64, RepositoryError> {
        let now = Utc::now();
        let ids: Vec<String> = self
            .sessions
            .iter()
            .filter(|s| s.state() != StateType::Archived && s.expired_at() < now)
            .map(|s| s.id().to_string())
            .collect();

        let mut archived = 0;
        for id in ids {
            let _guard = self.locks.acquire(&id).await;
            if let Some(mut session) = self.sessions.get_mut(&id) {
                if session.state() != StateType::Archived && session.expired_at() < now {
                    session.archive();
                    archived += 1;
                }
            }
        }
        Ok(archived)
    }
}
