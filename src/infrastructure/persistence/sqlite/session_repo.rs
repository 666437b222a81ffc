//! SQLite Session Repository

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::FromRow;
use std::sync::Arc;

use super::DbPool;
use crate::application::ports::{LockedSession, RepositoryError, SessionRepositoryPort};
use crate::domain::session::{QueueTrack, Session, StateType};
use crate::infrastructure::persistence::SessionLocks;

/// 时间统一存为 UTC RFC3339（微秒），保证字符串比较与时间比较一致
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

/// SQLite Session Repository
pub struct SqliteSessionRepository {
    pool: DbPool,
    locks: Arc<SessionLocks>,
}

impl SqliteSessionRepository {
    pub fn new(pool: DbPool, locks: Arc<SessionLocks>) -> Self {
        Self { pool, locks }
    }

    async fn load(&self, id: &str) -> Result<Option<Session>, RepositoryError> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT id, name, creator_id, device_id, queue_head, state_type, expired_at FROM sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let tracks: Vec<QueueTrackRow> = sqlx::query_as(
            "SELECT track_index, uri, session_id FROM queue_tracks WHERE session_id = ? ORDER BY track_index",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        row.into_session(tracks).map(Some)
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: String,
    name: String,
    creator_id: String,
    device_id: Option<String>,
    queue_head: i64,
    state_type: String,
    expired_at: String,
}

#[derive(FromRow)]
struct QueueTrackRow {
    track_index: i64,
    uri: String,
    session_id: String,
}

impl From<QueueTrackRow> for QueueTrack {
    fn from(row: QueueTrackRow) -> Self {
        QueueTrack::new(row.track_index as usize, row.uri, row.session_id)
    }
}

impl SessionRow {
    fn into_session(self, tracks: Vec<QueueTrackRow>) -> Result<Session, RepositoryError> {
        let state = StateType::from_str(&self.state_type).ok_or_else(|| {
            RepositoryError::SerializationError(format!("unknown state_type: {}", self.state_type))
        })?;

        Ok(Session::restore(
            self.id,
            self.name,
            self.creator_id,
            self.device_id,
            state,
            self.queue_head.max(0) as usize,
            tracks.into_iter().map(QueueTrack::from).collect(),
            parse_timestamp(&self.expired_at)?,
        ))
    }
}

#[async_trait]
impl SessionRepositoryPort for SqliteSessionRepository {
    async fn store_session(&self, session: &Session) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, name, creator_id, device_id, queue_head, state_type, expired_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.id())
        .bind(session.name())
        .bind(session.creator_id())
        .bind(session.device_id())
        .bind(session.queue_head() as i64)
        .bind(session.state().as_str())
        .bind(format_timestamp(session.expired_at()))
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RepositoryError::Duplicate(session.id().to_string())
            }
            e => RepositoryError::DatabaseError(e.to_string()),
        })?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Session>, RepositoryError> {
        self.load(id).await
    }

    async fn find_by_id_for_update(&self, id: &str) -> Result<Option<LockedSession>, RepositoryError> {
        let guard = self.locks.acquire(id).await;
        Ok(self
            .load(id)
            .await?
            .map(|session| LockedSession::new(session, guard)))
    }

    async fn update(&self, session: &Session) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET
                device_id = ?,
                queue_head = ?,
                state_type = ?,
                expired_at = ?
            WHERE id = ?
            "#,
        )
        .bind(session.device_id())
        .bind(session.queue_head() as i64)
        .bind(session.state().as_str())
        .bind(format_timestamp(session.expired_at()))
        .bind(session.id())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(session.id().to_string()));
        }
        Ok(())
    }

    async fn store_queue_track(&self, uri: &str, session_id: &str) -> Result<QueueTrack, RepositoryError> {
        // index 在同一条语句内计算，SQLite 单写者保证并发追加不产生空洞或重复
        let row: QueueTrackRow = sqlx::query_as(
            r#"
            INSERT INTO queue_tracks (session_id, track_index, uri)
            SELECT ?, COALESCE(MAX(track_index), -1) + 1, ?
            FROM queue_tracks WHERE session_id = ?
            RETURNING track_index, uri, session_id
            "#,
        )
        .bind(session_id)
        .bind(uri)
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(row.into())
    }

    async fn archive_sessions_for_batch(&self) -> Result<u64, RepositoryError> {
        let now = format_timestamp(Utc::now());

        let ids: Vec<(String,)> = sqlx::query_as(
            "SELECT id FROM sessions WHERE state_type != 'ARCHIVED' AND expired_at < ?",
        )
        .bind(&now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        let mut archived = 0;
        for (id,) in ids {
            // 与调度循环使用同一把会话锁，避免覆盖进行中的读-改-写
            let _guard = self.locks.acquire(&id).await;
            let result = sqlx::query(
                "UPDATE sessions SET state_type = 'ARCHIVED' WHERE id = ? AND state_type != 'ARCHIVED' AND expired_at < ?",
            )
            .bind(&id)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;
            archived += result.rows_affected();
        }

        Ok(archived)
    }
}
