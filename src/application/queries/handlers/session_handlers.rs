//! Session Query Handlers

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::{PlayerPort, SessionRepositoryPort};
use crate::application::queries::GetSession;
use crate::domain::session::{CurrentPlayingInfo, Session};

/// 会话详情响应
#[derive(Debug, Clone)]
pub struct SessionDetail {
    pub session: Session,
    /// 外部播放器的当前快照，查询失败时为 None
    pub playing: Option<CurrentPlayingInfo>,
}

/// GetSession Handler
pub struct GetSessionHandler {
    session_repo: Arc<dyn SessionRepositoryPort>,
    player: Arc<dyn PlayerPort>,
}

impl GetSessionHandler {
    pub fn new(session_repo: Arc<dyn SessionRepositoryPort>, player: Arc<dyn PlayerPort>) -> Self {
        Self {
            session_repo,
            player,
        }
    }

    pub async fn handle(&self, query: GetSession) -> Result<SessionDetail, ApplicationError> {
        let session = self
            .session_repo
            .find_by_id(&query.session_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Session", &query.session_id))?;

        let playing = match self.player.currently_playing().await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::debug!(session_id = %query.session_id, error = %e, "Currently playing unavailable");
                None
            }
        };

        Ok(SessionDetail { session, playing })
    }
}
