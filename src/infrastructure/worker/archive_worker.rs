//! Archive Worker - 定期归档过期会话

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

use crate::application::ports::{RepositoryError, SessionRepositoryPort};

/// Worker 配置
#[derive(Debug, Clone)]
pub struct ArchiveWorkerConfig {
    /// 扫描间隔
    pub interval: Duration,
}

impl Default for ArchiveWorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
        }
    }
}

/// 归档 Worker
///
/// 正在运行的调度循环会在下一次同步时看到 ARCHIVED 并自行结束
pub struct ArchiveWorker {
    config: ArchiveWorkerConfig,
    session_repo: Arc<dyn SessionRepositoryPort>,
}

impl ArchiveWorker {
    pub fn new(config: ArchiveWorkerConfig, session_repo: Arc<dyn SessionRepositoryPort>) -> Self {
        Self {
            config,
            session_repo,
        }
    }

    /// 启动 Worker，首次扫描立即执行
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            "ArchiveWorker started"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep().await {
                tracing::error!(error = %e, "Failed to archive expired sessions");
            }
        }
    }

    /// 执行一次扫描，返回归档的会话数
    pub async fn sweep(&self) -> Result<u64, RepositoryError> {
        let archived = self.session_repo.archive_sessions_for_batch().await?;
        if archived > 0 {
            tracing::info!(archived = archived, "Expired sessions archived");
        } else {
            tracing::debug!("No expired sessions");
        }
        Ok(archived)
    }
}
