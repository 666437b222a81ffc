//! In-Memory Timer Manager Implementation

use dashmap::DashMap;
use std::sync::Arc;

use crate::application::ports::{SyncCheckTimer, TimerError, TimerManagerPort};

/// 内存计时器注册表
pub struct InMemoryTimerManager {
    /// session_id -> SyncCheckTimer
    timers: DashMap<String, Arc<SyncCheckTimer>>,
}

impl InMemoryTimerManager {
    pub fn new() -> Self {
        Self {
            timers: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl Default for InMemoryTimerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerManagerPort for InMemoryTimerManager {
    fn create_timer(&self, session_id: &str) -> Arc<SyncCheckTimer> {
        let timer = Arc::new(SyncCheckTimer::new(session_id));

        if let Some(previous) = self.timers.insert(session_id.to_string(), timer.clone()) {
            // 已停止的旧计时器（暂停、归档）上残留的跳过不再有效
            if previous.stop() && previous.has_pending_skip() {
                timer.skip();
                tracing::info!(session_id = %session_id, "Pending skip moved to new timer");
            }
            tracing::debug!(session_id = %session_id, "Previous timer superseded");
        }

        tracing::debug!(session_id = %session_id, "Timer created");
        timer
    }

    fn get_timer(&self, session_id: &str) -> Option<Arc<SyncCheckTimer>> {
        self.timers.get(session_id).map(|t| t.clone())
    }

    fn stop_timer(&self, session_id: &str) -> bool {
        let stopped = self
            .timers
            .get(session_id)
            .map(|t| t.stop())
            .unwrap_or(false);

        if stopped {
            tracing::debug!(session_id = %session_id, "Timer stopped");
        }
        stopped
    }

    fn skip_timer(&self, session_id: &str) -> Result<(), TimerError> {
        let timer = self
            .timers
            .get(session_id)
            .ok_or_else(|| TimerError::NotFound(session_id.to_string()))?;

        if !timer.skip() {
            return Err(TimerError::AlreadyStopped(session_id.to_string()));
        }
        Ok(())
    }

    fn delete_timer(&self, session_id: &str) {
        if self.timers.remove(session_id).is_some() {
            tracing::debug!(session_id = %session_id, "Timer deleted");
        }
    }

    fn delete_timer_if(&self, session_id: &str, timer: &Arc<SyncCheckTimer>) -> bool {
        self.timers
            .remove_if(session_id, |_, current| Arc::ptr_eq(current, timer))
            .is_some()
    }

    fn exists(&self, session_id: &str) -> bool {
        self.timers.contains_key(session_id)
    }
}
