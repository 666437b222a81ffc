//! Event Publisher Implementation
//!
//! 每个会话一个 broadcast 通道，推送是 fire-and-forget 的:
//! 没有订阅者时事件直接丢弃

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::domain::session::SessionEvent;

const CHANNEL_CAPACITY: usize = 100;

/// 事件发布器
pub struct EventPublisher {
    /// session_id -> broadcast sender
    session_channels: DashMap<String, broadcast::Sender<SessionEvent>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            session_channels: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 订阅会话事件，通道不存在时创建
    pub fn register_session(&self, session_id: &str) -> broadcast::Receiver<SessionEvent> {
        self.session_channels
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// 获取已存在通道的接收器
    pub fn subscribe(&self, session_id: &str) -> Option<broadcast::Receiver<SessionEvent>> {
        self.session_channels.get(session_id).map(|s| s.subscribe())
    }

    /// 最后一个订阅者离开后移除通道
    pub fn release_session(&self, session_id: &str) {
        let removed = self
            .session_channels
            .remove_if(session_id, |_, tx| tx.receiver_count() == 0)
            .is_some();
        if removed {
            tracing::debug!(session_id = %session_id, "Event channel released");
        }
    }

    /// 推送事件给会话的所有订阅者
    pub fn push(&self, session_id: &str, event: SessionEvent) {
        let Some(sender) = self.session_channels.get(session_id) else {
            tracing::debug!(session_id = %session_id, event = ?event, "No listeners, event dropped");
            return;
        };

        match sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(session_id = %session_id, receivers = receivers, "Event pushed");
            }
            Err(e) => {
                tracing::debug!(
                    session_id = %session_id,
                    error = %e,
                    "Failed to push event (no receivers)"
                );
            }
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_reaches_all_listeners() {
        let publisher = EventPublisher::new();
        let mut a = publisher.register_session("s1");
        let mut b = publisher.register_session("s1");
        let mut other = publisher.register_session("s2");

        publisher.push("s1", SessionEvent::NextTrack { head: 1 });

        assert_eq!(a.recv().await.unwrap(), SessionEvent::NextTrack { head: 1 });
        assert_eq!(b.recv().await.unwrap(), SessionEvent::NextTrack { head: 1 });
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn test_push_without_listeners_is_dropped() {
        let publisher = EventPublisher::new();
        publisher.push("s1", SessionEvent::Play);
        assert!(publisher.subscribe("s1").is_none());
    }

    #[test]
    fn test_release_keeps_channel_with_receivers() {
        let publisher = EventPublisher::new();
        let rx = publisher.register_session("s1");

        publisher.release_session("s1");
        assert!(publisher.subscribe("s1").is_some());

        drop(rx);
        publisher.release_session("s1");
        assert!(publisher.subscribe("s1").is_none());
    }
}
