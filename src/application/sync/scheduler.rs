//! Track End Scheduler - 每个播放中会话的调度循环

use std::sync::Arc;

use super::{SyncOutcome, TrackEndReconciler};
use crate::application::ports::{PlayerPort, SyncCheckTimer, TimerManagerPort, TimerSignal};

/// 调度循环
///
/// 循环持有会话当前的计时器，在 Stop 信号、队列播完、中断或出错时结束，
/// 结束时从注册表中移除自己的计时器
#[derive(Clone)]
pub struct TrackEndScheduler {
    reconciler: Arc<TrackEndReconciler>,
    player: Arc<dyn PlayerPort>,
    timer_manager: Arc<dyn TimerManagerPort>,
}

impl TrackEndScheduler {
    pub fn new(
        reconciler: Arc<TrackEndReconciler>,
        player: Arc<dyn PlayerPort>,
        timer_manager: Arc<dyn TimerManagerPort>,
    ) -> Self {
        Self {
            reconciler,
            player,
            timer_manager,
        }
    }

    /// 启动调度循环
    ///
    /// 计时器在返回前已注册，调用方随后的 stop_timer/skip_timer 一定能作用到这个循环
    pub fn spawn(&self, session_id: &str) -> Arc<SyncCheckTimer> {
        let timer = self.timer_manager.create_timer(session_id);
        let this = self.clone();
        let id = session_id.to_string();
        let first = timer.clone();
        tokio::spawn(async move { this.run(id, first).await });
        timer
    }

    /// 没有运行中的循环时收到跳过请求: 启动循环并立即处理跳过
    pub fn spawn_after_skip(&self, session_id: &str) -> Arc<SyncCheckTimer> {
        let timer = self.spawn(session_id);
        timer.skip();
        timer
    }

    async fn run(self, session_id: String, first: Arc<SyncCheckTimer>) {
        tracing::debug!(session_id = %session_id, "Track end trigger started");

        let settings = self.reconciler.settings().clone();
        let grace = tokio::time::sleep(settings.start_grace);
        tokio::pin!(grace);

        // 等待外部播放器开始播放，期间只响应 Stop/Skip
        let early = tokio::select! {
            biased;
            signal = first.wait() => Some(signal),
            _ = &mut grace => None,
        };

        let mut timer = first;
        match early {
            Some(signal) => {
                if !self.dispatch(&session_id, signal, &mut timer).await {
                    self.finish(&session_id, &timer);
                    return;
                }
            }
            None => match self.player.currently_playing().await {
                Ok(info) => {
                    let duration = settings.first_timer_duration(info.remain());
                    tracing::info!(
                        session_id = %session_id,
                        remain_ms = duration.as_millis() as u64,
                        "Start timer"
                    );
                    timer.set_timer(duration);
                }
                Err(e) => {
                    tracing::error!(
                        session_id = %session_id,
                        error = %e,
                        "Failed to get currently playing info"
                    );
                    self.finish(&session_id, &timer);
                    return;
                }
            },
        }

        loop {
            let signal = timer.wait().await;
            if !self.dispatch(&session_id, signal, &mut timer).await {
                break;
            }
        }

        self.finish(&session_id, &timer);
    }

    /// 处理一个计时器信号，返回循环是否继续
    async fn dispatch(&self, session_id: &str, signal: TimerSignal, timer: &mut Arc<SyncCheckTimer>) -> bool {
        let result = match signal {
            TimerSignal::Stop => {
                tracing::info!(session_id = %session_id, "Stop timer");
                return false;
            }
            TimerSignal::Skip => {
                tracing::debug!(session_id = %session_id, "Call to move next track");
                self.reconciler.handle_skip_track(session_id).await
            }
            TimerSignal::Expire => {
                tracing::debug!(session_id = %session_id, "Trigger expired");
                self.reconciler.handle_track_end(session_id).await
            }
        };

        match result {
            Ok(SyncOutcome::NextTrack(next)) => {
                *timer = next;
                true
            }
            Ok(outcome) => {
                tracing::info!(session_id = %session_id, outcome = ?outcome, "No next track");
                false
            }
            Err(e) if e.is_interrupt() => {
                tracing::info!(session_id = %session_id, error = %e, "Track end detects interrupt");
                false
            }
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Track end handling failed");
                false
            }
        }
    }

    fn finish(&self, session_id: &str, timer: &Arc<SyncCheckTimer>) {
        timer.stop();
        self.timer_manager.delete_timer_if(session_id, timer);
        tracing::debug!(session_id = %session_id, "Track end trigger finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::SessionRepositoryPort;
    use crate::application::sync::SyncSettings;
    use crate::domain::session::{Session, SessionEvent, StateType};
    use crate::infrastructure::adapters::FakePlayer;
    use crate::infrastructure::events::EventPublisher;
    use crate::infrastructure::memory::{InMemorySessionRepository, InMemoryTimerManager};
    use chrono::{Duration as ChronoDuration, Utc};
    use std::time::Duration;

    struct Fixture {
        repo: Arc<InMemorySessionRepository>,
        player: Arc<FakePlayer>,
        timers: Arc<InMemoryTimerManager>,
        publisher: Arc<EventPublisher>,
        scheduler: TrackEndScheduler,
    }

    fn fixture() -> Fixture {
        let repo = InMemorySessionRepository::new().arc();
        let player = Arc::new(FakePlayer::new(Duration::from_secs(30)));
        let timers = InMemoryTimerManager::new().arc();
        let publisher = EventPublisher::new().arc();
        let reconciler = Arc::new(TrackEndReconciler::new(
            repo.clone(),
            player.clone(),
            timers.clone(),
            publisher.clone(),
            SyncSettings::default(),
        ));
        let scheduler = TrackEndScheduler::new(reconciler, player.clone(), timers.clone());
        Fixture {
            repo,
            player,
            timers,
            publisher,
            scheduler,
        }
    }

    async fn start_playing(f: &Fixture, tracks: usize) -> String {
        let session =
            Session::new("friday", "creator", Utc::now() + ChronoDuration::days(3)).unwrap();
        let id = session.id().to_string();
        f.repo.store_session(&session).await.unwrap();
        let uris: Vec<String> = (0..tracks).map(|i| format!("spotify:track:{}", i)).collect();
        for uri in &uris {
            f.repo.store_queue_track(uri, &id).await.unwrap();
        }

        let mut session = f.repo.find_by_id(&id).await.unwrap().unwrap();
        session.move_to_play().unwrap();
        f.repo.update(&session).await.unwrap();

        f.player.play_with_tracks(None, &uris[..1]).await.unwrap();
        f.player.enqueue(&uris[1], None).await.unwrap();
        id
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_plays_queue_to_the_end() {
        let f = fixture();
        let id = start_playing(&f, 3).await;
        let mut rx = f.publisher.register_session(&id);

        f.scheduler.spawn(&id);

        assert_eq!(rx.recv().await.unwrap(), SessionEvent::NextTrack { head: 1 });
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::NextTrack { head: 2 });
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::Stop);

        // 让循环完成清理
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!f.timers.exists(&id));
        let session = f.repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(session.state(), StateType::Stop);
        assert_eq!(session.queue_head(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_loop_without_reconciling() {
        let f = fixture();
        let id = start_playing(&f, 2).await;
        let mut rx = f.publisher.register_session(&id);

        f.scheduler.spawn(&id);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(f.timers.exists(&id));

        assert!(f.timers.stop_timer(&id));
        assert!(!f.timers.stop_timer(&id));
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert!(rx.try_recv().is_err());
        assert!(!f.timers.exists(&id));
        assert_eq!(f.repo.find_by_id(&id).await.unwrap().unwrap().queue_head(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_during_grace_period() {
        let f = fixture();
        let id = start_playing(&f, 3).await;
        let mut rx = f.publisher.register_session(&id);

        f.scheduler.spawn(&id);
        tokio::time::sleep(Duration::from_secs(1)).await;
        f.player.skip_current_track(None).await.unwrap();
        f.timers.skip_timer(&id).unwrap();

        assert_eq!(rx.recv().await.unwrap(), SessionEvent::NextTrack { head: 1 });
        assert!(f.timers.exists(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_after_skip_recovers_loop() {
        let f = fixture();
        let id = start_playing(&f, 3).await;
        let mut rx = f.publisher.register_session(&id);

        f.player.skip_current_track(None).await.unwrap();
        f.scheduler.spawn_after_skip(&id);

        assert_eq!(rx.recv().await.unwrap(), SessionEvent::NextTrack { head: 1 });
        assert!(f.timers.exists(&id));
    }
}
