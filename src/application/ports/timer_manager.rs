//! Timer Manager Port - 曲目结束计时器
//!
//! 每个播放中的会话持有一个 SyncCheckTimer，调度循环等待它的三种信号:
//! - Stop: 显式终止，不再同步
//! - Skip: 用户跳过当前曲目，提前同步
//! - Expire: 曲目自然结束
//!
//! 具体的注册表实现在 infrastructure/memory 层

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

/// Timer Manager 错误
#[derive(Debug, Error)]
pub enum TimerError {
    #[error("Timer not found: {0}")]
    NotFound(String),

    #[error("Timer already stopped: {0}")]
    AlreadyStopped(String),
}

/// 计时器唤醒原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSignal {
    Stop,
    Skip,
    Expire,
}

/// 单会话计时器
///
/// 状态保存在 watch 通道中，等待方订阅变化而不是轮询
#[derive(Debug)]
pub struct SyncCheckTimer {
    session_id: String,
    stop_tx: watch::Sender<bool>,
    skip_tx: watch::Sender<bool>,
    deadline_tx: watch::Sender<Option<Instant>>,
}

impl SyncCheckTimer {
    /// 创建未设定截止时间的计时器
    pub fn new(session_id: impl Into<String>) -> Self {
        let (stop_tx, _) = watch::channel(false);
        let (skip_tx, _) = watch::channel(false);
        let (deadline_tx, _) = watch::channel(None);
        Self {
            session_id: session_id.into(),
            stop_tx,
            skip_tx,
            deadline_tx,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// 重新设定截止时间为调用时刻之后 `duration`
    ///
    /// 已停止的计时器忽略此调用
    pub fn set_timer(&self, duration: Duration) {
        if self.is_stopped() {
            return;
        }
        self.deadline_tx.send_replace(Some(Instant::now() + duration));
    }

    /// 发出停止信号，只有第一次调用返回 true
    pub fn stop(&self) -> bool {
        self.stop_tx.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        })
    }

    /// 发出跳过信号；计时器已停止时返回 false
    pub fn skip(&self) -> bool {
        if self.is_stopped() {
            return false;
        }
        self.skip_tx.send_replace(true);
        true
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// 是否有尚未被等待方取走的跳过信号
    pub fn has_pending_skip(&self) -> bool {
        *self.skip_tx.borrow()
    }

    /// 取走待处理的跳过信号
    fn take_skip(&self) -> bool {
        self.skip_tx
            .send_if_modified(|pending| std::mem::replace(pending, false))
    }

    /// 等待下一个信号
    ///
    /// 优先级: Stop > Skip > Expire。未设定截止时间时只会被 Stop/Skip 唤醒
    pub async fn wait(&self) -> TimerSignal {
        let mut stop_rx = self.stop_tx.subscribe();
        let mut skip_rx = self.skip_tx.subscribe();
        let mut deadline_rx = self.deadline_tx.subscribe();

        loop {
            if *stop_rx.borrow_and_update() {
                return TimerSignal::Stop;
            }
            skip_rx.borrow_and_update();
            if self.take_skip() {
                return TimerSignal::Skip;
            }

            let deadline = *deadline_rx.borrow_and_update();
            let expiry = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                _ = stop_rx.changed() => {}
                _ = skip_rx.changed() => {}
                _ = deadline_rx.changed() => {}
                _ = expiry => {
                    if *stop_rx.borrow() {
                        return TimerSignal::Stop;
                    }
                    if self.take_skip() {
                        return TimerSignal::Skip;
                    }
                    return TimerSignal::Expire;
                }
            }
        }
    }
}

/// Timer Manager Port
///
/// 进程级的 session_id -> 计时器注册表，同一 id 最多一个活动计时器
pub trait TimerManagerPort: Send + Sync {
    /// 为会话创建新计时器，替换并停止旧计时器
    ///
    /// 旧计时器仍在运行且有待处理的跳过信号时，信号转移到新计时器
    fn create_timer(&self, session_id: &str) -> Arc<SyncCheckTimer>;

    fn get_timer(&self, session_id: &str) -> Option<Arc<SyncCheckTimer>>;

    /// 停止会话的计时器；计时器不存在或已停止时返回 false
    fn stop_timer(&self, session_id: &str) -> bool;

    /// 向会话的计时器发出跳过信号
    fn skip_timer(&self, session_id: &str) -> Result<(), TimerError>;

    fn delete_timer(&self, session_id: &str);

    /// 仅当注册表中仍是给定计时器时删除，返回是否删除
    fn delete_timer_if(&self, session_id: &str, timer: &Arc<SyncCheckTimer>) -> bool;

    fn exists(&self, session_id: &str) -> bool;
}
