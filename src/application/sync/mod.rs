//! Playback Sync - 曲目结束同步
//!
//! 外部播放器自行播放音频，服务端只能通过计时器推测曲目何时结束:
//! - reconciler: 在会话锁内推进队列、校验外部播放器、重新设定计时器
//! - scheduler: 每个播放中会话一个长期任务，等待计时器信号并驱动 reconciler

mod reconciler;
mod scheduler;

use std::time::Duration;

pub use reconciler::{SyncError, SyncOutcome, TrackEndReconciler};
pub use scheduler::TrackEndScheduler;

/// 同步时序参数
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// 开始播放后等待外部播放器就绪的时间
    pub start_grace: Duration,
    /// 首个计时器相对剩余时长的偏移（毫秒，可为负）
    pub sync_offset_ms: i64,
    /// 计时器到期后等待外部播放器切换曲目的时间
    pub track_end_wait: Duration,
    /// 跳过后等待外部播放器状态追上的时间
    pub skip_settle: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            start_grace: Duration::from_secs(5),
            // 恰好在曲目结束时检查会看到外部播放器已切到下一首
            sync_offset_ms: -2000,
            track_end_wait: Duration::from_secs(7),
            skip_settle: Duration::from_millis(300),
        }
    }
}

impl SyncSettings {
    /// 首个计时器时长 = 剩余时长 + 偏移，小于零时取零
    pub fn first_timer_duration(&self, remain: Duration) -> Duration {
        let offset = Duration::from_millis(self.sync_offset_ms.unsigned_abs());
        if self.sync_offset_ms >= 0 {
            remain + offset
        } else {
            remain.saturating_sub(offset)
        }
    }
}
