//! Worker Layer - 后台任务

mod archive_worker;

pub use archive_worker::{ArchiveWorker, ArchiveWorkerConfig};
