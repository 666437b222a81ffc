//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现

pub mod adapters;
pub mod events;
pub mod http;
pub mod memory;
pub mod persistence;
pub mod worker;

pub use events::EventPublisher;
pub use memory::{InMemorySessionRepository, InMemoryTimerManager};
pub use worker::{ArchiveWorker, ArchiveWorkerConfig};
