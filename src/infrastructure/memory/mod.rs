//! Memory Layer - In-Memory State Management
//!
//! 计时器注册表与内存会话仓储

mod session_repository;
mod timer_manager;

pub use session_repository::InMemorySessionRepository;
pub use timer_manager::InMemoryTimerManager;
