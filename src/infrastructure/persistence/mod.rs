//! Persistence Layer - 数据持久化
//!
//! SQLite 存储实现与会话锁注册表

mod locks;
pub mod sqlite;

pub use locks::SessionLocks;
