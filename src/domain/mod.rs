//! Domain Layer - 领域层
//!
//! 只有一个限界上下文:
//! - Session Context: 共享收听会话

pub mod session;
