//! Relay - 多人共享收听会话协调服务
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Session Context: 会话状态机、播放队列
//!
//! 应用层 (application/):
//! - Ports: 端口定义（Player, SessionRepository, TimerManager）
//! - Sync: 曲目结束同步（reconciler + 调度循环）
//! - Commands / Queries: CQRS 处理器
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API + WebSocket
//! - Memory: 计时器注册表、内存仓储
//! - Persistence: SQLite 存储与会话锁
//! - Adapters: 外部播放器 HTTP 客户端与 FakePlayer
//! - Events: 会话事件推送
//! - Worker: 过期会话归档

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
