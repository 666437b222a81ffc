//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping                         GET   健康检查
//! - /api/sessions                     POST  创建会话（X-User-Id 为创建者）
//! - /api/sessions/:id                 GET   会话详情（含外部播放器当前状态）
//! - /api/sessions/:id/queue           POST  追加曲目
//! - /api/sessions/:id/state           PUT   切换播放状态 PLAY/PAUSE/ARCHIVED/STOP
//! - /api/sessions/:id/devices         PUT   绑定播放设备（仅创建者）
//! - /api/sessions/:id/next            POST  跳过当前曲目
//! - /ws/sessions/:id                  WS    会话事件推送

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api", api_routes())
        .route("/ws/sessions/:session_id", get(handlers::session_websocket_handler))
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/sessions", post(handlers::create_session))
        .route("/sessions/:session_id", get(handlers::get_session))
        .route("/sessions/:session_id/queue", post(handlers::add_queue_track))
        .route("/sessions/:session_id/state", put(handlers::change_playback_state))
        .route("/sessions/:session_id/devices", put(handlers::set_device))
        .route("/sessions/:session_id/next", post(handlers::skip_track))
}
