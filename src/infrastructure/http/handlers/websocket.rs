//! WebSocket Handler
//!
//! 收听者通过 WebSocket 接收会话事件；连接建立前先检查调度循环是否需要恢复

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::application::ConnectPusherCommand;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// Session WebSocket 连接处理
pub async fn session_websocket_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .connect_pusher_handler
        .handle(ConnectPusherCommand {
            session_id: session_id.clone(),
        })
        .await?;

    Ok(ws.on_upgrade(move |socket| handle_session_socket(socket, session_id, state)))
}

async fn handle_session_socket(socket: WebSocket, session_id: String, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut event_rx = state.event_publisher.register_session(&session_id);

    tracing::info!(session_id = %session_id, "WebSocket connected");

    let session_id_for_forward = session_id.clone();
    let session_id_for_receive = session_id.clone();

    // 事件转发任务
    let mut forward_task = tokio::spawn(async move {
        loop {
            let event = match event_rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        session_id = %session_id_for_forward,
                        skipped = skipped,
                        "WebSocket listener lagged, events skipped"
                    );
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let msg = match serde_json::to_string(&event) {
                Ok(json) => Message::Text(json),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize event");
                    continue;
                }
            };

            if let Err(e) = sender.send(msg).await {
                tracing::debug!(
                    session_id = %session_id_for_forward,
                    error = %e,
                    "Failed to send WebSocket message"
                );
                break;
            }
        }
    });

    // 客户端消息只用于探测断开
    let mut receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    tracing::info!(session_id = %session_id_for_receive, "WebSocket closed by client");
                    break;
                }
                Err(e) => {
                    tracing::debug!(session_id = %session_id_for_receive, error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut forward_task => receive_task.abort(),
        _ = &mut receive_task => {
            forward_task.abort();
            // 等待转发任务释放接收器，随后 release_session 才能看到 0 个订阅者
            let _ = forward_task.await;
        }
    }

    state.event_publisher.release_session(&session_id);
    tracing::info!(session_id = %session_id, "WebSocket disconnected");
}
