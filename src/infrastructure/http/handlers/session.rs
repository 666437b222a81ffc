//! Session Handlers

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::application::{
    AddQueueTrackCommand, ChangePlaybackStateCommand, CreateSessionCommand, GetSession,
    SetDeviceCommand, SkipTrackCommand,
};
use crate::domain::session::StateType;
use crate::infrastructure::http::dto::{
    AddQueueTrackRequest, AddQueueTrackResponseDto, ApiResponse, ChangePlaybackStateRequest,
    CreateSessionRequest, Empty, PlaybackStateResponseDto, SessionResponse, SetDeviceRequest,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::extract::CurrentUser;
use crate::infrastructure::http::state::AppState;

// ============================================================================
// Create / Get
// ============================================================================

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let cmd = CreateSessionCommand {
        name: req.name,
        creator_id: user_id,
    };

    let result = state.create_session_handler.handle(cmd).await?;

    Ok(Json(ApiResponse::success(SessionResponse::from(&result.session))))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let detail = state
        .get_session_handler
        .handle(GetSession { session_id })
        .await?;

    Ok(Json(ApiResponse::success(SessionResponse::from(detail))))
}

// ============================================================================
// Queue
// ============================================================================

pub async fn add_queue_track(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<AddQueueTrackRequest>,
) -> Result<Json<ApiResponse<AddQueueTrackResponseDto>>, ApiError> {
    let cmd = AddQueueTrackCommand {
        session_id,
        track_uri: req.uri,
    };

    let result = state.add_queue_track_handler.handle(cmd).await?;

    Ok(Json(ApiResponse::success(AddQueueTrackResponseDto {
        index: result.track.index(),
        uri: result.track.uri().to_string(),
        enqueued: result.enqueued,
    })))
}

pub async fn skip_track(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    state
        .skip_track_handler
        .handle(SkipTrackCommand { session_id })
        .await?;

    Ok(Json(ApiResponse::ok()))
}

// ============================================================================
// Playback state / device
// ============================================================================

pub async fn change_playback_state(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<ChangePlaybackStateRequest>,
) -> Result<Json<ApiResponse<PlaybackStateResponseDto>>, ApiError> {
    let target = StateType::parse(&req.state).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let cmd = ChangePlaybackStateCommand {
        session_id,
        state: target,
    };

    let result = state.change_playback_state_handler.handle(cmd).await?;

    Ok(Json(ApiResponse::success(PlaybackStateResponseDto {
        session_id: result.session_id,
        state: result.state.as_str().to_string(),
    })))
}

pub async fn set_device(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<SetDeviceRequest>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    let cmd = SetDeviceCommand {
        session_id,
        user_id,
        device_id: req.device_id,
    };

    state.set_device_handler.handle(cmd).await?;

    Ok(Json(ApiResponse::ok()))
}
