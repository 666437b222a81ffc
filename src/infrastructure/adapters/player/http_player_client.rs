//! HTTP Player Client - 调用外部播放服务的 Web API
//!
//! 实现 PlayerPort trait，接口形状与 Spotify Web API `/v1/me/player` 一致:
//! - GET  /v1/me/player            当前播放状态，204 表示没有活动设备
//! - PUT  /v1/me/player/play       开始/恢复播放，可携带 {"uris": [...]}
//! - PUT  /v1/me/player/pause
//! - POST /v1/me/player/queue?uri=
//! - PUT  /v1/me/player/repeat?state=off|track
//! - PUT  /v1/me/player/shuffle?state=true|false
//! - POST /v1/me/player/next
//!
//! 所有控制接口都接受可选的 `device_id` 查询参数

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::ports::{PlayerError, PlayerPort};
use crate::domain::session::CurrentPlayingInfo;

/// HTTP 播放器客户端配置
#[derive(Debug, Clone)]
pub struct HttpPlayerClientConfig {
    /// 播放服务基础 URL
    pub base_url: String,
    /// Bearer token
    pub access_token: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpPlayerClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.spotify.com".to_string(),
            access_token: String::new(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlayerStateResponse {
    #[serde(default)]
    device: Option<DeviceResponse>,
    #[serde(default)]
    progress_ms: Option<u64>,
    #[serde(default)]
    is_playing: bool,
    #[serde(default)]
    item: Option<TrackResponse>,
}

#[derive(Debug, Deserialize)]
struct DeviceResponse {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackResponse {
    uri: String,
    duration_ms: u64,
}

#[derive(Debug, Serialize)]
struct PlayRequest<'a> {
    uris: &'a [String],
}

impl TryFrom<PlayerStateResponse> for CurrentPlayingInfo {
    type Error = PlayerError;

    fn try_from(body: PlayerStateResponse) -> Result<Self, Self::Error> {
        let item = body.item.ok_or(PlayerError::NoActiveDevice)?;
        Ok(CurrentPlayingInfo {
            track_uri: item.uri,
            progress: Duration::from_millis(body.progress_ms.unwrap_or(0)),
            duration: Duration::from_millis(item.duration_ms),
            device_id: body.device.and_then(|d| d.id),
            is_playing: body.is_playing,
        })
    }
}

/// HTTP 播放器客户端
pub struct HttpPlayerClient {
    client: Client,
    config: HttpPlayerClientConfig,
}

impl HttpPlayerClient {
    pub fn new(config: HttpPlayerClientConfig) -> Result<Self, PlayerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PlayerError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/me/player{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str, device_id: Option<&str>) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, self.url(path))
            .bearer_auth(&self.config.access_token);
        if let Some(device_id) = device_id {
            builder = builder.query(&[("device_id", device_id)]);
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, PlayerError> {
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                PlayerError::Timeout
            } else if e.is_connect() {
                PlayerError::NetworkError(format!("Cannot connect to player service: {}", e))
            } else {
                PlayerError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PlayerError::NoActiveDevice);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PlayerError::ServiceError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }
        Ok(response)
    }

    async fn command(&self, builder: RequestBuilder, action: &'static str) -> Result<(), PlayerError> {
        self.send(builder).await?;
        tracing::debug!(action = action, "Player command sent");
        Ok(())
    }
}

#[async_trait]
impl PlayerPort for HttpPlayerClient {
    async fn currently_playing(&self) -> Result<CurrentPlayingInfo, PlayerError> {
        let response = self.send(self.request(Method::GET, "", None)).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Err(PlayerError::NoActiveDevice);
        }

        let body: PlayerStateResponse = response
            .json()
            .await
            .map_err(|e| PlayerError::InvalidResponse(e.to_string()))?;
        CurrentPlayingInfo::try_from(body)
    }

    async fn play(&self, device_id: Option<&str>) -> Result<(), PlayerError> {
        self.command(self.request(Method::PUT, "/play", device_id), "play")
            .await
    }

    async fn play_with_tracks(&self, device_id: Option<&str>, track_uris: &[String]) -> Result<(), PlayerError> {
        let builder = self
            .request(Method::PUT, "/play", device_id)
            .json(&PlayRequest { uris: track_uris });
        self.command(builder, "play_with_tracks").await
    }

    async fn pause(&self, device_id: Option<&str>) -> Result<(), PlayerError> {
        self.command(self.request(Method::PUT, "/pause", device_id), "pause")
            .await
    }

    async fn enqueue(&self, track_uri: &str, device_id: Option<&str>) -> Result<(), PlayerError> {
        let builder = self
            .request(Method::POST, "/queue", device_id)
            .query(&[("uri", track_uri)]);
        self.command(builder, "enqueue").await
    }

    async fn set_repeat_mode(&self, on: bool, device_id: Option<&str>) -> Result<(), PlayerError> {
        let state = if on { "track" } else { "off" };
        let builder = self
            .request(Method::PUT, "/repeat", device_id)
            .query(&[("state", state)]);
        self.command(builder, "set_repeat_mode").await
    }

    async fn set_shuffle_mode(&self, on: bool, device_id: Option<&str>) -> Result<(), PlayerError> {
        let builder = self
            .request(Method::PUT, "/shuffle", device_id)
            .query(&[("state", on)]);
        self.command(builder, "set_shuffle_mode").await
    }

    async fn skip_current_track(&self, device_id: Option<&str>) -> Result<(), PlayerError> {
        self.command(self.request(Method::POST, "/next", device_id), "skip_current_track")
            .await
    }
}
