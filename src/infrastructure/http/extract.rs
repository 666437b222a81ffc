//! Request Extractors

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::error::ApiError;

/// 调用方用户 ID 所在的请求头（认证在上游完成）
pub const USER_ID_HEADER: &str = "x-user-id";

/// 当前用户
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| CurrentUser(v.to_string()))
            .ok_or_else(|| ApiError::Unauthorized("missing X-User-Id header".to_string()))
    }
}
