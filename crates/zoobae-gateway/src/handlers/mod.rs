//! HTTP handlers and the shared error/auth plumbing.
//!
//! Errors render as `{"detail": "..."}`. The bearer token is the user's registered e-mail.

pub mod chat;
pub mod users;

use crate::AppState;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use zoobae_core::{CoreError, UserRecord};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Invalid authentication credentials")
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        let status = match &e {
            CoreError::HistoryEmpty | CoreError::UserNotFound => StatusCode::NOT_FOUND,
            CoreError::DuplicateUser(_) | CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CoreError::Persistence(_)
            | CoreError::Serialization(_)
            | CoreError::Config(_)
            | CoreError::ConfigLoad(_) => {
                tracing::error!(target: "zoobae::gateway", error = %e, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let detail = match e {
            CoreError::HistoryEmpty => "No chat history found".to_string(),
            CoreError::UserNotFound => "User not found".to_string(),
            CoreError::DuplicateUser(_) => "Email already registered".to_string(),
            other => other.to_string(),
        };
        Self { status, detail }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "detail": self.detail })),
        )
            .into_response()
    }
}

/// Resolve `Authorization: Bearer <email>` to a registered, active user.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<UserRecord, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(ApiError::unauthorized)?;
    match state.users.find_by_email(token)? {
        Some(user) if user.is_active => Ok(user),
        _ => Err(ApiError::unauthorized()),
    }
}
