//! Account registration and the profile name. Just enough to issue the e-mail bearer token
//! the chat routes expect and to fill the responder's profile context.

use super::{authenticate, ApiError};
use crate::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use zoobae_core::UserRecord;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub profile: Option<String>,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email,
            profile: user.profile_name,
        }
    }
}

#[derive(Deserialize)]
pub struct ProfileUpdate {
    pub name: String,
}

/// POST /register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.users.register(&req.email, req.name.as_deref())?;
    Ok(Json(user.into()))
}

/// GET /profile
pub async fn get_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, ApiError> {
    let user = authenticate(&state, &headers)?;
    Ok(Json(user.into()))
}

/// PUT /profile
pub async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = authenticate(&state, &headers)?;
    let user = state.users.set_profile_name(&user.id, &req.name)?;
    tracing::info!(target: "zoobae::gateway", user_id = %user.id, "profile updated");
    Ok(Json(user.into()))
}
