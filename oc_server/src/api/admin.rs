//! Admin endpoints.
//!
//! User administration and track creation. Every route here sits behind
//! the auth layer plus an admin role guard, so handlers can assume the
//! caller is an admin.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use open_class::auth::{Role, SanitizedUser, User, UserId};
use open_class::lms::{NewTrack, Track};

use super::AppState;
use super::auth::UserResponse;
use super::error::ApiError;

/// Response wrapper for the user listing
#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<SanitizedUser>,
}

/// Body for the role assignment endpoint
#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: String,
}

/// Body for the block endpoint. A missing flag unblocks.
#[derive(Debug, Deserialize)]
pub struct SetBlockedRequest {
    #[serde(default)]
    pub block: bool,
}

/// Response wrapper for track creation
#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub track: Track,
}

/// Every account, sanitized
pub async fn list_users(State(state): State<AppState>) -> Result<Json<UsersResponse>, ApiError> {
    let users = state.auth.list_users().await?;
    Ok(Json(UsersResponse {
        users: users.iter().map(User::sanitized).collect(),
    }))
}

/// Assign a user the student or teacher role.
///
/// The admin role is never assignable here, and admin accounts cannot be
/// modified through this endpoint.
///
/// # Errors
///
/// - `400 Bad Request`: Unknown role name, the admin role, or an admin target
/// - `404 Not Found`: No such user
pub async fn set_role(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(payload): Json<SetRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let role: Role = payload
        .role
        .to_lowercase()
        .parse()
        .map_err(|()| ApiError::new(StatusCode::BAD_REQUEST, "Invalid role"))?;

    let user = state.auth.set_role(user_id, role).await?;
    Ok(Json(UserResponse {
        user: user.sanitized(),
    }))
}

/// Block or unblock a user.
///
/// Blocking takes effect on the target's next gated request; the token
/// version is left alone.
///
/// # Errors
///
/// - `400 Bad Request`: Target is an admin
/// - `404 Not Found`: No such user
pub async fn set_blocked(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(payload): Json<SetBlockedRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.auth.set_blocked(user_id, payload.block).await?;
    Ok(Json(UserResponse {
        user: user.sanitized(),
    }))
}

/// Create a track.
///
/// # Errors
///
/// - `400 Bad Request`: Missing title or description
pub async fn create_track(
    State(state): State<AppState>,
    Json(payload): Json<NewTrack>,
) -> Result<Json<TrackResponse>, ApiError> {
    let track = state.lms.create_track(payload).await?;
    Ok(Json(TrackResponse { track }))
}
