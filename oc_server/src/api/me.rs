//! Current-user endpoints.
//!
//! `/api/me` reads and updates the authenticated account itself. Anything
//! touching other accounts lives on the admin surface.

use axum::{Json, extract::State};

use open_class::auth::UpdateProfileRequest;

use super::AppState;
use super::auth::UserResponse;
use super::error::ApiError;
use super::middleware::CurrentUser;

/// The caller's own account, as resolved by the auth layer
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse {
        user: user.sanitized(),
    })
}

/// Update the caller's profile fields.
///
/// Absent fields are left untouched; an empty phone clears the stored
/// value. Email, role, and credentials are not editable here.
///
/// # Errors
///
/// - `400 Bad Request`: Name shorter than 3 characters or age out of range
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.auth.update_profile(user.id, payload).await?;
    Ok(Json(UserResponse {
        user: user.sanitized(),
    }))
}
