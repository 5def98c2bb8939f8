//! Error mapping at the request boundary.
//!
//! Domain errors from [`open_class`] carry more detail than clients should
//! see. [`ApiError`] maps each variant to an HTTP status and a client-safe
//! message; store and hashing failures are logged inside the request span
//! and collapse to a generic 500 body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use open_class::{AuthError, LmsError};
use serde::Serialize;

/// JSON error body, `{ "error": "..." }`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error already mapped to an HTTP status
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Missing or unusable credentials
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    /// Authenticated but not allowed
    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "Forbidden")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = match &err {
            AuthError::InvalidCredentials | AuthError::InvalidToken | AuthError::Jwt(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Blocked | AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::Store(_) | AuthError::HashingFailed => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }

        Self {
            status,
            message: err.client_message(),
        }
    }
}

impl From<LmsError> for ApiError {
    fn from(err: LmsError) -> Self {
        let status = match &err {
            LmsError::NotFound(_) => StatusCode::NOT_FOUND,
            LmsError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            LmsError::ProfileExists => StatusCode::CONFLICT,
            LmsError::NotOwner | LmsError::Forbidden => StatusCode::FORBIDDEN,
            LmsError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }

        Self {
            status,
            message: err.client_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}
