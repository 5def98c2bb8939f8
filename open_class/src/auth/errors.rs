//! Authentication and session error types.

use thiserror::Error;

use crate::db::repository::StoreError;

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Storage error
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Password hashing failed
    #[error("Password hashing failed")]
    HashingFailed,

    /// Credentials did not match any account. Covers both an unknown email
    /// and a wrong password so callers cannot probe which emails exist.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Email already registered
    #[error("Email already registered")]
    EmailTaken,

    /// Request field failed validation
    #[error("{0}")]
    InvalidInput(String),

    /// Account is blocked
    #[error("User is blocked")]
    Blocked,

    /// Token rejected: missing subject, stale version or stale refresh hash
    #[error("Invalid token")]
    InvalidToken,

    /// JWT decode/encode error
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Role does not permit the operation
    #[error("Forbidden")]
    Forbidden,

    /// Target user does not exist
    #[error("User not found")]
    UserNotFound,
}

impl AuthError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Storage and JWT errors are sanitized to prevent information disclosure
    /// about the internal system structure.
    pub fn client_message(&self) -> String {
        match self {
            // Sanitize storage errors - don't expose SQL details
            AuthError::Store(_) | AuthError::HashingFailed => "Internal server error".to_string(),
            // Sanitize JWT errors - don't expose token structure
            AuthError::Jwt(_) => "Invalid token".to_string(),
            // All other errors are safe to expose
            _ => self.to_string(),
        }
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
