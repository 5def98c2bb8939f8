//! Error types for learning content operations.

use thiserror::Error;

use crate::db::repository::StoreError;

/// Errors raised by the content manager
#[derive(Error, Debug)]
pub enum LmsError {
    /// Store operation failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The named resource does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Request payload failed validation
    #[error("{0}")]
    InvalidInput(String),

    /// The teacher already has a profile in this track
    #[error("Profile already exists for this track")]
    ProfileExists,

    /// Caller does not own the target profile
    #[error("Not the owner of this profile")]
    NotOwner,

    /// Caller's role is not allowed to perform this operation
    #[error("Forbidden")]
    Forbidden,
}

impl LmsError {
    /// Message safe to show to API clients
    pub fn client_message(&self) -> String {
        match self {
            LmsError::Store(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

/// Convenience alias for content results
pub type LmsResult<T> = Result<T, LmsError>;
