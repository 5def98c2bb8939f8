//! Authentication module providing user registration, login, and session management.
//!
//! This module implements secure authentication with:
//! - Argon2id password hashing with server-side pepper
//! - Short-lived JWT access tokens carrying subject, role and token version
//! - Rotating single-use refresh tokens, stored server-side as sha256 fingerprints
//! - Mass revocation through a per-user token version
//!
//! ## Example
//!
//! ```no_run
//! use open_class::auth::{AuthManager, RegisterRequest, TokenCodec};
//! use open_class::db::MemoryUserRepository;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let codec = TokenCodec::new(
//!         "access-secret-at-least-32-characters".to_string(),
//!         "refresh-secret-at-least-32-character".to_string(),
//!         900,
//!         2_592_000,
//!     );
//!     let auth = AuthManager::new(
//!         Arc::new(MemoryUserRepository::new()),
//!         codec,
//!         "secret_pepper".to_string(),
//!     );
//!
//!     let request = RegisterRequest {
//!         full_name: "Student One".to_string(),
//!         age: Some(21),
//!         email: "student@example.com".to_string(),
//!         phone: None,
//!         password: "SecurePass123".to_string(),
//!     };
//!
//!     let (user, tokens) = auth.register(request).await?;
//!     println!("Registered user {} ({})", user.full_name, tokens.access_token);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;
pub mod tokens;

pub use errors::{AuthError, AuthResult};
pub use manager::{AuthManager, normalize_email};
pub use models::{
    AccessClaims, LoginRequest, RefreshClaims, RegisterRequest, Role, SanitizedUser,
    SessionTokens, UpdateProfileRequest, User, UserId,
};
pub use tokens::TokenCodec;
