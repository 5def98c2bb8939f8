//! # OpenClass
//!
//! A learning platform backend built around a token-based session core.
//!
//! This library provides user accounts with role-based access, JWT session
//! management with rotating refresh tokens, and the learning content domain
//! (tracks, teacher profiles, videos, timed tests, PDF guides, comments and
//! scored attempts). Storage sits behind repository traits with a Postgres
//! backend for production and an in-memory backend for development and tests.
//!
//! ## Session lifecycle
//!
//! A session moves through four states, driven by [`auth::AuthManager`]:
//!
//! - **Anonymous**: no tokens; only register and login are reachable
//! - **Active**: a short-lived access token plus a long-lived refresh token,
//!   whose sha256 fingerprint is stored server-side
//! - **Rotated**: a refresh exchange atomically swapped the stored
//!   fingerprint, so each refresh token works exactly once
//! - **Revoked**: logout cleared the fingerprint and bumped the user's token
//!   version, which invalidates every outstanding token of both kinds
//!
//! ## Core Modules
//!
//! - [`auth`]: accounts, password hashing, token codec and session manager
//! - [`lms`]: learning content rules and views
//! - [`db`]: repository traits, Postgres and in-memory backends, schema
//! - [`seed`]: startup admin and demo fixtures
//!
//! ## Example
//!
//! ```
//! use open_class::auth::TokenCodec;
//!
//! // Refresh tokens are stored server-side only as fingerprints.
//! let fingerprint = TokenCodec::fingerprint("opaque-refresh-token");
//! assert_eq!(fingerprint.len(), 64);
//! ```

/// Accounts, tokens and session management.
pub mod auth;
pub use auth::{AuthError, AuthManager, Role, SanitizedUser, TokenCodec, User};

/// Storage backends and schema.
pub mod db;
pub use db::{Database, DatabaseConfig};

/// Learning content domain.
pub mod lms;
pub use lms::{LmsError, LmsManager};

/// Startup seeding.
pub mod seed;
