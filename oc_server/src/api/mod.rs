//! HTTP API for the OpenClass server.
//!
//! This module provides the complete REST surface: session lifecycle,
//! account self-service, admin user management and the learning content
//! domain (tracks, teacher profiles, videos, tests, guides).
//!
//! # Architecture
//!
//! - **Axum**: Async web framework, one router for the whole API
//! - **Cookie sessions**: JWT access/refresh tokens carried in httpOnly
//!   cookies, set and cleared by the session handlers
//! - **Layered guards**: an authentication layer resolves the user, role
//!   guards sit on the admin and teacher route groups
//! - **Tower**: CORS and request-id middleware
//!
//! # Modules
//!
//! - [`auth`]: Session lifecycle (register, login, refresh, logout)
//! - [`me`]: Current-user read and profile update
//! - [`admin`]: User administration and track creation
//! - [`lms`]: Learning content endpoints
//! - [`middleware`]: Authentication layer and role guards
//! - [`rate_limiter`]: Per-IP budget for the credential endpoints
//! - [`request_id`]: Correlation IDs for request tracing
//! - [`error`]: Domain error to HTTP response mapping
//!
//! # Endpoints Overview
//!
//! ## Public
//! - `GET  /api/health` - Health check
//! - `POST /api/auth/register` - Register student account (rate limited)
//! - `POST /api/auth/login` - Login (rate limited)
//! - `POST /api/auth/refresh` - Rotate session cookies
//! - `POST /api/auth/logout` - Revoke session, clear cookies
//!
//! ## Authenticated
//! - `GET  /api/me` / `PATCH /api/me` - Current account
//! - `GET  /api/tracks` - Track listing
//! - `GET  /api/tracks/{id}/teachers` - Track with teacher profiles
//! - `GET  /api/profiles/{id}` (+ `/videos`, `/tests`, `/guides`)
//! - `GET  /api/videos/{id}` - Video with comments
//! - `POST /api/videos/{id}/comments` - Comment (students and admins)
//! - `GET  /api/tests/{id}` - Test detail, answers role-gated
//! - `POST /api/tests/{id}/attempts` - Submit answers (students)
//!
//! ## Teacher or admin
//! - `POST /api/teacher/tracks/{id}/profile` - Create own profile
//! - `POST /api/teacher/profiles/{id}/videos` - Publish video
//! - `POST /api/teacher/profiles/{id}/tests` - Create test
//! - `POST /api/teacher/profiles/{id}/guides` - Publish guide
//!
//! ## Admin only
//! - `GET  /api/admin/users` - List users
//! - `POST /api/admin/users/{id}/role` - Assign student or teacher role
//! - `POST /api/admin/users/{id}/block` - Block or unblock
//! - `POST /api/admin/tracks` - Create track
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use oc_server::api::{AppState, StorageKind, create_router};
//! use oc_server::config::ServerConfig;
//! use open_class::auth::{AuthManager, TokenCodec};
//! use open_class::db::{MemoryContentRepository, MemoryUserRepository, UserRepository};
//! use open_class::lms::LmsManager;
//! use std::sync::Arc;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let config: ServerConfig = unimplemented!();
//!
//! let users: Arc<dyn UserRepository> = Arc::new(MemoryUserRepository::new());
//! let content = Arc::new(MemoryContentRepository::new());
//! let codec = TokenCodec::new(
//!     config.security.access_token_secret.clone(),
//!     config.security.refresh_token_secret.clone(),
//!     config.tokens.access_ttl_secs,
//!     config.tokens.refresh_ttl_secs,
//! );
//! let auth = Arc::new(AuthManager::new(
//!     users.clone(),
//!     codec,
//!     config.security.password_pepper.clone(),
//! ));
//! let lms = Arc::new(LmsManager::new(content, users.clone()));
//!
//! let state = AppState {
//!     auth,
//!     lms,
//!     users,
//!     config: Arc::new(config),
//!     storage: StorageKind::Memory,
//! };
//!
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Security
//!
//! - Sessions ride on httpOnly cookies; `oc_rt` is path-scoped to `/api/auth`
//! - Access tokens expire after 15 minutes, refresh tokens after 30 days
//! - Refresh tokens are single-use; a rotation swaps the stored fingerprint
//! - Register and login share a per-IP rate limit budget
//! - Passwords are hashed with Argon2id plus a server-side pepper
//!
//! # CORS
//!
//! Cross-origin access is off unless `APP_ORIGIN` names the exact frontend
//! origin. Credentials are allowed only for that origin, never for `*`.

pub mod admin;
pub mod auth;
pub mod error;
pub mod lms;
pub mod me;
pub mod middleware;
pub mod rate_limiter;
pub mod request_id;

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use open_class::auth::AuthManager;
use open_class::db::UserRepository;
use open_class::lms::LmsManager;

use crate::config::ServerConfig;

/// Which storage backend the server was started with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Postgres,
    Memory,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Postgres => "postgres",
            StorageKind::Memory => "memory",
        }
    }
}

/// Application state shared across all HTTP handlers.
///
/// Cloned per request (cheap due to Arc wrappers).
///
/// # Fields
///
/// - `auth`: Accounts, password hashing and session tokens
/// - `lms`: Learning content rules and views
/// - `users`: User store handle, used directly for health pings
/// - `config`: Resolved server configuration
/// - `storage`: Backend reported by the health endpoint
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthManager>,
    pub lms: Arc<LmsManager>,
    pub users: Arc<dyn UserRepository>,
    pub config: Arc<ServerConfig>,
    pub storage: StorageKind,
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Arguments
///
/// - `state`: Application state with managers
///
/// # Returns
///
/// Configured Axum router ready to serve requests
///
/// # Example
///
/// ```rust,no_run
/// # use oc_server::api::{create_router, AppState};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let state: AppState = unimplemented!();
/// let app = create_router(state);
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState) -> Router {
    let auth_limiter = Arc::new(rate_limiter::RateLimiterMap::auth_strict());

    // Register and login burn the per-IP budget. The session endpoints
    // stay outside it; they are gated by the refresh cookie instead.
    let credential_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route_layer(axum::middleware::from_fn(move |request, next| {
            let limiter = auth_limiter.clone();
            async move { rate_limiter::rate_limit_middleware(limiter, request, next).await }
        }));

    let session_routes = Router::new()
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout));

    let admin_routes = Router::new()
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{user_id}/role", post(admin::set_role))
        .route("/admin/users/{user_id}/block", post(admin::set_blocked))
        .route("/admin/tracks", post(admin::create_track))
        .route_layer(axum::middleware::from_fn(|request, next| {
            middleware::require_role(middleware::ADMIN_ONLY, request, next)
        }));

    let teacher_routes = Router::new()
        .route(
            "/teacher/tracks/{track_id}/profile",
            post(lms::create_profile),
        )
        .route(
            "/teacher/profiles/{profile_id}/videos",
            post(lms::create_video),
        )
        .route(
            "/teacher/profiles/{profile_id}/tests",
            post(lms::create_test),
        )
        .route(
            "/teacher/profiles/{profile_id}/guides",
            post(lms::create_guide),
        )
        .route_layer(axum::middleware::from_fn(|request, next| {
            middleware::require_role(middleware::TEACHER_OR_ADMIN, request, next)
        }));

    // Everything below requires a session. The role guards above run after
    // this router's auth layer has injected the user.
    let protected_routes = Router::new()
        .route("/me", get(me::get_me).patch(me::update_me))
        .route("/tracks", get(lms::list_tracks))
        .route("/tracks/{track_id}/teachers", get(lms::track_teachers))
        .route("/profiles/{profile_id}", get(lms::profile_detail))
        .route("/profiles/{profile_id}/videos", get(lms::profile_videos))
        .route("/profiles/{profile_id}/tests", get(lms::profile_tests))
        .route("/profiles/{profile_id}/guides", get(lms::profile_guides))
        .route("/videos/{video_id}", get(lms::video_detail))
        .route("/videos/{video_id}/comments", post(lms::add_comment))
        .route("/tests/{test_id}", get(lms::test_detail))
        .route("/tests/{test_id}/attempts", post(lms::submit_attempt))
        .merge(admin_routes)
        .merge(teacher_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .merge(credential_routes)
        .merge(session_routes)
        .merge(protected_routes);

    let mut router = Router::new()
        .nest("/api", api_routes)
        .fallback(not_found)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware));

    if let Some(origin) = state.config.allowed_origin.as_deref()
        && let Some(cors) = cors_layer(origin)
    {
        router = router.layer(cors);
    }

    router.with_state(state)
}

/// Exact-origin CORS with credentials, for the browser frontend.
///
/// Returns `None` when the configured origin is not a valid header value,
/// which leaves cross-origin access disabled.
fn cors_layer(origin: &str) -> Option<CorsLayer> {
    match origin.parse::<HeaderValue>() {
        Ok(origin) => Some(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST, Method::PATCH])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                .allow_credentials(true),
        ),
        Err(_) => {
            tracing::warn!(origin, "Ignoring unparseable APP_ORIGIN");
            None
        }
    }
}

/// Health check endpoint for monitoring and load balancers.
///
/// Pings the active store and reports which backend is serving requests.
/// Returns `200 OK` when the store answers, `503 Service Unavailable`
/// otherwise.
///
/// # Example
///
/// ```bash
/// curl http://localhost:8080/api/health
/// # {"ok":true,"env":"development","storage":{"kind":"memory","ok":true}}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store_ok = state.users.ping().await.is_ok();

    let status = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "ok": store_ok,
        "env": state.config.env.as_str(),
        "storage": {
            "kind": state.storage.as_str(),
            "ok": store_ok,
        },
    });

    (status, Json(body))
}

/// JSON 404 for unmatched paths
async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
