//! Session API handlers.
//!
//! HTTP endpoints for the account session lifecycle:
//! - Registration (always as a student) with an immediate session
//! - Login with email and password
//! - Single-use refresh token rotation
//! - Logout, which revokes the stored refresh fingerprint
//!
//! Sessions ride on two httpOnly cookies instead of response-body tokens:
//! `oc_at` carries the access token on every request, `oc_rt` carries the
//! refresh token scoped down to `/api/auth` so it is only ever sent to the
//! session endpoints. Handlers return the sanitized user, or `{"ok": true}`
//! where there is no user to show.
//!
//! # Examples
//!
//! Register a new account:
//! ```bash
//! curl -X POST http://localhost:8080/api/auth/register \
//!   -H "Content-Type: application/json" \
//!   -c cookies.txt \
//!   -d '{"full_name": "Dana Learner", "email": "dana@example.com", "password": "secret1"}'
//! ```
//!
//! Login:
//! ```bash
//! curl -X POST http://localhost:8080/api/auth/login \
//!   -H "Content-Type: application/json" \
//!   -c cookies.txt \
//!   -d '{"email": "dana@example.com", "password": "secret1"}'
//! ```
//!
//! Rotate the session:
//! ```bash
//! curl -X POST http://localhost:8080/api/auth/refresh -b cookies.txt -c cookies.txt
//! ```

use axum::{Json, extract::State};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;

use open_class::auth::{LoginRequest, RegisterRequest, SanitizedUser, SessionTokens};

use super::AppState;
use super::error::ApiError;

/// Access token cookie, sent on every request
pub const ACCESS_COOKIE: &str = "oc_at";

/// Refresh token cookie, scoped to the session endpoints
pub const REFRESH_COOKIE: &str = "oc_rt";

/// Path restriction for [`REFRESH_COOKIE`]
pub const REFRESH_COOKIE_PATH: &str = "/api/auth";

/// Response wrapper for endpoints that return an account
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: SanitizedUser,
}

/// Response for endpoints with nothing to return
#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// Register a new student account and start a session.
///
/// # Request Body
///
/// ```json
/// {
///   "full_name": "Dana Learner",
///   "email": "dana@example.com",
///   "password": "secret1",
///   "age": 21,       // Optional
///   "phone": null    // Optional
/// }
/// ```
///
/// # Response
///
/// On success, returns `200 OK` with the sanitized user and sets both
/// session cookies:
/// ```json
/// {
///   "user": {
///     "id": 42,
///     "full_name": "Dana Learner",
///     "email": "dana@example.com",
///     "role": "student",
///     ...
///   }
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Invalid name, email, age, or password
/// - `409 Conflict`: Email already registered
///
/// # Security
///
/// - Registration always produces a student; roles are granted by an admin
/// - Passwords are hashed with Argon2id plus a server-side pepper
/// - The response body never includes tokens or credential material
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> Result<(CookieJar, Json<UserResponse>), ApiError> {
    let (user, tokens) = state.auth.register(payload).await?;
    crate::metrics::registrations_total();

    let jar = set_session_cookies(&state, jar, tokens);
    Ok((
        jar,
        Json(UserResponse {
            user: user.sanitized(),
        }),
    ))
}

/// Authenticate with email and password and start a session.
///
/// # Request Body
///
/// ```json
/// {
///   "email": "dana@example.com",
///   "password": "secret1"
/// }
/// ```
///
/// # Response
///
/// On success, returns `200 OK` with the sanitized user and sets both
/// session cookies. Logging in overwrites any previously stored refresh
/// fingerprint, so older sessions can no longer rotate.
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown email or wrong password (one message for both)
/// - `403 Forbidden`: Account is blocked
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<UserResponse>), ApiError> {
    match state.auth.login(payload).await {
        Ok((user, tokens)) => {
            crate::metrics::login_attempts_total(true);
            let jar = set_session_cookies(&state, jar, tokens);
            Ok((
                jar,
                Json(UserResponse {
                    user: user.sanitized(),
                }),
            ))
        }
        Err(err) => {
            crate::metrics::login_attempts_total(false);
            crate::logging::log_security_event("failed_login", None, None, &err.client_message());
            Err(err.into())
        }
    }
}

/// Rotate the session using the refresh cookie.
///
/// Verifies the `oc_rt` cookie against the stored fingerprint, then issues
/// a fresh token pair and resets both cookies. The verified token is
/// consumed by the rotation; replaying it fails.
///
/// # Errors
///
/// - `401 Unauthorized`: Missing, invalid, expired, replayed, or revoked
///   refresh token
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<OkResponse>), ApiError> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(ApiError::unauthorized)?;

    match state.auth.refresh(&token).await {
        Ok((_user, tokens)) => {
            crate::metrics::refresh_rotations_total(true);
            let jar = set_session_cookies(&state, jar, tokens);
            Ok((jar, Json(OkResponse { ok: true })))
        }
        Err(err) => {
            crate::metrics::refresh_rotations_total(false);
            Err(err.into())
        }
    }
}

/// End the session.
///
/// Revokes the stored refresh fingerprint when the cookie is present and
/// valid, and clears both cookies either way. Logout never fails: a missing
/// or garbage token still produces `200 OK` with cleared cookies.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<OkResponse>) {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string());
    state.auth.logout(token.as_deref()).await;

    let jar = clear_session_cookies(&state, jar);
    (jar, Json(OkResponse { ok: true }))
}

/// Build one session cookie. Both cookies are httpOnly and SameSite=Lax;
/// `Secure` is added in production.
fn session_cookie(
    name: &'static str,
    value: String,
    path: &'static str,
    max_age_secs: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(path)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

/// Attach a fresh token pair as cookies
fn set_session_cookies(state: &AppState, jar: CookieJar, tokens: SessionTokens) -> CookieJar {
    let secure = state.config.env.is_production();
    let codec = state.auth.codec();

    jar.add(session_cookie(
        ACCESS_COOKIE,
        tokens.access_token,
        "/",
        codec.access_ttl_secs(),
        secure,
    ))
    .add(session_cookie(
        REFRESH_COOKIE,
        tokens.refresh_token,
        REFRESH_COOKIE_PATH,
        codec.refresh_ttl_secs(),
        secure,
    ))
}

/// Expire both session cookies. Paths must match the set cookies or the
/// browser keeps the originals.
fn clear_session_cookies(state: &AppState, jar: CookieJar) -> CookieJar {
    let secure = state.config.env.is_production();

    jar.add(session_cookie(ACCESS_COOKIE, String::new(), "/", 0, secure))
        .add(session_cookie(
            REFRESH_COOKIE,
            String::new(),
            REFRESH_COOKIE_PATH,
            0,
            secure,
        ))
}
