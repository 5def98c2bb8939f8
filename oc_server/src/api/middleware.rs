//! Authentication and role middleware for protected endpoints.
//!
//! The access token is read from the `oc_at` session cookie first and from
//! the `Authorization: Bearer <token>` header as a fallback, so browser
//! sessions and API clients go through the same gate. A token that decodes
//! cleanly still has to match the user's current token version, and blocked
//! accounts are rejected even while their tokens are otherwise valid.
//!
//! # Usage
//!
//! Apply to protected routes in the router:
//!
//! ```rust,no_run
//! use axum::{Router, routing::get, middleware};
//! # use oc_server::api::middleware::{auth_middleware, require_role, ADMIN_ONLY};
//! # use oc_server::api::AppState;
//! # async fn list_users() {}
//! # let state: AppState = unimplemented!();
//!
//! let admin_routes: Router<AppState> = Router::new()
//!     .route("/api/admin/users", get(list_users))
//!     .route_layer(middleware::from_fn(|request, next| {
//!         require_role(ADMIN_ONLY, request, next)
//!     }))
//!     .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
//! # let _ = admin_routes;
//! ```
//!
//! # Extracting the user
//!
//! Handlers behind the middleware take [`CurrentUser`] as an extractor:
//!
//! ```rust,no_run
//! use oc_server::api::middleware::CurrentUser;
//!
//! async fn whoami(CurrentUser(user): CurrentUser) -> String {
//!     format!("Authenticated as {}", user.email)
//! }
//! # let _ = whoami;
//! ```

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use open_class::auth::{Role, User};

use super::AppState;
use super::auth::ACCESS_COOKIE;
use super::error::ApiError;

/// Allow list for the admin surface
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Allow list for the teacher content surface
pub const TEACHER_OR_ADMIN: &[Role] = &[Role::Teacher, Role::Admin];

/// Authenticated user for the current request, inserted by [`auth_middleware`]
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(ApiError::unauthorized)
    }
}

/// Authentication middleware that resolves the access token to a live user.
///
/// # Behavior
///
/// - **Success**: Token valid, version current, account active → inserts
///   [`CurrentUser`] into request extensions → calls next handler
/// - **Missing/invalid/expired/stale token**: Returns `401 Unauthorized`
/// - **Blocked account**: Returns `403 Forbidden`
pub async fn auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = access_token(&jar, &request).ok_or_else(ApiError::unauthorized)?;
    let user = state.auth.authenticate(&token).await?;

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Role guard for routes already behind [`auth_middleware`].
///
/// Returns `403 Forbidden` when the authenticated user's role is not in
/// `allowed`, and `401 Unauthorized` when no user was injected at all.
pub async fn require_role(
    allowed: &'static [Role],
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(CurrentUser(user)) = request.extensions().get::<CurrentUser>() else {
        return Err(ApiError::unauthorized());
    };

    if !allowed.contains(&user.role) {
        return Err(ApiError::forbidden());
    }

    Ok(next.run(request).await)
}

/// Token from the session cookie, falling back to a bearer header
fn access_token(jar: &CookieJar, request: &Request) -> Option<String> {
    if let Some(cookie) = jar.get(ACCESS_COOKIE) {
        return Some(cookie.value().to_string());
    }

    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum_extra::extract::cookie::Cookie;
    use chrono::Utc;

    fn request_with_header(value: Option<&str>) -> Request {
        let mut builder = Request::builder().uri("/api/me");
        if let Some(value) = value {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_cookie_takes_priority_over_header() {
        let jar = CookieJar::new().add(Cookie::new(ACCESS_COOKIE, "cookie-token"));
        let request = request_with_header(Some("Bearer header-token"));

        assert_eq!(
            access_token(&jar, &request).as_deref(),
            Some("cookie-token")
        );
    }

    #[test]
    fn test_bearer_header_fallback() {
        let jar = CookieJar::new();
        let request = request_with_header(Some("Bearer header-token"));

        assert_eq!(
            access_token(&jar, &request).as_deref(),
            Some("header-token")
        );
    }

    #[test]
    fn test_missing_credentials() {
        let jar = CookieJar::new();
        let request = request_with_header(None);

        assert!(access_token(&jar, &request).is_none());
    }

    #[test]
    fn test_malformed_authorization_header() {
        let jar = CookieJar::new();
        let request = request_with_header(Some("Basic dXNlcjpwYXNz"));

        assert!(
            access_token(&jar, &request).is_none(),
            "Only bearer tokens should be accepted"
        );
    }

    #[tokio::test]
    async fn test_extractor_rejects_without_auth_layer() {
        let (mut parts, _) = request_with_header(None).into_parts();
        let result = CurrentUser::from_request_parts(&mut parts, &()).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_extractor_returns_injected_user() {
        let user = User {
            id: 9,
            full_name: "Test Teacher".to_string(),
            age: None,
            email: "teacher@example.com".to_string(),
            phone: None,
            password_hash: "$argon2id$fake".to_string(),
            role: Role::Teacher,
            blocked: false,
            refresh_token_hash: None,
            token_version: 0,
            created_at: Utc::now(),
        };

        let (mut parts, _) = request_with_header(None).into_parts();
        parts.extensions.insert(CurrentUser(user));

        let CurrentUser(got) = CurrentUser::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(got.id, 9);
        assert_eq!(got.role, Role::Teacher);
    }

    #[test]
    fn test_role_allow_lists() {
        assert!(ADMIN_ONLY.contains(&Role::Admin));
        assert!(!ADMIN_ONLY.contains(&Role::Teacher));
        assert!(TEACHER_OR_ADMIN.contains(&Role::Teacher));
        assert!(TEACHER_OR_ADMIN.contains(&Role::Admin));
        assert!(!TEACHER_OR_ADMIN.contains(&Role::Student));
    }
}
