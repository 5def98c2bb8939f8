//! Integration tests for the HTTP surface beyond the session lifecycle:
//! health, routing, role guards, admin operations, learning content and
//! rate limiting.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt; // For `oneshot` method

use oc_server::api::{AppState, StorageKind, create_router};
use oc_server::config::{AdminConfig, AppEnv, SecurityConfig, ServerConfig, TokenConfig};
use open_class::auth::{AuthManager, Role, TokenCodec};
use open_class::db::{MemoryContentRepository, MemoryUserRepository, UserRepository};
use open_class::lms::{LmsManager, NewTrack, Track};
use open_class::seed;

const ADMIN_EMAIL: &str = "admin@openclass.local";
const ADMIN_PASSWORD: &str = "admin123";

fn test_config() -> ServerConfig {
    ServerConfig {
        bind: "127.0.0.1:0".parse().unwrap(),
        env: AppEnv::Development,
        database: None,
        security: SecurityConfig {
            access_token_secret: "test-access-secret-0123456789abcdef".to_string(),
            refresh_token_secret: "test-refresh-secret-0123456789abcdef".to_string(),
            password_pepper: "test-pepper-0123456789".to_string(),
        },
        tokens: TokenConfig {
            access_ttl_secs: 900,
            refresh_ttl_secs: 2_592_000,
        },
        admin: AdminConfig {
            email: ADMIN_EMAIL.to_string(),
            password: ADMIN_PASSWORD.to_string(),
        },
        seed_demo: false,
        allowed_origin: None,
        metrics_bind: None,
    }
}

/// Helper to create a test server over the in-memory store
fn create_test_server() -> (Router, AppState) {
    let config = test_config();

    let users: Arc<dyn UserRepository> = Arc::new(MemoryUserRepository::new());
    let content = Arc::new(MemoryContentRepository::new());
    let codec = TokenCodec::new(
        config.security.access_token_secret.clone(),
        config.security.refresh_token_secret.clone(),
        config.tokens.access_ttl_secs,
        config.tokens.refresh_ttl_secs,
    );
    let auth = Arc::new(AuthManager::new(
        users.clone(),
        codec,
        config.security.password_pepper.clone(),
    ));
    let lms = Arc::new(LmsManager::new(content, users.clone()));

    let state = AppState {
        auth,
        lms,
        users,
        config: Arc::new(config),
        storage: StorageKind::Memory,
    };

    (create_router(state.clone()), state)
}

fn unique_email(prefix: &str) -> String {
    let rand_id: u32 = rand::random();
    format!("{}_{}@test.com", prefix, rand_id % 100_000)
}

fn set_cookies(response: &axum::response::Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// `Cookie` request header carrying the given set cookies
fn cookie_header(cookies: &[String]) -> String {
    cookies
        .iter()
        .filter_map(|c| c.split(';').next())
        .collect::<Vec<_>>()
        .join("; ")
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// JSON request with a session attached
fn authed_json_request(
    method: &str,
    uri: &str,
    cookies: &[String],
    body: serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header(header::COOKIE, cookie_header(cookies))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed_get(uri: &str, cookies: &[String]) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie_header(cookies))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}

/// Login and return the session cookies
async fn login_cookies(app: &Router, email: &str, password: &str) -> Vec<String> {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({ "email": email, "password": password }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK, "login should succeed");
    set_cookies(&response)
}

/// Register a fresh student and return the response body and cookies
async fn register_student(app: &Router, email: &str) -> (serde_json::Value, Vec<String>) {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            serde_json::json!({
                "full_name": "Test Student",
                "email": email,
                "password": "secret1"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK, "register should succeed");
    let cookies = set_cookies(&response);
    (body_json(response).await, cookies)
}

/// Seed the admin account and return its session cookies
async fn admin_session(app: &Router, state: &AppState) -> Vec<String> {
    seed::ensure_admin(&state.auth, ADMIN_EMAIL, ADMIN_PASSWORD)
        .await
        .unwrap();
    login_cookies(app, ADMIN_EMAIL, ADMIN_PASSWORD).await
}

/// Create a teacher account directly in the store and log it in
async fn teacher_session(app: &Router, state: &AppState) -> Vec<String> {
    let email = unique_email("teacher");
    state
        .auth
        .ensure_user("Terry Teacher", &email, "secret1", Role::Teacher)
        .await
        .unwrap();
    login_cookies(app, &email, "secret1").await
}

/// Seed a track directly in the store
async fn seed_track(state: &AppState) -> Track {
    state
        .lms
        .create_track(NewTrack {
            title: "Rust".to_string(),
            description: "Systems programming".to_string(),
        })
        .await
        .unwrap()
}

/// Create a profile over HTTP and return its id
async fn create_profile(app: &Router, cookies: &[String], track_id: i64) -> i64 {
    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/teacher/tracks/{track_id}/profile"),
            cookies,
            serde_json::json!({ "headline": "Rust from zero", "about": "Practical Rust" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK, "profile should be created");
    body_json(response).await["profile"]["id"].as_i64().unwrap()
}

// ============================================================================
// Health and Routing Tests
// ============================================================================

#[tokio::test]
async fn test_health_check_reports_memory_store() {
    let (app, _) = create_test_server();

    let response = app
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["env"], "development");
    assert_eq!(body["storage"]["kind"], "memory");
    assert_eq!(body["storage"]["ok"], true);
}

#[tokio::test]
async fn test_unknown_path_returns_json_not_found() {
    let (app, _) = create_test_server();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Not found");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (app, _) = create_test_server();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .header("x-request-id", "trace-me-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "trace-me-123"
    );

    let response = app
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let generated = response.headers().get("x-request-id").unwrap();
    assert!(!generated.to_str().unwrap().is_empty());
}

// ============================================================================
// Role Guard Tests
// ============================================================================

#[tokio::test]
async fn test_content_requires_a_session() {
    let (app, _) = create_test_server();

    let response = app
        .oneshot(Request::builder().uri("/api/tracks").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_student_cannot_reach_admin_routes() {
    let (app, _) = create_test_server();
    let (_, cookies) = register_student(&app, &unique_email("s_admin")).await;

    let response = app
        .clone()
        .oneshot(authed_get("/api/admin/users", &cookies))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/tracks",
            &cookies,
            serde_json::json!({ "title": "Rust", "description": "Systems programming" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "Forbidden");
}

#[tokio::test]
async fn test_student_cannot_reach_teacher_routes() {
    let (app, _) = create_test_server();
    let (_, cookies) = register_student(&app, &unique_email("s_teach")).await;

    // The role guard rejects before any track lookup happens.
    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/api/teacher/tracks/1/profile",
            &cookies,
            serde_json::json!({ "headline": "Hi", "about": "Hi" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_teacher_cannot_reach_admin_routes() {
    let (app, state) = create_test_server();
    let cookies = teacher_session(&app, &state).await;

    let response = app
        .oneshot(authed_get("/api/admin/users", &cookies))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ============================================================================
// Admin Operation Tests
// ============================================================================

#[tokio::test]
async fn test_admin_lists_users_and_creates_tracks() {
    let (app, state) = create_test_server();
    let cookies = admin_session(&app, &state).await;
    register_student(&app, &unique_email("listed")).await;

    let response = app
        .clone()
        .oneshot(authed_get("/api/admin/users", &cookies))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("password_hash").is_none()));

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/tracks",
            &cookies,
            serde_json::json!({ "title": "Rust", "description": "Systems programming" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["track"]["title"], "Rust");

    // The new track shows up in the authenticated listing.
    let response = app.oneshot(authed_get("/api/tracks", &cookies)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["tracks"].as_array().unwrap().len(), 1);
    assert_eq!(body["tracks"][0]["teachers_count"], 0);
}

#[tokio::test]
async fn test_admin_role_assignment_rules() {
    let (app, state) = create_test_server();
    let cookies = admin_session(&app, &state).await;
    let (body, _) = register_student(&app, &unique_email("promote")).await;
    let user_id = body["user"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/admin/users/{user_id}/role"),
            &cookies,
            serde_json::json!({ "role": "teacher" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user"]["role"], "teacher");

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/admin/users/{user_id}/role"),
            &cookies,
            serde_json::json!({ "role": "admin" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "Admin role cannot be assigned"
    );

    let response = app
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/admin/users/{user_id}/role"),
            &cookies,
            serde_json::json!({ "role": "wizard" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid role");
}

#[tokio::test]
async fn test_admin_blocks_and_unblocks_users() {
    let (app, state) = create_test_server();
    let cookies = admin_session(&app, &state).await;
    let email = unique_email("banned");
    let (body, _) = register_student(&app, &email).await;
    let user_id = body["user"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/admin/users/{user_id}/block"),
            &cookies,
            serde_json::json!({ "block": true }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user"]["blocked"], true);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({ "email": email, "password": "secret1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "User is blocked");

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/admin/users/{user_id}/block"),
            &cookies,
            serde_json::json!({ "block": false }),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["user"]["blocked"], false);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({ "email": email, "password": "secret1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_cannot_block_another_admin() {
    let (app, state) = create_test_server();
    let cookies = admin_session(&app, &state).await;
    let admin = state
        .users
        .find_by_email(ADMIN_EMAIL)
        .await
        .unwrap()
        .unwrap();

    let response = app
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/admin/users/{}/block", admin.id),
            &cookies,
            serde_json::json!({ "block": true }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Cannot block admin user");
}

// ============================================================================
// Learning Content Tests
// ============================================================================

#[tokio::test]
async fn test_profile_creation_and_duplicate_conflict() {
    let (app, state) = create_test_server();
    let track = seed_track(&state).await;
    let cookies = teacher_session(&app, &state).await;

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/teacher/tracks/{}/profile", track.id),
            &cookies,
            serde_json::json!({ "headline": "Rust from zero", "about": "Practical Rust" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["profile"]["teacher_name"], "Terry Teacher");
    assert_eq!(body["profile"]["videos_count"], 0);

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/teacher/tracks/{}/profile", track.id),
            &cookies,
            serde_json::json!({ "headline": "Again", "about": "Again" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // The track listing now tallies the teacher.
    let response = app
        .oneshot(authed_get(&format!("/api/tracks/{}/teachers", track.id), &cookies))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["profiles"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_video_validation_and_detail() {
    let (app, state) = create_test_server();
    let track = seed_track(&state).await;
    let cookies = teacher_session(&app, &state).await;
    let profile_id = create_profile(&app, &cookies, track.id).await;

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/teacher/profiles/{profile_id}/videos"),
            &cookies,
            serde_json::json!({ "title": "Intro", "url": "", "duration": "12:30" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/teacher/profiles/{profile_id}/videos"),
            &cookies,
            serde_json::json!({
                "title": "Intro",
                "url": "https://example.com/v1",
                "duration": "12:30"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let video_id = body_json(response).await["video"]["id"].as_i64().unwrap();

    let response = app
        .oneshot(authed_get(&format!("/api/videos/{video_id}"), &cookies))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["video"]["title"], "Intro");
    assert_eq!(body["comments"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_correct_answers_hidden_from_students() {
    let (app, state) = create_test_server();
    let track = seed_track(&state).await;
    let teacher = teacher_session(&app, &state).await;
    let profile_id = create_profile(&app, &teacher, track.id).await;

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/teacher/profiles/{profile_id}/tests"),
            &teacher,
            serde_json::json!({
                "title": "Quiz",
                "level": "easy",
                "questions": [
                    { "text": "2 + 2?", "options": ["3", "4"], "correct_index": 1, "timeout_seconds": 10 },
                    { "text": "1 + 1?", "options": ["2", "11"], "correct_index": 0, "timeout_seconds": 5 }
                ]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let test_id = body["test"]["id"].as_i64().unwrap();
    // The creating teacher sees the answer key.
    assert_eq!(body["test"]["questions"][0]["correct_index"], 1);

    let (_, student) = register_student(&app, &unique_email("quiz")).await;
    let response = app
        .clone()
        .oneshot(authed_get(&format!("/api/tests/{test_id}"), &student))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    for question in body["test"]["questions"].as_array().unwrap() {
        assert!(
            question.get("correct_index").is_none(),
            "Students must not receive answers"
        );
    }

    let response = app
        .oneshot(authed_get(&format!("/api/tests/{test_id}"), &teacher))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["test"]["questions"][1]["correct_index"], 0);
}

#[tokio::test]
async fn test_attempt_scoring_and_first_save() {
    let (app, state) = create_test_server();
    let track = seed_track(&state).await;
    let teacher = teacher_session(&app, &state).await;
    let profile_id = create_profile(&app, &teacher, track.id).await;

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/teacher/profiles/{profile_id}/tests"),
            &teacher,
            serde_json::json!({
                "title": "Quiz",
                "level": "easy",
                "questions": [
                    { "text": "2 + 2?", "options": ["3", "4"], "correct_index": 1, "timeout_seconds": 10 },
                    { "text": "1 + 1?", "options": ["2", "11"], "correct_index": 0, "timeout_seconds": 5 }
                ]
            }),
        ))
        .await
        .unwrap();
    let test_id = body_json(response).await["test"]["id"].as_i64().unwrap();

    let (_, student) = register_student(&app, &unique_email("attempt")).await;
    let attempts_uri = format!("/api/tests/{test_id}/attempts");

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &attempts_uri,
            &student,
            serde_json::json!({ "answers": [1] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &attempts_uri,
            &student,
            serde_json::json!({ "answers": [1, -1] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["saved"], true);
    assert_eq!(body["result"]["correct_count"], 1);
    assert_eq!(body["result"]["total_questions"], 2);
    assert_eq!(body["result"]["score_percent"], 50);

    // A retake is scored but never overwrites the saved attempt.
    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &attempts_uri,
            &student,
            serde_json::json!({ "answers": [1, 0] }),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["saved"], false);
    assert_eq!(body["result"]["score_percent"], 100);

    let response = app
        .oneshot(authed_json_request(
            "POST",
            &attempts_uri,
            &teacher,
            serde_json::json!({ "answers": [1, 0] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_comments_are_for_students_not_teachers() {
    let (app, state) = create_test_server();
    let track = seed_track(&state).await;
    let teacher = teacher_session(&app, &state).await;
    let profile_id = create_profile(&app, &teacher, track.id).await;

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/teacher/profiles/{profile_id}/videos"),
            &teacher,
            serde_json::json!({
                "title": "Intro",
                "url": "https://example.com/v1",
                "duration": "12:30"
            }),
        ))
        .await
        .unwrap();
    let video_id = body_json(response).await["video"]["id"].as_i64().unwrap();
    let comments_uri = format!("/api/videos/{video_id}/comments");

    let (_, student) = register_student(&app, &unique_email("commenter")).await;
    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &comments_uri,
            &student,
            serde_json::json!({ "text": "Great lesson" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["comment"]["text"], "Great lesson");
    assert_eq!(body["comment"]["author_name"], "Test Student");

    let response = app
        .oneshot(authed_json_request(
            "POST",
            &comments_uri,
            &teacher,
            serde_json::json!({ "text": "Thanks" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_guides_must_point_at_pdfs() {
    let (app, state) = create_test_server();
    let track = seed_track(&state).await;
    let cookies = teacher_session(&app, &state).await;
    let profile_id = create_profile(&app, &cookies, track.id).await;
    let guides_uri = format!("/api/teacher/profiles/{profile_id}/guides");

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &guides_uri,
            &cookies,
            serde_json::json!({ "title": "Notes", "url": "https://example.com/notes.docx" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &guides_uri,
            &cookies,
            serde_json::json!({ "title": "Notes", "url": "https://example.com/notes.pdf" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["guide"]["url"],
        "https://example.com/notes.pdf"
    );

    let response = app
        .oneshot(authed_get(&format!("/api/profiles/{profile_id}/guides"), &cookies))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["guides"].as_array().unwrap().len(), 1);
}

// ============================================================================
// Rate Limiting Tests
// ============================================================================

#[tokio::test]
async fn test_auth_endpoints_throttle_after_ten_requests() {
    let (app, _) = create_test_server();

    // Without a socket address every oneshot request shares one bucket.
    for i in 0..10 {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/register",
                serde_json::json!({
                    "full_name": "Test Student",
                    "email": format!("burst_{i}@test.com"),
                    "password": "secret1"
                }),
            ))
            .await
            .unwrap();
        assert_ne!(
            response.status(),
            StatusCode::TOO_MANY_REQUESTS,
            "request {} should pass",
            i + 1
        );
    }

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({ "email": "burst_0@test.com", "password": "secret1" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    let body = body_json(response).await;
    assert!(
        body["error"].as_str().unwrap().contains("Too many"),
        "throttle responses carry an error body"
    );

    // Session endpoints stay outside the limiter.
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
