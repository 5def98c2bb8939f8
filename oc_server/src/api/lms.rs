//! Learning content endpoints.
//!
//! Every route here requires a session. Reads (tracks, profiles, videos,
//! tests, guides) are open to any signed-in user, the `/api/teacher/...`
//! creation routes sit behind the teacher role guard, and per-profile
//! ownership checks live in [`open_class::lms::LmsManager`].
//!
//! # Examples
//!
//! Browse a track:
//! ```bash
//! curl -b cookies.txt http://localhost:8080/api/tracks/1/teachers
//! ```
//!
//! Publish a video (teacher session required):
//! ```bash
//! curl -X POST http://localhost:8080/api/teacher/profiles/1/videos \
//!   -H "Content-Type: application/json" \
//!   -b cookies.txt \
//!   -d '{"title": "Ownership", "url": "https://youtu.be/abc", "duration": "12:30"}'
//! ```

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

use open_class::lms::{
    AttemptOutcome, CommentView, CreateCommentInput, CreateGuideInput, CreateProfileInput,
    CreateTestInput, CreateVideoInput, Guide, ProfileId, ProfileView, SubmitAttemptInput, TestId,
    TestSummary, TestView, TrackId, TrackSummary, TrackTeachers, Video, VideoDetail, VideoId,
};

use super::AppState;
use super::error::ApiError;
use super::middleware::CurrentUser;

// ==== Response wrappers ====

#[derive(Debug, Serialize)]
pub struct TracksResponse {
    pub tracks: Vec<TrackSummary>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: ProfileView,
}

#[derive(Debug, Serialize)]
pub struct VideosResponse {
    pub videos: Vec<Video>,
}

#[derive(Debug, Serialize)]
pub struct VideoResponse {
    pub video: Video,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub comment: CommentView,
}

#[derive(Debug, Serialize)]
pub struct TestsResponse {
    pub tests: Vec<TestSummary>,
}

#[derive(Debug, Serialize)]
pub struct TestResponse {
    pub test: TestView,
}

#[derive(Debug, Serialize)]
pub struct GuidesResponse {
    pub guides: Vec<Guide>,
}

#[derive(Debug, Serialize)]
pub struct GuideResponse {
    pub guide: Guide,
}

// ==== Tracks ====

/// All tracks with their teacher tallies
pub async fn list_tracks(State(state): State<AppState>) -> Result<Json<TracksResponse>, ApiError> {
    let tracks = state.lms.list_tracks().await?;
    Ok(Json(TracksResponse { tracks }))
}

/// One track with its teacher profiles
pub async fn track_teachers(
    State(state): State<AppState>,
    Path(track_id): Path<TrackId>,
) -> Result<Json<TrackTeachers>, ApiError> {
    Ok(Json(state.lms.track_teachers(track_id).await?))
}

// ==== Teacher profiles ====

/// Create the caller's profile on a track.
///
/// # Errors
///
/// - `400 Bad Request`: Missing headline or about text
/// - `404 Not Found`: No such track
/// - `409 Conflict`: Caller already has a profile on this track
pub async fn create_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(track_id): Path<TrackId>,
    Json(payload): Json<CreateProfileInput>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state.lms.create_profile(&user, track_id, payload).await?;
    Ok(Json(ProfileResponse { profile }))
}

/// One profile with its content tallies
pub async fn profile_detail(
    State(state): State<AppState>,
    Path(profile_id): Path<ProfileId>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state.lms.profile_detail(profile_id).await?;
    Ok(Json(ProfileResponse { profile }))
}

// ==== Videos ====

/// Videos under a profile
pub async fn profile_videos(
    State(state): State<AppState>,
    Path(profile_id): Path<ProfileId>,
) -> Result<Json<VideosResponse>, ApiError> {
    let videos = state.lms.list_videos(profile_id).await?;
    Ok(Json(VideosResponse { videos }))
}

/// Publish a video under a profile.
///
/// # Errors
///
/// - `400 Bad Request`: Bad title, URL, or a linked test/guide from another
///   profile
/// - `403 Forbidden`: Caller is neither the profile owner nor an admin
/// - `404 Not Found`: No such profile
pub async fn create_video(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(profile_id): Path<ProfileId>,
    Json(payload): Json<CreateVideoInput>,
) -> Result<Json<VideoResponse>, ApiError> {
    let video = state.lms.create_video(&user, profile_id, payload).await?;
    Ok(Json(VideoResponse { video }))
}

/// One video with its comments
pub async fn video_detail(
    State(state): State<AppState>,
    Path(video_id): Path<VideoId>,
) -> Result<Json<VideoDetail>, ApiError> {
    Ok(Json(state.lms.video_detail(video_id).await?))
}

/// Comment on a video. Students and admins only; teachers cannot comment.
///
/// # Errors
///
/// - `400 Bad Request`: Empty comment text
/// - `403 Forbidden`: Caller is a teacher
/// - `404 Not Found`: No such video
pub async fn add_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<VideoId>,
    Json(payload): Json<CreateCommentInput>,
) -> Result<Json<CommentResponse>, ApiError> {
    let comment = state.lms.add_comment(&user, video_id, payload).await?;
    Ok(Json(CommentResponse { comment }))
}

// ==== Tests ====

/// Test listing for a profile, without question bodies
pub async fn profile_tests(
    State(state): State<AppState>,
    Path(profile_id): Path<ProfileId>,
) -> Result<Json<TestsResponse>, ApiError> {
    let tests = state.lms.list_tests(profile_id).await?;
    Ok(Json(TestsResponse { tests }))
}

/// Create a timed test under a profile.
///
/// # Errors
///
/// - `400 Bad Request`: Bad title, unknown level, or malformed questions
/// - `403 Forbidden`: Caller is neither the profile owner nor an admin
/// - `404 Not Found`: No such profile
pub async fn create_test(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(profile_id): Path<ProfileId>,
    Json(payload): Json<CreateTestInput>,
) -> Result<Json<TestResponse>, ApiError> {
    let test = state.lms.create_test(&user, profile_id, payload).await?;
    Ok(Json(TestResponse { test }))
}

/// One test. Students receive the questions without `correct_index`.
pub async fn test_detail(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(test_id): Path<TestId>,
) -> Result<Json<TestResponse>, ApiError> {
    let test = state.lms.test_detail(&user, test_id).await?;
    Ok(Json(TestResponse { test }))
}

/// Submit a student's answers for scoring.
///
/// Only the first attempt per test and student is saved; later submissions
/// still report their score with `saved: false`.
///
/// # Errors
///
/// - `400 Bad Request`: Answer count does not match the question count
/// - `403 Forbidden`: Caller is not a student
/// - `404 Not Found`: No such test
pub async fn submit_attempt(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(test_id): Path<TestId>,
    Json(payload): Json<SubmitAttemptInput>,
) -> Result<Json<AttemptOutcome>, ApiError> {
    let outcome = state
        .lms
        .submit_attempt(&user, test_id, payload.answers)
        .await?;
    Ok(Json(outcome))
}

// ==== Guides ====

/// Guides under a profile
pub async fn profile_guides(
    State(state): State<AppState>,
    Path(profile_id): Path<ProfileId>,
) -> Result<Json<GuidesResponse>, ApiError> {
    let guides = state.lms.list_guides(profile_id).await?;
    Ok(Json(GuidesResponse { guides }))
}

/// Publish a PDF guide under a profile.
///
/// # Errors
///
/// - `400 Bad Request`: Bad title or URL
/// - `403 Forbidden`: Caller is neither the profile owner nor an admin
/// - `404 Not Found`: No such profile
pub async fn create_guide(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(profile_id): Path<ProfileId>,
    Json(payload): Json<CreateGuideInput>,
) -> Result<Json<GuideResponse>, ApiError> {
    let guide = state.lms.create_guide(&user, profile_id, payload).await?;
    Ok(Json(GuideResponse { guide }))
}
