//! Course content data models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::models::UserId;

pub type TrackId = i64;
pub type ProfileId = i64;
pub type VideoId = i64;
pub type TestId = i64;
pub type GuideId = i64;
pub type CommentId = i64;
pub type AttemptId = i64;

/// A course track (subject area)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Column values for a new track
#[derive(Debug, Clone, Deserialize)]
pub struct NewTrack {
    pub title: String,
    pub description: String,
}

/// Track listing entry with teacher tally
#[derive(Debug, Clone, Serialize)]
pub struct TrackSummary {
    pub id: TrackId,
    pub title: String,
    pub description: String,
    pub teachers_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A teacher's presence on a track. One per teacher per track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherProfile {
    pub id: ProfileId,
    pub track_id: TrackId,
    pub teacher_id: UserId,
    pub headline: String,
    pub about: String,
    pub created_at: DateTime<Utc>,
}

/// Column values for a new teacher profile
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub track_id: TrackId,
    pub teacher_id: UserId,
    pub headline: String,
    pub about: String,
}

/// Profile creation request body
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProfileInput {
    pub headline: String,
    pub about: String,
}

/// Profile listing entry with display name and content tallies
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub id: ProfileId,
    pub track_id: TrackId,
    pub teacher_id: UserId,
    pub teacher_name: String,
    pub headline: String,
    pub about: String,
    pub videos_count: i64,
    pub tests_count: i64,
    pub guides_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A lesson video. May link a test and a guide from the same profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: VideoId,
    pub profile_id: ProfileId,
    pub title: String,
    pub url: String,
    pub duration: String,
    pub test_id: Option<TestId>,
    pub guide_id: Option<GuideId>,
    pub created_at: DateTime<Utc>,
}

/// Column values for a new video
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub profile_id: ProfileId,
    pub title: String,
    pub url: String,
    pub duration: String,
    pub test_id: Option<TestId>,
    pub guide_id: Option<GuideId>,
}

/// Video creation request body
#[derive(Debug, Clone, Deserialize)]
pub struct CreateVideoInput {
    pub title: String,
    pub url: String,
    pub duration: String,
    pub test_id: Option<TestId>,
    pub guide_id: Option<GuideId>,
}

/// Quiz difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Easy,
    Medium,
    Hard,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Easy => "easy",
            Level::Medium => "medium",
            Level::Hard => "hard",
        }
    }
}

impl FromStr for Level {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Level::Easy),
            "medium" => Ok(Level::Medium),
            "hard" => Ok(Level::Hard),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single timed quiz question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: i32,
    pub timeout_seconds: i32,
}

/// Question as serialized to clients. `correct_index` is omitted for
/// students so answers never reach the browser.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub text: String,
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_index: Option<i32>,
    pub timeout_seconds: i32,
}

/// A timed quiz attached to a teacher profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
    pub id: TestId,
    pub profile_id: ProfileId,
    pub title: String,
    pub level: Level,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
}

impl Test {
    /// Client view of the test. `include_answers` is true for the owning
    /// teacher and admins only.
    pub fn view(&self, include_answers: bool) -> TestView {
        TestView {
            id: self.id,
            profile_id: self.profile_id,
            title: self.title.clone(),
            level: self.level,
            questions: self
                .questions
                .iter()
                .map(|q| QuestionView {
                    text: q.text.clone(),
                    options: q.options.clone(),
                    correct_index: include_answers.then_some(q.correct_index),
                    timeout_seconds: q.timeout_seconds,
                })
                .collect(),
            created_at: self.created_at,
        }
    }

    pub fn summary(&self) -> TestSummary {
        TestSummary {
            id: self.id,
            profile_id: self.profile_id,
            title: self.title.clone(),
            level: self.level,
            questions_count: self.questions.len() as i64,
            created_at: self.created_at,
        }
    }
}

/// Column values for a new test
#[derive(Debug, Clone)]
pub struct NewTest {
    pub profile_id: ProfileId,
    pub title: String,
    pub level: Level,
    pub questions: Vec<Question>,
}

/// Test creation request body. The level arrives as a string so an unknown
/// value maps to a field validation error rather than a body rejection.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTestInput {
    pub title: String,
    pub level: String,
    pub questions: Vec<QuestionInput>,
}

/// Question as submitted by a teacher
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionInput {
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: i32,
    pub timeout_seconds: i32,
}

/// Full test detail for clients
#[derive(Debug, Clone, Serialize)]
pub struct TestView {
    pub id: TestId,
    pub profile_id: ProfileId,
    pub title: String,
    pub level: Level,
    pub questions: Vec<QuestionView>,
    pub created_at: DateTime<Utc>,
}

/// Test listing entry. Question bodies stay out of listings.
#[derive(Debug, Clone, Serialize)]
pub struct TestSummary {
    pub id: TestId,
    pub profile_id: ProfileId,
    pub title: String,
    pub level: Level,
    pub questions_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A downloadable PDF guide
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guide {
    pub id: GuideId,
    pub profile_id: ProfileId,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Column values for a new guide
#[derive(Debug, Clone)]
pub struct NewGuide {
    pub profile_id: ProfileId,
    pub title: String,
    pub url: String,
}

/// Guide creation request body
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGuideInput {
    pub title: String,
    pub url: String,
}

/// A comment under a video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub video_id: VideoId,
    pub user_id: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Column values for a new comment
#[derive(Debug, Clone)]
pub struct NewComment {
    pub video_id: VideoId,
    pub user_id: UserId,
    pub text: String,
}

/// Comment creation request body
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentInput {
    pub text: String,
}

/// Comment with its author's display name
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: CommentId,
    pub text: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

/// A student's scored quiz attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: AttemptId,
    pub test_id: TestId,
    pub user_id: UserId,
    pub answers: Vec<i32>,
    pub correct_count: i32,
    pub total_questions: i32,
    pub score_percent: i32,
    pub created_at: DateTime<Utc>,
}

/// Column values for a new attempt
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub test_id: TestId,
    pub user_id: UserId,
    pub answers: Vec<i32>,
    pub correct_count: i32,
    pub total_questions: i32,
    pub score_percent: i32,
}

/// Attempt submission body. Unanswered questions arrive as -1.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitAttemptInput {
    pub answers: Vec<i32>,
}

/// Score for one attempt
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AttemptScore {
    pub correct_count: i32,
    pub total_questions: i32,
    pub score_percent: i32,
}

/// Outcome of an attempt submission. Only the first attempt per test and
/// student is saved; later ones still report their score.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptOutcome {
    pub saved: bool,
    pub result: AttemptScore,
}

/// Track detail with its teacher profiles
#[derive(Debug, Clone, Serialize)]
pub struct TrackTeachers {
    pub track: Track,
    pub profiles: Vec<ProfileView>,
}

/// Video detail with comments
#[derive(Debug, Clone, Serialize)]
pub struct VideoDetail {
    pub video: Video,
    pub comments: Vec<CommentView>,
}
