//! Learning content: tracks, teacher profiles, videos, tests, guides,
//! comments and scored attempts.
//!
//! A track groups teacher profiles; each profile owns its videos, tests
//! and guides. Students comment on videos and take tests, with only the
//! first attempt per test saved. All rules live in [`LmsManager`].

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{LmsError, LmsResult};
pub use manager::LmsManager;
pub use models::{
    AttemptOutcome, AttemptScore, CommentView, CreateCommentInput, CreateGuideInput,
    CreateProfileInput, CreateTestInput, CreateVideoInput, Guide, Level, NewTrack, ProfileId,
    ProfileView, Question, QuestionInput, SubmitAttemptInput, TeacherProfile, TestId, TestSummary,
    TestView, Track, TrackId, TrackSummary, TrackTeachers, Video, VideoDetail, VideoId,
};
