//! Repository trait definitions for testability and dependency injection.
//!
//! This module provides trait-based abstractions over storage operations.
//! Two implementations exist: [`crate::db::postgres`] for production and
//! [`crate::db::memory`] for development and tests. Handlers and managers
//! only ever see these traits.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::models::{NewUser, ProfileChanges, Role, User, UserId};
use crate::lms::models::{
    Attempt, Comment, Guide, GuideId, NewAttempt, NewComment, NewGuide, NewProfile, NewTest,
    NewTrack, NewVideo, ProfileId, TeacherProfile, Test, TestId, Track, TrackId, Video, VideoId,
};

/// Storage errors shared by all backends
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A unique constraint rejected the write. Carries the constraint name
    /// so callers can translate races into the right conflict error.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(&'static str),

    /// A stored value failed to decode
    #[error("Corrupt row in {0}")]
    Corrupt(&'static str),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Per-profile content tallies for listings
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentCounts {
    pub videos: i64,
    pub tests: i64,
    pub guides: i64,
}

/// Trait for user and session-state storage
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Liveness probe for the health endpoint
    async fn ping(&self) -> StoreResult<()>;

    /// Create a new user
    async fn create_user(&self, new: NewUser) -> StoreResult<User>;

    /// Find user by normalized email
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Find user by ID
    async fn find_by_id(&self, user_id: UserId) -> StoreResult<Option<User>>;

    /// Find several users by ID, for joining names onto content
    async fn find_by_ids(&self, user_ids: &[UserId]) -> StoreResult<Vec<User>>;

    /// All users, oldest first
    async fn list_users(&self) -> StoreResult<Vec<User>>;

    /// Overwrite the stored refresh token hash (login, register)
    async fn store_refresh_hash(&self, user_id: UserId, hash: &str) -> StoreResult<()>;

    /// Compare-and-swap rotation of the refresh token hash. Returns false
    /// when the stored hash no longer equals `expected`, which is how a
    /// losing concurrent refresh observes the race.
    async fn rotate_refresh_hash(
        &self,
        user_id: UserId,
        expected: &str,
        new_hash: &str,
    ) -> StoreResult<bool>;

    /// Clear the refresh hash and bump the token version, invalidating
    /// every outstanding token for the user
    async fn revoke_sessions(&self, user_id: UserId) -> StoreResult<()>;

    /// Set the user's role, returning the updated row
    async fn set_role(&self, user_id: UserId, role: Role) -> StoreResult<Option<User>>;

    /// Set the blocked flag, returning the updated row
    async fn set_blocked(&self, user_id: UserId, blocked: bool) -> StoreResult<Option<User>>;

    /// Apply profile changes, returning the updated row
    async fn update_profile(
        &self,
        user_id: UserId,
        changes: ProfileChanges,
    ) -> StoreResult<Option<User>>;
}

/// Trait for course content storage
#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn insert_track(&self, new: NewTrack) -> StoreResult<Track>;
    async fn list_tracks(&self) -> StoreResult<Vec<Track>>;
    async fn find_track(&self, track_id: TrackId) -> StoreResult<Option<Track>>;

    /// Teacher-profile counts keyed by track, for the track listing
    async fn profile_counts_by_track(&self) -> StoreResult<HashMap<TrackId, i64>>;

    async fn insert_profile(&self, new: NewProfile) -> StoreResult<TeacherProfile>;
    async fn find_profile(&self, profile_id: ProfileId) -> StoreResult<Option<TeacherProfile>>;
    async fn list_profiles_for_track(&self, track_id: TrackId)
    -> StoreResult<Vec<TeacherProfile>>;

    /// Video/test/guide tallies for a set of profiles
    async fn content_counts(
        &self,
        profile_ids: &[ProfileId],
    ) -> StoreResult<HashMap<ProfileId, ContentCounts>>;

    async fn insert_video(&self, new: NewVideo) -> StoreResult<Video>;
    async fn find_video(&self, video_id: VideoId) -> StoreResult<Option<Video>>;
    async fn list_videos_for_profile(&self, profile_id: ProfileId) -> StoreResult<Vec<Video>>;

    async fn insert_test(&self, new: NewTest) -> StoreResult<Test>;
    async fn find_test(&self, test_id: TestId) -> StoreResult<Option<Test>>;
    async fn list_tests_for_profile(&self, profile_id: ProfileId) -> StoreResult<Vec<Test>>;

    async fn insert_guide(&self, new: NewGuide) -> StoreResult<Guide>;
    async fn find_guide(&self, guide_id: GuideId) -> StoreResult<Option<Guide>>;
    async fn list_guides_for_profile(&self, profile_id: ProfileId) -> StoreResult<Vec<Guide>>;

    async fn insert_comment(&self, new: NewComment) -> StoreResult<Comment>;
    async fn list_comments_for_video(&self, video_id: VideoId) -> StoreResult<Vec<Comment>>;

    async fn insert_attempt(&self, new: NewAttempt) -> StoreResult<Attempt>;

    /// Whether the user already has a saved attempt for the test
    async fn has_saved_attempt(&self, test_id: TestId, user_id: UserId) -> StoreResult<bool>;
}
