//! In-memory implementations of the repository traits.
//!
//! The development server runs on this backend when no database is
//! configured, and the test suites use it to exercise the full stack
//! without PostgreSQL. Semantics mirror the PostgreSQL backend, including
//! id assignment, orderings and unique-constraint reporting.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use crate::auth::models::{NewUser, ProfileChanges, Role, User, UserId};
use crate::lms::models::{
    Attempt, AttemptId, Comment, CommentId, Guide, GuideId, NewAttempt, NewComment, NewGuide,
    NewProfile, NewTest, NewTrack, NewVideo, ProfileId, TeacherProfile, Test, TestId, Track,
    TrackId, Video, VideoId,
};

use super::repository::{
    ContentCounts, ContentRepository, StoreError, StoreResult, UserRepository,
};

#[derive(Default)]
struct UsersInner {
    users: HashMap<UserId, User>,
    next_id: UserId,
}

/// In-memory user repository
#[derive(Default)]
pub struct MemoryUserRepository {
    inner: Mutex<UsersInner>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, UsersInner> {
        // Every mutation is a single step, so state stays consistent even
        // if a holder panicked.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let mut inner = self.lock();
        if inner.users.values().any(|u| u.email == new.email) {
            return Err(StoreError::UniqueViolation("users.email"));
        }

        inner.next_id += 1;
        let user = User {
            id: inner.next_id,
            full_name: new.full_name,
            age: new.age,
            email: new.email,
            phone: new.phone,
            password_hash: new.password_hash,
            role: new.role,
            blocked: false,
            refresh_token_hash: None,
            token_version: 0,
            created_at: Utc::now(),
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.lock().users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, user_id: UserId) -> StoreResult<Option<User>> {
        Ok(self.lock().users.get(&user_id).cloned())
    }

    async fn find_by_ids(&self, user_ids: &[UserId]) -> StoreResult<Vec<User>> {
        let inner = self.lock();
        Ok(user_ids
            .iter()
            .filter_map(|id| inner.users.get(id).cloned())
            .collect())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.lock().users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn store_refresh_hash(&self, user_id: UserId, hash: &str) -> StoreResult<()> {
        if let Some(user) = self.lock().users.get_mut(&user_id) {
            user.refresh_token_hash = Some(hash.to_string());
        }
        Ok(())
    }

    async fn rotate_refresh_hash(
        &self,
        user_id: UserId,
        expected: &str,
        new_hash: &str,
    ) -> StoreResult<bool> {
        let mut inner = self.lock();
        match inner.users.get_mut(&user_id) {
            Some(user) if user.refresh_token_hash.as_deref() == Some(expected) => {
                user.refresh_token_hash = Some(new_hash.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_sessions(&self, user_id: UserId) -> StoreResult<()> {
        if let Some(user) = self.lock().users.get_mut(&user_id) {
            user.refresh_token_hash = None;
            user.token_version += 1;
        }
        Ok(())
    }

    async fn set_role(&self, user_id: UserId, role: Role) -> StoreResult<Option<User>> {
        let mut inner = self.lock();
        Ok(inner.users.get_mut(&user_id).map(|user| {
            user.role = role;
            user.clone()
        }))
    }

    async fn set_blocked(&self, user_id: UserId, blocked: bool) -> StoreResult<Option<User>> {
        let mut inner = self.lock();
        Ok(inner.users.get_mut(&user_id).map(|user| {
            user.blocked = blocked;
            user.clone()
        }))
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        changes: ProfileChanges,
    ) -> StoreResult<Option<User>> {
        let mut inner = self.lock();
        Ok(inner.users.get_mut(&user_id).map(|user| {
            if let Some(full_name) = changes.full_name {
                user.full_name = full_name;
            }
            if let Some(age) = changes.age {
                user.age = Some(age);
            }
            if let Some(phone) = changes.phone {
                user.phone = phone;
            }
            user.clone()
        }))
    }
}

#[derive(Default)]
struct ContentInner {
    tracks: HashMap<TrackId, Track>,
    profiles: HashMap<ProfileId, TeacherProfile>,
    videos: HashMap<VideoId, Video>,
    tests: HashMap<TestId, Test>,
    guides: HashMap<GuideId, Guide>,
    comments: HashMap<CommentId, Comment>,
    attempts: HashMap<AttemptId, Attempt>,
    next_id: i64,
}

impl ContentInner {
    fn next(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory content repository
#[derive(Default)]
pub struct MemoryContentRepository {
    inner: Mutex<ContentInner>,
}

impl MemoryContentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ContentInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ContentRepository for MemoryContentRepository {
    async fn insert_track(&self, new: NewTrack) -> StoreResult<Track> {
        let mut inner = self.lock();
        let track = Track {
            id: inner.next(),
            title: new.title,
            description: new.description,
            created_at: Utc::now(),
        };
        inner.tracks.insert(track.id, track.clone());
        Ok(track)
    }

    async fn list_tracks(&self) -> StoreResult<Vec<Track>> {
        let mut tracks: Vec<Track> = self.lock().tracks.values().cloned().collect();
        tracks.sort_by_key(|t| t.id);
        Ok(tracks)
    }

    async fn find_track(&self, track_id: TrackId) -> StoreResult<Option<Track>> {
        Ok(self.lock().tracks.get(&track_id).cloned())
    }

    async fn profile_counts_by_track(&self) -> StoreResult<HashMap<TrackId, i64>> {
        let inner = self.lock();
        let mut counts = HashMap::new();
        for profile in inner.profiles.values() {
            *counts.entry(profile.track_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn insert_profile(&self, new: NewProfile) -> StoreResult<TeacherProfile> {
        let mut inner = self.lock();
        let duplicate = inner
            .profiles
            .values()
            .any(|p| p.track_id == new.track_id && p.teacher_id == new.teacher_id);
        if duplicate {
            return Err(StoreError::UniqueViolation("teacher_profiles.track_teacher"));
        }

        let profile = TeacherProfile {
            id: inner.next(),
            track_id: new.track_id,
            teacher_id: new.teacher_id,
            headline: new.headline,
            about: new.about,
            created_at: Utc::now(),
        };
        inner.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn find_profile(&self, profile_id: ProfileId) -> StoreResult<Option<TeacherProfile>> {
        Ok(self.lock().profiles.get(&profile_id).cloned())
    }

    async fn list_profiles_for_track(
        &self,
        track_id: TrackId,
    ) -> StoreResult<Vec<TeacherProfile>> {
        let mut profiles: Vec<TeacherProfile> = self
            .lock()
            .profiles
            .values()
            .filter(|p| p.track_id == track_id)
            .cloned()
            .collect();
        profiles.sort_by_key(|p| p.id);
        Ok(profiles)
    }

    async fn content_counts(
        &self,
        profile_ids: &[ProfileId],
    ) -> StoreResult<HashMap<ProfileId, ContentCounts>> {
        let inner = self.lock();
        let mut counts: HashMap<ProfileId, ContentCounts> = HashMap::new();
        for id in profile_ids {
            let entry = counts.entry(*id).or_default();
            entry.videos = inner.videos.values().filter(|v| v.profile_id == *id).count() as i64;
            entry.tests = inner.tests.values().filter(|t| t.profile_id == *id).count() as i64;
            entry.guides = inner.guides.values().filter(|g| g.profile_id == *id).count() as i64;
        }
        Ok(counts)
    }

    async fn insert_video(&self, new: NewVideo) -> StoreResult<Video> {
        let mut inner = self.lock();
        let video = Video {
            id: inner.next(),
            profile_id: new.profile_id,
            title: new.title,
            url: new.url,
            duration: new.duration,
            test_id: new.test_id,
            guide_id: new.guide_id,
            created_at: Utc::now(),
        };
        inner.videos.insert(video.id, video.clone());
        Ok(video)
    }

    async fn find_video(&self, video_id: VideoId) -> StoreResult<Option<Video>> {
        Ok(self.lock().videos.get(&video_id).cloned())
    }

    async fn list_videos_for_profile(&self, profile_id: ProfileId) -> StoreResult<Vec<Video>> {
        let mut videos: Vec<Video> = self
            .lock()
            .videos
            .values()
            .filter(|v| v.profile_id == profile_id)
            .cloned()
            .collect();
        videos.sort_by_key(|v| v.id);
        Ok(videos)
    }

    async fn insert_test(&self, new: NewTest) -> StoreResult<Test> {
        let mut inner = self.lock();
        let test = Test {
            id: inner.next(),
            profile_id: new.profile_id,
            title: new.title,
            level: new.level,
            questions: new.questions,
            created_at: Utc::now(),
        };
        inner.tests.insert(test.id, test.clone());
        Ok(test)
    }

    async fn find_test(&self, test_id: TestId) -> StoreResult<Option<Test>> {
        Ok(self.lock().tests.get(&test_id).cloned())
    }

    async fn list_tests_for_profile(&self, profile_id: ProfileId) -> StoreResult<Vec<Test>> {
        let mut tests: Vec<Test> = self
            .lock()
            .tests
            .values()
            .filter(|t| t.profile_id == profile_id)
            .cloned()
            .collect();
        tests.sort_by_key(|t| t.id);
        Ok(tests)
    }

    async fn insert_guide(&self, new: NewGuide) -> StoreResult<Guide> {
        let mut inner = self.lock();
        let guide = Guide {
            id: inner.next(),
            profile_id: new.profile_id,
            title: new.title,
            url: new.url,
            created_at: Utc::now(),
        };
        inner.guides.insert(guide.id, guide.clone());
        Ok(guide)
    }

    async fn find_guide(&self, guide_id: GuideId) -> StoreResult<Option<Guide>> {
        Ok(self.lock().guides.get(&guide_id).cloned())
    }

    async fn list_guides_for_profile(&self, profile_id: ProfileId) -> StoreResult<Vec<Guide>> {
        let mut guides: Vec<Guide> = self
            .lock()
            .guides
            .values()
            .filter(|g| g.profile_id == profile_id)
            .cloned()
            .collect();
        guides.sort_by_key(|g| g.id);
        Ok(guides)
    }

    async fn insert_comment(&self, new: NewComment) -> StoreResult<Comment> {
        let mut inner = self.lock();
        let comment = Comment {
            id: inner.next(),
            video_id: new.video_id,
            user_id: new.user_id,
            text: new.text,
            created_at: Utc::now(),
        };
        inner.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn list_comments_for_video(&self, video_id: VideoId) -> StoreResult<Vec<Comment>> {
        let mut comments: Vec<Comment> = self
            .lock()
            .comments
            .values()
            .filter(|c| c.video_id == video_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| c.id);
        Ok(comments)
    }

    async fn insert_attempt(&self, new: NewAttempt) -> StoreResult<Attempt> {
        let mut inner = self.lock();
        let attempt = Attempt {
            id: inner.next(),
            test_id: new.test_id,
            user_id: new.user_id,
            answers: new.answers,
            correct_count: new.correct_count,
            total_questions: new.total_questions,
            score_percent: new.score_percent,
            created_at: Utc::now(),
        };
        inner.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn has_saved_attempt(&self, test_id: TestId, user_id: UserId) -> StoreResult<bool> {
        Ok(self
            .lock()
            .attempts
            .values()
            .any(|a| a.test_id == test_id && a.user_id == user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lms::models::{Level, Question};

    fn new_user(email: &str) -> NewUser {
        NewUser {
            full_name: "Test User".to_string(),
            age: None,
            email: email.to_string(),
            phone: None,
            password_hash: "hash".to_string(),
            role: Role::Student,
        }
    }

    #[tokio::test]
    async fn create_user_assigns_sequential_ids() {
        let repo = MemoryUserRepository::new();

        let first = repo.create_user(new_user("a@example.com")).await.unwrap();
        let second = repo.create_user(new_user("b@example.com")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.token_version, 0);
        assert!(first.refresh_token_hash.is_none());
    }

    #[tokio::test]
    async fn duplicate_email_reports_unique_violation() {
        let repo = MemoryUserRepository::new();
        repo.create_user(new_user("dup@example.com")).await.unwrap();

        let err = repo.create_user(new_user("dup@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation("users.email")));
    }

    #[tokio::test]
    async fn rotate_refresh_hash_is_single_winner() {
        let repo = MemoryUserRepository::new();
        let user = repo.create_user(new_user("cas@example.com")).await.unwrap();
        repo.store_refresh_hash(user.id, "old").await.unwrap();

        // First swap against the stored value wins.
        assert!(repo.rotate_refresh_hash(user.id, "old", "new-1").await.unwrap());
        // Replaying the same expected value loses.
        assert!(!repo.rotate_refresh_hash(user.id, "old", "new-2").await.unwrap());

        let stored = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token_hash.as_deref(), Some("new-1"));
    }

    #[tokio::test]
    async fn rotate_refresh_hash_fails_after_revoke() {
        let repo = MemoryUserRepository::new();
        let user = repo.create_user(new_user("gone@example.com")).await.unwrap();
        repo.store_refresh_hash(user.id, "hash").await.unwrap();

        repo.revoke_sessions(user.id).await.unwrap();
        assert!(!repo.rotate_refresh_hash(user.id, "hash", "next").await.unwrap());

        let stored = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.refresh_token_hash.is_none());
        assert_eq!(stored.token_version, 1);
    }

    #[tokio::test]
    async fn update_profile_clears_phone_with_inner_none() {
        let repo = MemoryUserRepository::new();
        let user = repo
            .create_user(NewUser {
                phone: Some("+1555".to_string()),
                ..new_user("phone@example.com")
            })
            .await
            .unwrap();

        let updated = repo
            .update_profile(
                user.id,
                ProfileChanges {
                    phone: Some(None),
                    ..ProfileChanges::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(updated.phone.is_none());
        assert_eq!(updated.full_name, "Test User");
    }

    #[tokio::test]
    async fn duplicate_profile_per_track_is_rejected() {
        let repo = MemoryContentRepository::new();
        let track = repo
            .insert_track(NewTrack {
                title: "Frontend".to_string(),
                description: "Web UI development".to_string(),
            })
            .await
            .unwrap();

        let profile = NewProfile {
            track_id: track.id,
            teacher_id: 9,
            headline: "Senior instructor".to_string(),
            about: "10 years of web".to_string(),
        };
        repo.insert_profile(profile.clone()).await.unwrap();

        let err = repo.insert_profile(profile).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::UniqueViolation("teacher_profiles.track_teacher")
        ));
    }

    #[tokio::test]
    async fn content_counts_tally_per_profile() {
        let repo = MemoryContentRepository::new();
        let track = repo
            .insert_track(NewTrack {
                title: "Backend".to_string(),
                description: "Server development".to_string(),
            })
            .await
            .unwrap();
        let profile = repo
            .insert_profile(NewProfile {
                track_id: track.id,
                teacher_id: 1,
                headline: "h".to_string(),
                about: "a".to_string(),
            })
            .await
            .unwrap();

        for i in 0..2 {
            repo.insert_video(NewVideo {
                profile_id: profile.id,
                title: format!("Video {i}"),
                url: "https://example.com/v".to_string(),
                duration: "10:00".to_string(),
                test_id: None,
                guide_id: None,
            })
            .await
            .unwrap();
        }
        repo.insert_test(NewTest {
            profile_id: profile.id,
            title: "Quiz".to_string(),
            level: Level::Easy,
            questions: vec![Question {
                text: "?".to_string(),
                options: vec!["a".to_string(), "b".to_string()],
                correct_index: 0,
                timeout_seconds: 10,
            }],
        })
        .await
        .unwrap();

        let counts = repo.content_counts(&[profile.id]).await.unwrap();
        let entry = counts.get(&profile.id).unwrap();
        assert_eq!(entry.videos, 2);
        assert_eq!(entry.tests, 1);
        assert_eq!(entry.guides, 0);
    }

    #[tokio::test]
    async fn per_profile_listings_keep_insertion_order() {
        let repo = MemoryContentRepository::new();
        let profile_id = 77;
        for i in 0..3 {
            repo.insert_video(NewVideo {
                profile_id,
                title: format!("Video {i}"),
                url: "https://example.com/v".to_string(),
                duration: "1:00".to_string(),
                test_id: None,
                guide_id: None,
            })
            .await
            .unwrap();
        }

        let videos = repo.list_videos_for_profile(profile_id).await.unwrap();
        let titles: Vec<&str> = videos.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, vec!["Video 0", "Video 1", "Video 2"]);
    }

    #[tokio::test]
    async fn saved_attempt_is_tracked_per_user_and_test() {
        let repo = MemoryContentRepository::new();
        assert!(!repo.has_saved_attempt(1, 2).await.unwrap());

        repo.insert_attempt(NewAttempt {
            test_id: 1,
            user_id: 2,
            answers: vec![0, 1],
            correct_count: 1,
            total_questions: 2,
            score_percent: 50,
        })
        .await
        .unwrap();

        assert!(repo.has_saved_attempt(1, 2).await.unwrap());
        assert!(!repo.has_saved_attempt(1, 3).await.unwrap());
    }
}
