//! Content manager: tracks, teacher profiles, videos, tests, guides,
//! comments and scored attempts.

use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::models::{Role, User, UserId};
use crate::db::repository::{ContentCounts, ContentRepository, StoreError, UserRepository};

use super::{
    errors::{LmsError, LmsResult},
    models::{
        AttemptOutcome, AttemptScore, CommentView, CreateCommentInput, CreateGuideInput,
        CreateProfileInput, CreateTestInput, CreateVideoInput, Guide, NewAttempt, NewComment,
        NewGuide, NewProfile, NewTest, NewTrack, NewVideo, ProfileId, ProfileView, Question,
        TeacherProfile, TestId, TestSummary, TestView, Track, TrackId, TrackSummary,
        TrackTeachers, Video, VideoDetail, VideoId,
    },
};

/// Display name shown next to content an admin authored
const PLATFORM_NAME: &str = "OpenClass";

/// Content manager
///
/// Owns the content and user store handles. Validation, ownership and
/// role rules for all learning content live here; handlers only translate
/// errors to HTTP.
#[derive(Clone)]
pub struct LmsManager {
    content: Arc<dyn ContentRepository>,
    users: Arc<dyn UserRepository>,
}

impl LmsManager {
    pub fn new(content: Arc<dyn ContentRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { content, users }
    }

    // ===== Tracks =====

    /// Create a track. Reachable through the admin surface only.
    pub async fn create_track(&self, input: NewTrack) -> LmsResult<Track> {
        let title = input.title.trim().to_string();
        let description = input.description.trim().to_string();
        if title.len() < 2 {
            return Err(LmsError::InvalidInput("Title is required".to_string()));
        }
        if description.len() < 4 {
            return Err(LmsError::InvalidInput("Description is required".to_string()));
        }

        Ok(self.content.insert_track(NewTrack { title, description }).await?)
    }

    /// All tracks with their teacher tallies, oldest first
    pub async fn list_tracks(&self) -> LmsResult<Vec<TrackSummary>> {
        let tracks = self.content.list_tracks().await?;
        let counts = self.content.profile_counts_by_track().await?;

        Ok(tracks
            .into_iter()
            .map(|t| {
                let teachers_count = counts.get(&t.id).copied().unwrap_or(0);
                TrackSummary {
                    id: t.id,
                    title: t.title,
                    description: t.description,
                    teachers_count,
                    created_at: t.created_at,
                }
            })
            .collect())
    }

    /// A track with its teacher profiles, joined with names and content
    /// tallies
    pub async fn track_teachers(&self, track_id: TrackId) -> LmsResult<TrackTeachers> {
        let track = self
            .content
            .find_track(track_id)
            .await?
            .ok_or(LmsError::NotFound("Track"))?;
        let profiles = self.content.list_profiles_for_track(track_id).await?;

        let teacher_ids: Vec<UserId> = profiles.iter().map(|p| p.teacher_id).collect();
        let names = self.teacher_names(&teacher_ids).await?;

        let profile_ids: Vec<ProfileId> = profiles.iter().map(|p| p.id).collect();
        let counts = self.content.content_counts(&profile_ids).await?;

        let profiles = profiles
            .into_iter()
            .map(|p| {
                let tally = counts.get(&p.id).copied().unwrap_or_default();
                let name = names
                    .get(&p.teacher_id)
                    .cloned()
                    .unwrap_or_else(|| "Teacher".to_string());
                profile_view(p, name, tally)
            })
            .collect();

        Ok(TrackTeachers { track, profiles })
    }

    // ===== Teacher profiles =====

    /// Create the caller's profile on a track, one per teacher per track
    pub async fn create_profile(
        &self,
        actor: &User,
        track_id: TrackId,
        input: CreateProfileInput,
    ) -> LmsResult<ProfileView> {
        self.content
            .find_track(track_id)
            .await?
            .ok_or(LmsError::NotFound("Track"))?;

        let headline = input.headline.trim().to_string();
        let about = clamp_text(&input.about, 20);
        if headline.len() < 2 {
            return Err(LmsError::InvalidInput("Headline is required".to_string()));
        }
        if about.len() < 2 {
            return Err(LmsError::InvalidInput(
                "About is required (max 20 chars)".to_string(),
            ));
        }

        let profile = self
            .content
            .insert_profile(NewProfile {
                track_id,
                teacher_id: actor.id,
                headline,
                about,
            })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => LmsError::ProfileExists,
                other => LmsError::Store(other),
            })?;

        Ok(profile_view(profile, display_name(actor), ContentCounts::default()))
    }

    /// A single profile with its teacher's name and content tallies
    pub async fn profile_detail(&self, profile_id: ProfileId) -> LmsResult<ProfileView> {
        let profile = self.find_profile(profile_id).await?;
        let names = self.teacher_names(&[profile.teacher_id]).await?;
        let name = names
            .get(&profile.teacher_id)
            .cloned()
            .unwrap_or_else(|| "Teacher".to_string());

        let counts = self.content.content_counts(&[profile.id]).await?;
        let tally = counts.get(&profile.id).copied().unwrap_or_default();
        Ok(profile_view(profile, name, tally))
    }

    // ===== Videos =====

    pub async fn list_videos(&self, profile_id: ProfileId) -> LmsResult<Vec<Video>> {
        self.find_profile(profile_id).await?;
        Ok(self.content.list_videos_for_profile(profile_id).await?)
    }

    /// Add a video under a profile. Owner or admin only; a linked test or
    /// guide must belong to the same profile.
    pub async fn create_video(
        &self,
        actor: &User,
        profile_id: ProfileId,
        input: CreateVideoInput,
    ) -> LmsResult<Video> {
        let profile = self.find_profile(profile_id).await?;
        require_owner(actor, &profile)?;

        let url = input.url.trim().to_string();
        let title = input.title.trim().to_string();
        let duration = input.duration.trim().to_string();
        if url.is_empty() {
            return Err(LmsError::InvalidInput("Video URL is required".to_string()));
        }
        if title.len() < 2 {
            return Err(LmsError::InvalidInput("Title is required".to_string()));
        }
        if duration.is_empty() {
            return Err(LmsError::InvalidInput("Duration is required".to_string()));
        }

        if let Some(test_id) = input.test_id {
            let linked = self.content.find_test(test_id).await?;
            if !linked.is_some_and(|t| t.profile_id == profile.id) {
                return Err(LmsError::InvalidInput("Invalid linked test".to_string()));
            }
        }
        if let Some(guide_id) = input.guide_id {
            let linked = self.content.find_guide(guide_id).await?;
            if !linked.is_some_and(|g| g.profile_id == profile.id) {
                return Err(LmsError::InvalidInput("Invalid linked guide".to_string()));
            }
        }

        Ok(self
            .content
            .insert_video(NewVideo {
                profile_id: profile.id,
                title,
                url,
                duration,
                test_id: input.test_id,
                guide_id: input.guide_id,
            })
            .await?)
    }

    /// A video with its comments, joined with author names
    pub async fn video_detail(&self, video_id: VideoId) -> LmsResult<VideoDetail> {
        let video = self
            .content
            .find_video(video_id)
            .await?
            .ok_or(LmsError::NotFound("Video"))?;
        let comments = self.content.list_comments_for_video(video_id).await?;

        let author_ids: Vec<UserId> = comments.iter().map(|c| c.user_id).collect();
        let names = self.teacher_names(&author_ids).await?;

        let comments = comments
            .into_iter()
            .map(|c| CommentView {
                id: c.id,
                text: c.text,
                author_name: names
                    .get(&c.user_id)
                    .cloned()
                    .unwrap_or_else(|| "User".to_string()),
                created_at: c.created_at,
            })
            .collect();

        Ok(VideoDetail { video, comments })
    }

    /// Comment on a video. Students and admins only.
    pub async fn add_comment(
        &self,
        actor: &User,
        video_id: VideoId,
        input: CreateCommentInput,
    ) -> LmsResult<CommentView> {
        if actor.role == Role::Teacher {
            return Err(LmsError::Forbidden);
        }

        let text = input.text.trim();
        if text.is_empty() {
            return Err(LmsError::InvalidInput("Comment text required".to_string()));
        }

        self.content
            .find_video(video_id)
            .await?
            .ok_or(LmsError::NotFound("Video"))?;

        let comment = self
            .content
            .insert_comment(NewComment {
                video_id,
                user_id: actor.id,
                text: clamp_text(text, 500),
            })
            .await?;

        Ok(CommentView {
            id: comment.id,
            text: comment.text,
            author_name: display_name(actor),
            created_at: comment.created_at,
        })
    }

    // ===== Tests =====

    /// Test listing for a profile. Question bodies stay out of listings;
    /// only their count is exposed.
    pub async fn list_tests(&self, profile_id: ProfileId) -> LmsResult<Vec<TestSummary>> {
        self.find_profile(profile_id).await?;
        let tests = self.content.list_tests_for_profile(profile_id).await?;
        Ok(tests.iter().map(|t| t.summary()).collect())
    }

    /// Add a test under a profile. Owner or admin only.
    pub async fn create_test(
        &self,
        actor: &User,
        profile_id: ProfileId,
        input: CreateTestInput,
    ) -> LmsResult<TestView> {
        let profile = self.find_profile(profile_id).await?;
        require_owner(actor, &profile)?;

        let title = input.title.trim().to_string();
        if title.len() < 2 {
            return Err(LmsError::InvalidInput("Title is required".to_string()));
        }
        let level = input
            .level
            .trim()
            .to_lowercase()
            .parse()
            .map_err(|_| LmsError::InvalidInput("Invalid level".to_string()))?;
        if input.questions.is_empty() {
            return Err(LmsError::InvalidInput(
                "At least 1 question required".to_string(),
            ));
        }

        let mut questions = Vec::with_capacity(input.questions.len());
        for (i, q) in input.questions.into_iter().enumerate() {
            let n = i + 1;
            let text = q.text.trim().to_string();
            if text.is_empty() {
                return Err(LmsError::InvalidInput(format!("Question {n}: text required")));
            }
            if q.options.len() < 2 {
                return Err(LmsError::InvalidInput(format!(
                    "Question {n}: at least 2 options required"
                )));
            }
            if q.correct_index < 0 || q.correct_index as usize >= q.options.len() {
                return Err(LmsError::InvalidInput(format!(
                    "Question {n}: correct option out of range"
                )));
            }
            if !(1..=15).contains(&q.timeout_seconds) {
                return Err(LmsError::InvalidInput(format!(
                    "Question {n}: timeout must be between 1 and 15 seconds"
                )));
            }
            questions.push(Question {
                text,
                options: q.options,
                correct_index: q.correct_index,
                timeout_seconds: q.timeout_seconds,
            });
        }

        let test = self
            .content
            .insert_test(NewTest {
                profile_id: profile.id,
                title,
                level,
                questions,
            })
            .await?;

        Ok(test.view(true))
    }

    /// Test detail. Students receive the questions without the correct
    /// indexes; teachers and admins see everything.
    pub async fn test_detail(&self, actor: &User, test_id: TestId) -> LmsResult<TestView> {
        let test = self
            .content
            .find_test(test_id)
            .await?
            .ok_or(LmsError::NotFound("Test"))?;
        Ok(test.view(actor.role != Role::Student))
    }

    /// Score a student's attempt. The first attempt per test and student
    /// is saved; later attempts still report their score.
    pub async fn submit_attempt(
        &self,
        actor: &User,
        test_id: TestId,
        answers: Vec<i32>,
    ) -> LmsResult<AttemptOutcome> {
        if actor.role != Role::Student {
            return Err(LmsError::Forbidden);
        }

        let test = self
            .content
            .find_test(test_id)
            .await?
            .ok_or(LmsError::NotFound("Test"))?;
        if answers.len() != test.questions.len() {
            return Err(LmsError::InvalidInput("Answers length mismatch".to_string()));
        }

        let result = score_attempt(&test.questions, &answers);
        let already_saved = self.content.has_saved_attempt(test_id, actor.id).await?;
        if already_saved {
            return Ok(AttemptOutcome {
                saved: false,
                result,
            });
        }

        self.content
            .insert_attempt(NewAttempt {
                test_id,
                user_id: actor.id,
                answers,
                correct_count: result.correct_count,
                total_questions: result.total_questions,
                score_percent: result.score_percent,
            })
            .await?;

        Ok(AttemptOutcome {
            saved: true,
            result,
        })
    }

    // ===== Guides =====

    pub async fn list_guides(&self, profile_id: ProfileId) -> LmsResult<Vec<Guide>> {
        self.find_profile(profile_id).await?;
        Ok(self.content.list_guides_for_profile(profile_id).await?)
    }

    /// Add a PDF guide under a profile. Owner or admin only.
    pub async fn create_guide(
        &self,
        actor: &User,
        profile_id: ProfileId,
        input: CreateGuideInput,
    ) -> LmsResult<Guide> {
        let profile = self.find_profile(profile_id).await?;
        require_owner(actor, &profile)?;

        let url = input.url.trim().to_string();
        let title = input.title.trim().to_string();
        if url.is_empty() {
            return Err(LmsError::InvalidInput("PDF URL is required".to_string()));
        }
        if !is_pdf_url(&url) {
            return Err(LmsError::InvalidInput(
                "Guide must be a .pdf URL".to_string(),
            ));
        }
        if title.len() < 2 {
            return Err(LmsError::InvalidInput("Title is required".to_string()));
        }

        Ok(self
            .content
            .insert_guide(NewGuide {
                profile_id: profile.id,
                title,
                url,
            })
            .await?)
    }

    // ===== Helpers =====

    async fn find_profile(&self, profile_id: ProfileId) -> LmsResult<TeacherProfile> {
        self.content
            .find_profile(profile_id)
            .await?
            .ok_or(LmsError::NotFound("Profile"))
    }

    /// Display names keyed by user id, admins shown as the platform
    async fn teacher_names(&self, user_ids: &[UserId]) -> LmsResult<HashMap<UserId, String>> {
        let users = self.users.find_by_ids(user_ids).await?;
        Ok(users
            .iter()
            .map(|u| (u.id, display_name(u)))
            .collect())
    }
}

fn profile_view(profile: TeacherProfile, teacher_name: String, tally: ContentCounts) -> ProfileView {
    ProfileView {
        id: profile.id,
        track_id: profile.track_id,
        teacher_id: profile.teacher_id,
        teacher_name,
        headline: profile.headline,
        about: profile.about,
        videos_count: tally.videos,
        tests_count: tally.tests,
        guides_count: tally.guides,
        created_at: profile.created_at,
    }
}

/// Admin-authored content is displayed under the platform name
fn display_name(user: &User) -> String {
    match user.role {
        Role::Admin => PLATFORM_NAME.to_string(),
        _ => user.full_name.clone(),
    }
}

fn require_owner(actor: &User, profile: &TeacherProfile) -> LmsResult<()> {
    if actor.id == profile.teacher_id || actor.role == Role::Admin {
        Ok(())
    } else {
        Err(LmsError::NotOwner)
    }
}

/// Trim, then cut to at most `max` characters
fn clamp_text(s: &str, max: usize) -> String {
    let t = s.trim();
    if t.chars().count() > max {
        t.chars().take(max).collect()
    } else {
        t.to_string()
    }
}

/// The URL path must end in `.pdf`; a query string or fragment may follow
fn is_pdf_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.match_indices(".pdf").any(|(i, _)| {
        matches!(lower.as_bytes().get(i + 4), None | Some(b'?') | Some(b'#'))
    })
}

/// Positional scoring: one point per answer equal to the question's
/// correct index, percent rounded to the nearest integer
fn score_attempt(questions: &[Question], answers: &[i32]) -> AttemptScore {
    let correct_count = questions
        .iter()
        .zip(answers)
        .filter(|(q, a)| q.correct_index == **a)
        .count() as i32;
    let total_questions = questions.len() as i32;
    let score_percent = if total_questions == 0 {
        0
    } else {
        (f64::from(correct_count) / f64::from(total_questions) * 100.0).round() as i32
    };

    AttemptScore {
        correct_count,
        total_questions,
        score_percent,
    }
}
