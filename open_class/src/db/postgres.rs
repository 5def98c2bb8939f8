//! PostgreSQL implementations of the repository traits.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::auth::models::{NewUser, ProfileChanges, Role, User, UserId};
use crate::lms::models::{
    Attempt, Comment, Guide, GuideId, NewAttempt, NewComment, NewGuide, NewProfile, NewTest,
    NewTrack, NewVideo, ProfileId, Question, TeacherProfile, Test, TestId, Track, TrackId, Video,
    VideoId,
};

use super::repository::{
    ContentCounts, ContentRepository, StoreError, StoreResult, UserRepository,
};

/// PostgreSQL-backed user repository
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Map a unique-constraint violation onto [`StoreError::UniqueViolation`],
/// leaving other database errors untouched.
fn map_unique(err: sqlx::Error, constraint: &'static str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some("23505") {
            return StoreError::UniqueViolation(constraint);
        }
    }
    StoreError::Database(err)
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        full_name: row.get("full_name"),
        age: row.get("age"),
        email: row.get("email"),
        phone: row.get("phone"),
        password_hash: row.get("password_hash"),
        role: Role::from_db(row.get::<&str, _>("role")),
        blocked: row.get("blocked"),
        refresh_token_hash: row.get("refresh_token_hash"),
        token_version: row.get("token_version"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    }
}

const USER_COLUMNS: &str = "id, full_name, age, email, phone, password_hash, role, blocked, \
                            refresh_token_hash, token_version, created_at";

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (full_name, age, email, phone, password_hash, role)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&new.full_name)
            .bind(new.age)
            .bind(&new.email)
            .bind(&new.phone)
            .bind(&new.password_hash)
            .bind(new.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique(e, "users.email"))?;

        Ok(user_from_row(&row))
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_by_id(&self, user_id: UserId) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_by_ids(&self, user_ids: &[UserId]) -> StoreResult<Vec<User>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)");
        let rows = sqlx::query(&sql)
            .bind(user_ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn store_refresh_hash(&self, user_id: UserId, hash: &str) -> StoreResult<()> {
        sqlx::query("UPDATE users SET refresh_token_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn rotate_refresh_hash(
        &self,
        user_id: UserId,
        expected: &str,
        new_hash: &str,
    ) -> StoreResult<bool> {
        // Single-statement compare-and-swap: the row predicate makes the
        // rotation atomic, so concurrent refreshes cannot both win.
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = $3
             WHERE id = $1 AND refresh_token_hash = $2",
        )
        .bind(user_id)
        .bind(expected)
        .bind(new_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke_sessions(&self, user_id: UserId) -> StoreResult<()> {
        sqlx::query(
            "UPDATE users SET refresh_token_hash = NULL, token_version = token_version + 1
             WHERE id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_role(&self, user_id: UserId, role: Role) -> StoreResult<Option<User>> {
        let sql = format!("UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn set_blocked(&self, user_id: UserId, blocked: bool) -> StoreResult<Option<User>> {
        let sql = format!("UPDATE users SET blocked = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(blocked)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        changes: ProfileChanges,
    ) -> StoreResult<Option<User>> {
        let sql = format!(
            "UPDATE users
             SET full_name = CASE WHEN $2 THEN $3 ELSE full_name END,
                 age       = CASE WHEN $4 THEN $5 ELSE age END,
                 phone     = CASE WHEN $6 THEN $7 ELSE phone END
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(changes.full_name.is_some())
            .bind(changes.full_name)
            .bind(changes.age.is_some())
            .bind(changes.age)
            .bind(changes.phone.is_some())
            .bind(changes.phone.flatten())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }
}

/// PostgreSQL-backed content repository
pub struct PgContentRepository {
    pool: PgPool,
}

impl PgContentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn track_from_row(row: &PgRow) -> Track {
    Track {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    }
}

fn profile_from_row(row: &PgRow) -> TeacherProfile {
    TeacherProfile {
        id: row.get("id"),
        track_id: row.get("track_id"),
        teacher_id: row.get("teacher_id"),
        headline: row.get("headline"),
        about: row.get("about"),
        created_at: row.get("created_at"),
    }
}

fn video_from_row(row: &PgRow) -> Video {
    Video {
        id: row.get("id"),
        profile_id: row.get("profile_id"),
        title: row.get("title"),
        url: row.get("url"),
        duration: row.get("duration"),
        test_id: row.get("test_id"),
        guide_id: row.get("guide_id"),
        created_at: row.get("created_at"),
    }
}

fn test_from_row(row: &PgRow) -> StoreResult<Test> {
    let questions: Vec<Question> = serde_json::from_str(row.get::<&str, _>("questions"))
        .map_err(|_| StoreError::Corrupt("tests.questions"))?;
    Ok(Test {
        id: row.get("id"),
        profile_id: row.get("profile_id"),
        title: row.get("title"),
        level: row
            .get::<&str, _>("level")
            .parse()
            .map_err(|_| StoreError::Corrupt("tests.level"))?,
        questions,
        created_at: row.get("created_at"),
    })
}

fn guide_from_row(row: &PgRow) -> Guide {
    Guide {
        id: row.get("id"),
        profile_id: row.get("profile_id"),
        title: row.get("title"),
        url: row.get("url"),
        created_at: row.get("created_at"),
    }
}

fn comment_from_row(row: &PgRow) -> Comment {
    Comment {
        id: row.get("id"),
        video_id: row.get("video_id"),
        user_id: row.get("user_id"),
        text: row.get("text"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl ContentRepository for PgContentRepository {
    async fn insert_track(&self, new: NewTrack) -> StoreResult<Track> {
        let row = sqlx::query(
            "INSERT INTO tracks (title, description) VALUES ($1, $2)
             RETURNING id, title, description, created_at",
        )
        .bind(&new.title)
        .bind(&new.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(track_from_row(&row))
    }

    async fn list_tracks(&self) -> StoreResult<Vec<Track>> {
        let rows = sqlx::query(
            "SELECT id, title, description, created_at FROM tracks ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(track_from_row).collect())
    }

    async fn find_track(&self, track_id: TrackId) -> StoreResult<Option<Track>> {
        let row = sqlx::query("SELECT id, title, description, created_at FROM tracks WHERE id = $1")
            .bind(track_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(track_from_row))
    }

    async fn profile_counts_by_track(&self) -> StoreResult<HashMap<TrackId, i64>> {
        let rows =
            sqlx::query("SELECT track_id, COUNT(*) AS n FROM teacher_profiles GROUP BY track_id")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .iter()
            .map(|r| (r.get::<TrackId, _>("track_id"), r.get::<i64, _>("n")))
            .collect())
    }

    async fn insert_profile(&self, new: NewProfile) -> StoreResult<TeacherProfile> {
        let row = sqlx::query(
            "INSERT INTO teacher_profiles (track_id, teacher_id, headline, about)
             VALUES ($1, $2, $3, $4)
             RETURNING id, track_id, teacher_id, headline, about, created_at",
        )
        .bind(new.track_id)
        .bind(new.teacher_id)
        .bind(&new.headline)
        .bind(&new.about)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "teacher_profiles.track_teacher"))?;

        Ok(profile_from_row(&row))
    }

    async fn find_profile(&self, profile_id: ProfileId) -> StoreResult<Option<TeacherProfile>> {
        let row = sqlx::query(
            "SELECT id, track_id, teacher_id, headline, about, created_at
             FROM teacher_profiles WHERE id = $1",
        )
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(profile_from_row))
    }

    async fn list_profiles_for_track(
        &self,
        track_id: TrackId,
    ) -> StoreResult<Vec<TeacherProfile>> {
        let rows = sqlx::query(
            "SELECT id, track_id, teacher_id, headline, about, created_at
             FROM teacher_profiles WHERE track_id = $1 ORDER BY id",
        )
        .bind(track_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(profile_from_row).collect())
    }

    async fn content_counts(
        &self,
        profile_ids: &[ProfileId],
    ) -> StoreResult<HashMap<ProfileId, ContentCounts>> {
        let mut counts: HashMap<ProfileId, ContentCounts> = HashMap::new();
        if profile_ids.is_empty() {
            return Ok(counts);
        }

        let mut tally = |rows: Vec<PgRow>, field: fn(&mut ContentCounts) -> &mut i64| {
            for row in rows {
                let entry = counts
                    .entry(row.get::<ProfileId, _>("profile_id"))
                    .or_default();
                *field(entry) = row.get("n");
            }
        };

        let videos = sqlx::query(
            "SELECT profile_id, COUNT(*) AS n FROM videos
             WHERE profile_id = ANY($1) GROUP BY profile_id",
        )
        .bind(profile_ids)
        .fetch_all(&self.pool)
        .await?;
        tally(videos, |c| &mut c.videos);

        let tests = sqlx::query(
            "SELECT profile_id, COUNT(*) AS n FROM tests
             WHERE profile_id = ANY($1) GROUP BY profile_id",
        )
        .bind(profile_ids)
        .fetch_all(&self.pool)
        .await?;
        tally(tests, |c| &mut c.tests);

        let guides = sqlx::query(
            "SELECT profile_id, COUNT(*) AS n FROM guides
             WHERE profile_id = ANY($1) GROUP BY profile_id",
        )
        .bind(profile_ids)
        .fetch_all(&self.pool)
        .await?;
        tally(guides, |c| &mut c.guides);

        Ok(counts)
    }

    async fn insert_video(&self, new: NewVideo) -> StoreResult<Video> {
        let row = sqlx::query(
            "INSERT INTO videos (profile_id, title, url, duration, test_id, guide_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, profile_id, title, url, duration, test_id, guide_id, created_at",
        )
        .bind(new.profile_id)
        .bind(&new.title)
        .bind(&new.url)
        .bind(&new.duration)
        .bind(new.test_id)
        .bind(new.guide_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(video_from_row(&row))
    }

    async fn find_video(&self, video_id: VideoId) -> StoreResult<Option<Video>> {
        let row = sqlx::query(
            "SELECT id, profile_id, title, url, duration, test_id, guide_id, created_at
             FROM videos WHERE id = $1",
        )
        .bind(video_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(video_from_row))
    }

    async fn list_videos_for_profile(&self, profile_id: ProfileId) -> StoreResult<Vec<Video>> {
        let rows = sqlx::query(
            "SELECT id, profile_id, title, url, duration, test_id, guide_id, created_at
             FROM videos WHERE profile_id = $1 ORDER BY id",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(video_from_row).collect())
    }

    async fn insert_test(&self, new: NewTest) -> StoreResult<Test> {
        let questions =
            serde_json::to_string(&new.questions).map_err(|_| StoreError::Corrupt("tests.questions"))?;
        let row = sqlx::query(
            "INSERT INTO tests (profile_id, title, level, questions)
             VALUES ($1, $2, $3, $4)
             RETURNING id, profile_id, title, level, questions, created_at",
        )
        .bind(new.profile_id)
        .bind(&new.title)
        .bind(new.level.as_str())
        .bind(&questions)
        .fetch_one(&self.pool)
        .await?;

        test_from_row(&row)
    }

    async fn find_test(&self, test_id: TestId) -> StoreResult<Option<Test>> {
        let row = sqlx::query(
            "SELECT id, profile_id, title, level, questions, created_at FROM tests WHERE id = $1",
        )
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(test_from_row).transpose()
    }

    async fn list_tests_for_profile(&self, profile_id: ProfileId) -> StoreResult<Vec<Test>> {
        let rows = sqlx::query(
            "SELECT id, profile_id, title, level, questions, created_at
             FROM tests WHERE profile_id = $1 ORDER BY id",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(test_from_row).collect()
    }

    async fn insert_guide(&self, new: NewGuide) -> StoreResult<Guide> {
        let row = sqlx::query(
            "INSERT INTO guides (profile_id, title, url) VALUES ($1, $2, $3)
             RETURNING id, profile_id, title, url, created_at",
        )
        .bind(new.profile_id)
        .bind(&new.title)
        .bind(&new.url)
        .fetch_one(&self.pool)
        .await?;

        Ok(guide_from_row(&row))
    }

    async fn find_guide(&self, guide_id: GuideId) -> StoreResult<Option<Guide>> {
        let row = sqlx::query(
            "SELECT id, profile_id, title, url, created_at FROM guides WHERE id = $1",
        )
        .bind(guide_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(guide_from_row))
    }

    async fn list_guides_for_profile(&self, profile_id: ProfileId) -> StoreResult<Vec<Guide>> {
        let rows = sqlx::query(
            "SELECT id, profile_id, title, url, created_at
             FROM guides WHERE profile_id = $1 ORDER BY id",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(guide_from_row).collect())
    }

    async fn insert_comment(&self, new: NewComment) -> StoreResult<Comment> {
        let row = sqlx::query(
            "INSERT INTO comments (video_id, user_id, text) VALUES ($1, $2, $3)
             RETURNING id, video_id, user_id, text, created_at",
        )
        .bind(new.video_id)
        .bind(new.user_id)
        .bind(&new.text)
        .fetch_one(&self.pool)
        .await?;

        Ok(comment_from_row(&row))
    }

    async fn list_comments_for_video(&self, video_id: VideoId) -> StoreResult<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT id, video_id, user_id, text, created_at
             FROM comments WHERE video_id = $1 ORDER BY id",
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    async fn insert_attempt(&self, new: NewAttempt) -> StoreResult<Attempt> {
        let answers =
            serde_json::to_string(&new.answers).map_err(|_| StoreError::Corrupt("attempts.answers"))?;
        let row = sqlx::query(
            "INSERT INTO attempts (test_id, user_id, answers, correct_count, total_questions, score_percent)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, test_id, user_id, answers, correct_count, total_questions, score_percent, created_at",
        )
        .bind(new.test_id)
        .bind(new.user_id)
        .bind(&answers)
        .bind(new.correct_count)
        .bind(new.total_questions)
        .bind(new.score_percent)
        .fetch_one(&self.pool)
        .await?;

        let answers: Vec<i32> = serde_json::from_str(row.get::<&str, _>("answers"))
            .map_err(|_| StoreError::Corrupt("attempts.answers"))?;
        Ok(Attempt {
            id: row.get("id"),
            test_id: row.get("test_id"),
            user_id: row.get("user_id"),
            answers,
            correct_count: row.get("correct_count"),
            total_questions: row.get("total_questions"),
            score_percent: row.get("score_percent"),
            created_at: row.get("created_at"),
        })
    }

    async fn has_saved_attempt(&self, test_id: TestId, user_id: UserId) -> StoreResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM attempts WHERE test_id = $1 AND user_id = $2) AS present",
        )
        .bind(test_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("present"))
    }
}
