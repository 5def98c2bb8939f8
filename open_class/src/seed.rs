//! Startup seeding: the admin account and optional demo fixtures.

use tracing::info;

use crate::auth::{AuthManager, AuthResult, Role, UpdateProfileRequest};
use crate::db::repository::ContentRepository;
use crate::lms::models::NewTrack;

/// Create the admin account if its email is not registered yet.
///
/// An existing account is left untouched, so a changed `ADMIN_PASSWORD`
/// never rewrites a live credential.
pub async fn ensure_admin(auth: &AuthManager, email: &str, password: &str) -> AuthResult<()> {
    if let Some(admin) = auth
        .ensure_user("OpenClass", email, password, Role::Admin)
        .await?
    {
        info!(email = %admin.email, "seeded admin account");
    }
    Ok(())
}

/// Idempotently create demo users and starter tracks for local
/// development.
pub async fn seed_demo(auth: &AuthManager, content: &dyn ContentRepository) -> AuthResult<()> {
    let demo_users = [
        (
            "Demo Student",
            "student@openclass.local",
            "Student123!",
            Role::Student,
            18,
            "+1 555 0100",
        ),
        (
            "Demo Teacher",
            "teacher@openclass.local",
            "Teacher123!",
            Role::Teacher,
            24,
            "+1 555 0101",
        ),
    ];

    for (full_name, email, password, role, age, phone) in demo_users {
        if let Some(user) = auth.ensure_user(full_name, email, password, role).await? {
            auth.update_profile(
                user.id,
                UpdateProfileRequest {
                    age: Some(age),
                    phone: Some(phone.to_string()),
                    ..UpdateProfileRequest::default()
                },
            )
            .await?;
            info!(email = %user.email, "seeded demo user");
        }
    }

    let demo_tracks = [
        (
            "Frontend (HTML/CSS/JS)",
            "Modern interfaces from scratch, with real projects.",
        ),
        (
            "Backend (APIs)",
            "HTTP services, JWT auth, role based access, REST APIs.",
        ),
    ];

    let existing = content.list_tracks().await?;
    for (title, description) in demo_tracks {
        if existing.iter().any(|t| t.title == title) {
            continue;
        }
        content
            .insert_track(NewTrack {
                title: title.to_string(),
                description: description.to_string(),
            })
            .await?;
        info!(title, "seeded demo track");
    }

    Ok(())
}
