//! User and session data models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User ID type
pub type UserId = i64;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }

    /// Decode a role stored in the database. Unknown values downgrade to
    /// `Student` so a corrupt row can never grant privileges.
    pub fn from_db(value: &str) -> Self {
        Role::from_str(value).unwrap_or(Role::Student)
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User record as stored. Carries the credential columns, so it is never
/// serialized; responses go through [`SanitizedUser`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub full_name: String,
    pub age: Option<i32>,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub blocked: bool,
    pub refresh_token_hash: Option<String>,
    pub token_version: i32,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn sanitized(&self) -> SanitizedUser {
        SanitizedUser {
            id: self.id,
            full_name: self.full_name.clone(),
            age: self.age,
            email: self.email.clone(),
            phone: self.phone.clone(),
            role: self.role,
            blocked: self.blocked,
            created_at: self.created_at,
        }
    }
}

/// Client-facing user view. No credential material, no session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizedUser {
    pub id: UserId,
    pub full_name: String,
    pub age: Option<i32>,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub blocked: bool,
    pub created_at: DateTime<Utc>,
}

/// Column values for a new user row
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub age: Option<i32>,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: Role,
}

/// User registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub age: Option<i32>,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
}

/// User login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Partial profile update. Absent fields are left untouched; an empty
/// phone clears the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub age: Option<i32>,
    pub phone: Option<String>,
}

/// Column changes for a profile update
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub full_name: Option<String>,
    pub age: Option<i32>,
    pub phone: Option<Option<String>>,
}

/// Session tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// JWT claims for the access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: UserId,
    pub role: Role,
    pub tv: i32, // token version at issue time
    pub exp: i64,
    pub iat: i64,
}

/// JWT claims for the refresh token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: UserId,
    pub tv: i32,
    pub jti: String, // random per-issue id, keeps equal inputs distinct
    pub exp: i64,
    pub iat: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: 7,
            full_name: "Alice Example".to_string(),
            age: Some(24),
            email: "alice@example.com".to_string(),
            phone: None,
            password_hash: "$argon2id$fake".to_string(),
            role: Role::Student,
            blocked: false,
            refresh_token_hash: Some("deadbeef".to_string()),
            token_version: 3,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Student, Role::Teacher, Role::Admin] {
            assert_eq!(Role::from_str(role.as_str()), Ok(role));
        }
        assert!(Role::from_str("superuser").is_err());
        assert!(Role::from_str("Admin").is_err());
    }

    #[test]
    fn unknown_db_role_downgrades_to_student() {
        assert_eq!(Role::from_db("admin"), Role::Admin);
        assert_eq!(Role::from_db("moderator"), Role::Student);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Teacher).unwrap();
        assert_eq!(json, "\"teacher\"");
    }

    #[test]
    fn sanitized_user_has_no_credential_fields() {
        let value = serde_json::to_value(sample_user().sanitized()).unwrap();
        let map = value.as_object().unwrap();
        assert!(map.contains_key("email"));
        assert!(!map.contains_key("password_hash"));
        assert!(!map.contains_key("refresh_token_hash"));
        assert!(!map.contains_key("token_version"));
    }
}
