//! Session manager: registration, login, refresh rotation and revocation.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::db::repository::{StoreError, UserRepository};

use super::{
    errors::{AuthError, AuthResult},
    models::{
        LoginRequest, NewUser, ProfileChanges, RegisterRequest, Role, SessionTokens,
        UpdateProfileRequest, User, UserId,
    },
    tokens::TokenCodec,
};

/// Session manager
///
/// Owns the store handle and the token codec. Every state transition of a
/// user session (register, login, refresh, logout, revocation) goes through
/// here; the HTTP layer only moves tokens between cookies and this type.
#[derive(Clone)]
pub struct AuthManager {
    users: Arc<dyn UserRepository>,
    codec: TokenCodec,
    pepper: String,
}

impl AuthManager {
    /// Create a new session manager
    ///
    /// # Arguments
    ///
    /// * `users` - User store handle
    /// * `codec` - Token codec with both signing secrets
    /// * `pepper` - Server-side pepper for password hashing
    pub fn new(users: Arc<dyn UserRepository>, codec: TokenCodec, pepper: String) -> Self {
        Self {
            users,
            codec,
            pepper,
        }
    }

    /// The token codec, for cookie lifetime alignment
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Register a new user and open a session
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidInput` - A field failed validation
    /// * `AuthError::EmailTaken` - Email already registered
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<(User, SessionTokens)> {
        let full_name = request.full_name.trim().to_string();
        if full_name.len() < 3 {
            return Err(AuthError::InvalidInput(
                "Full name must be at least 3 characters".to_string(),
            ));
        }

        let email = normalize_email(&request.email);
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::InvalidInput("A valid email is required".to_string()));
        }

        if request.password.len() < 6 {
            return Err(AuthError::InvalidInput(
                "Password must be at least 6 characters".to_string(),
            ));
        }

        if let Some(age) = request.age {
            validate_age(age)?;
        }

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.hash_password(&request.password)?;
        let phone = request
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        let user = self
            .users
            .create_user(NewUser {
                full_name,
                age: request.age,
                email,
                phone,
                password_hash,
                role: Role::Student,
            })
            .await
            .map_err(|e| match e {
                // Lost a create race after the existence check.
                StoreError::UniqueViolation(_) => AuthError::EmailTaken,
                other => AuthError::Store(other),
            })?;

        let tokens = self.create_session(&user).await?;
        debug!(user_id = user.id, "user registered");
        Ok((user, tokens))
    }

    /// Login with email and password
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidCredentials` - Unknown email or wrong password
    /// * `AuthError::Blocked` - Account is blocked
    pub async fn login(&self, request: LoginRequest) -> AuthResult<(User, SessionTokens)> {
        let email = normalize_email(&request.email);
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if user.blocked {
            return Err(AuthError::Blocked);
        }

        self.verify_password(&request.password, &user.password_hash)?;

        let tokens = self.create_session(&user).await?;
        debug!(user_id = user.id, "user logged in");
        Ok((user, tokens))
    }

    /// Rotate a refresh token, single use
    ///
    /// The presented token must verify, belong to an existing unblocked
    /// user, carry the current token version, and hash to the stored
    /// fingerprint. Rotation is a compare-and-swap on that fingerprint, so
    /// of two concurrent refreshes with the same token exactly one wins.
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidToken` - Any of the checks above failed
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<(User, SessionTokens)> {
        let claims = self.codec.verify_refresh(refresh_token)?;
        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if user.blocked || claims.tv != user.token_version {
            return Err(AuthError::InvalidToken);
        }

        let presented = TokenCodec::fingerprint(refresh_token);
        let stored = user
            .refresh_token_hash
            .as_deref()
            .ok_or(AuthError::InvalidToken)?;
        if !hashes_match(&presented, stored) {
            return Err(AuthError::InvalidToken);
        }

        let access_token = self.codec.issue_access(&user)?;
        let issued = self.codec.issue_refresh(&user)?;
        let swapped = self
            .users
            .rotate_refresh_hash(user.id, &presented, &issued.token_hash)
            .await?;
        if !swapped {
            return Err(AuthError::InvalidToken);
        }

        debug!(user_id = user.id, "refresh token rotated");
        Ok((
            user,
            SessionTokens {
                access_token,
                refresh_token: issued.token,
            },
        ))
    }

    /// Best-effort logout
    ///
    /// If the presented token verifies, the user's refresh hash is cleared
    /// and the token version bumped, invalidating every outstanding token
    /// of both kinds. All failures are swallowed; the transport layer
    /// clears its cookies regardless.
    pub async fn logout(&self, refresh_token: Option<&str>) {
        let Some(token) = refresh_token else {
            return;
        };
        let Ok(claims) = self.codec.verify_refresh(token) else {
            debug!("logout with unverifiable refresh token");
            return;
        };
        match self.users.revoke_sessions(claims.sub).await {
            Ok(()) => debug!(user_id = claims.sub, "sessions revoked"),
            Err(e) => warn!(user_id = claims.sub, error = %e, "logout revocation failed"),
        }
    }

    /// Authenticate an access token and load its user
    ///
    /// This is the per-request pipeline behind the protected routes:
    /// signature and expiry, then the live account checks.
    ///
    /// # Errors
    ///
    /// * `AuthError::Jwt` - Bad signature, expired or malformed
    /// * `AuthError::InvalidToken` - Unknown subject or stale token version
    /// * `AuthError::Blocked` - Account is blocked
    pub async fn authenticate(&self, access_token: &str) -> AuthResult<User> {
        let claims = self.codec.verify_access(access_token)?;
        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if user.blocked {
            return Err(AuthError::Blocked);
        }
        if claims.tv != user.token_version {
            return Err(AuthError::InvalidToken);
        }

        Ok(user)
    }

    /// Update the caller's profile fields
    pub async fn update_profile(
        &self,
        user_id: UserId,
        request: UpdateProfileRequest,
    ) -> AuthResult<User> {
        let mut changes = ProfileChanges::default();

        if let Some(full_name) = request.full_name {
            let full_name = full_name.trim().to_string();
            if full_name.len() < 3 {
                return Err(AuthError::InvalidInput(
                    "Full name must be at least 3 characters".to_string(),
                ));
            }
            changes.full_name = Some(full_name);
        }

        if let Some(age) = request.age {
            validate_age(age)?;
            changes.age = Some(age);
        }

        if let Some(phone) = request.phone {
            let phone = phone.trim().to_string();
            // Empty phone clears the stored value.
            changes.phone = Some(if phone.is_empty() { None } else { Some(phone) });
        }

        self.users
            .update_profile(user_id, changes)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// All users, for the admin listing
    pub async fn list_users(&self) -> AuthResult<Vec<User>> {
        Ok(self.users.list_users().await?)
    }

    /// Admin: change a user's role
    ///
    /// The admin role is never assignable here, and admin accounts are not
    /// modifiable through this operation.
    pub async fn set_role(&self, target: UserId, role: Role) -> AuthResult<User> {
        if role == Role::Admin {
            return Err(AuthError::InvalidInput(
                "Admin role cannot be assigned".to_string(),
            ));
        }
        let current = self
            .users
            .find_by_id(target)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if current.role == Role::Admin {
            return Err(AuthError::InvalidInput("Cannot modify admin user".to_string()));
        }

        self.users
            .set_role(target, role)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Admin: block or unblock a user
    ///
    /// Blocking does not bump the token version; the request gate enforces
    /// the flag live, so outstanding tokens die immediately anyway.
    pub async fn set_blocked(&self, target: UserId, blocked: bool) -> AuthResult<User> {
        let current = self
            .users
            .find_by_id(target)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if current.role == Role::Admin {
            return Err(AuthError::InvalidInput("Cannot block admin user".to_string()));
        }

        self.users
            .set_blocked(target, blocked)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Create a user with an explicit role if the email is free
    ///
    /// Used by startup seeding; normal registration always goes through
    /// [`Self::register`] and is pinned to the student role. Returns
    /// `None` when the email already exists.
    pub async fn ensure_user(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> AuthResult<Option<User>> {
        let email = normalize_email(email);
        if self.users.find_by_email(&email).await?.is_some() {
            return Ok(None);
        }

        let password_hash = self.hash_password(password)?;
        match self
            .users
            .create_user(NewUser {
                full_name: full_name.to_string(),
                age: None,
                email,
                phone: None,
                password_hash,
                role,
            })
            .await
        {
            Ok(user) => Ok(Some(user)),
            Err(StoreError::UniqueViolation(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Issue a token pair and store the refresh fingerprint, overwriting
    /// any previously active refresh token
    async fn create_session(&self, user: &User) -> AuthResult<SessionTokens> {
        let access_token = self.codec.issue_access(user)?;
        let issued = self.codec.issue_refresh(user)?;
        self.users
            .store_refresh_hash(user.id, &issued.token_hash)
            .await?;

        Ok(SessionTokens {
            access_token,
            refresh_token: issued.token,
        })
    }

    /// Hash password with Argon2id + pepper
    fn hash_password(&self, password: &str) -> AuthResult<String> {
        let peppered = format!("{}{}", password, self.pepper);
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        Ok(argon2
            .hash_password(peppered.as_bytes(), &salt)
            .map_err(|_| AuthError::HashingFailed)?
            .to_string())
    }

    /// Verify password against hash
    fn verify_password(&self, password: &str, hash: &str) -> AuthResult<()> {
        let peppered = format!("{}{}", password, self.pepper);
        let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
        let argon2 = Argon2::default();

        argon2
            .verify_password(peppered.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredentials)
    }
}

/// Trim and lowercase, applied before every store lookup or write
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_age(age: i32) -> AuthResult<()> {
    if !(5..=120).contains(&age) {
        return Err(AuthError::InvalidInput(
            "Age must be between 5 and 120".to_string(),
        ));
    }
    Ok(())
}

/// Constant-time comparison of two token fingerprints
fn hashes_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryUserRepository;

    fn manager() -> AuthManager {
        let codec = TokenCodec::new(
            "access-secret-for-tests-0123456789ab".to_string(),
            "refresh-secret-for-tests-0123456789a".to_string(),
            900,
            2_592_000,
        );
        AuthManager::new(
            Arc::new(MemoryUserRepository::new()),
            codec,
            "test-pepper-0123".to_string(),
        )
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            full_name: "Alice Example".to_string(),
            age: Some(24),
            email: email.to_string(),
            phone: None,
            password: "sekret1".to_string(),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    // ===== Registration =====

    #[tokio::test]
    async fn register_then_login_yields_same_subject() {
        let manager = manager();
        let (registered, _) = manager
            .register(register_request("alice@example.com"))
            .await
            .unwrap();

        let (logged_in, tokens) = manager
            .login(login_request("alice@example.com", "sekret1"))
            .await
            .unwrap();

        assert_eq!(registered.id, logged_in.id);
        assert_eq!(logged_in.role, Role::Student);
        let user = manager.authenticate(&tokens.access_token).await.unwrap();
        assert_eq!(user.id, registered.id);
    }

    #[tokio::test]
    async fn register_normalizes_email_and_detects_duplicates() {
        let manager = manager();
        manager
            .register(register_request("Alice@Example.COM "))
            .await
            .unwrap();

        let err = manager
            .register(register_request("alice@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));

        // Differently-cased login still finds the account.
        manager
            .login(login_request("  ALICE@example.com", "sekret1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn register_rejects_first_invalid_field() {
        let manager = manager();

        let short_name = RegisterRequest {
            full_name: "Al".to_string(),
            ..register_request("a@example.com")
        };
        assert!(matches!(
            manager.register(short_name).await.unwrap_err(),
            AuthError::InvalidInput(msg) if msg.contains("Full name")
        ));

        let bad_email = register_request("not-an-email");
        assert!(matches!(
            manager.register(bad_email).await.unwrap_err(),
            AuthError::InvalidInput(msg) if msg.contains("email")
        ));

        let short_password = RegisterRequest {
            password: "five5".to_string(),
            ..register_request("b@example.com")
        };
        assert!(matches!(
            manager.register(short_password).await.unwrap_err(),
            AuthError::InvalidInput(msg) if msg.contains("Password")
        ));

        let bad_age = RegisterRequest {
            age: Some(4),
            ..register_request("c@example.com")
        };
        assert!(matches!(
            manager.register(bad_age).await.unwrap_err(),
            AuthError::InvalidInput(msg) if msg.contains("Age")
        ));

        let old = RegisterRequest {
            age: Some(121),
            ..register_request("d@example.com")
        };
        assert!(manager.register(old).await.is_err());
    }

    // ===== Login =====

    #[tokio::test]
    async fn unknown_email_and_wrong_password_are_indistinguishable() {
        let manager = manager();
        manager
            .register(register_request("known@example.com"))
            .await
            .unwrap();

        let unknown = manager
            .login(login_request("unknown@example.com", "sekret1"))
            .await
            .unwrap_err();
        let wrong = manager
            .login(login_request("known@example.com", "wrong-password"))
            .await
            .unwrap_err();

        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(unknown.client_message(), wrong.client_message());
    }

    #[tokio::test]
    async fn blocked_user_cannot_login_even_with_wrong_password() {
        let manager = manager();
        let (user, _) = manager
            .register(register_request("blocked@example.com"))
            .await
            .unwrap();
        manager.set_blocked(user.id, true).await.unwrap();

        // Blocked wins over the password check either way.
        let err = manager
            .login(login_request("blocked@example.com", "wrong-password"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Blocked));

        let err = manager
            .login(login_request("blocked@example.com", "sekret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Blocked));
    }

    #[tokio::test]
    async fn repeated_failures_do_not_lock_the_account() {
        let manager = manager();
        manager
            .register(register_request("persistent@example.com"))
            .await
            .unwrap();

        for _ in 0..5 {
            let err = manager
                .login(login_request("persistent@example.com", "wrong-password"))
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }

        manager
            .login(login_request("persistent@example.com", "sekret1"))
            .await
            .unwrap();
    }

    // ===== Refresh rotation =====

    #[tokio::test]
    async fn refresh_rotates_and_old_token_dies() {
        let manager = manager();
        let (_, tokens) = manager
            .register(register_request("rotate@example.com"))
            .await
            .unwrap();

        let (_, rotated) = manager.refresh(&tokens.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, tokens.refresh_token);

        let replay = manager.refresh(&tokens.refresh_token).await.unwrap_err();
        assert!(matches!(replay, AuthError::InvalidToken));

        // The rotated token is live.
        manager.refresh(&rotated.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn login_overwrites_previous_refresh_token() {
        let manager = manager();
        let (_, first) = manager
            .register(register_request("overwrite@example.com"))
            .await
            .unwrap();
        let (_, second) = manager
            .login(login_request("overwrite@example.com", "sekret1"))
            .await
            .unwrap();

        assert!(matches!(
            manager.refresh(&first.refresh_token).await.unwrap_err(),
            AuthError::InvalidToken
        ));
        manager.refresh(&second.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn refresh_fails_for_blocked_user() {
        let manager = manager();
        let (user, tokens) = manager
            .register(register_request("frozen@example.com"))
            .await
            .unwrap();
        manager.set_blocked(user.id, true).await.unwrap();

        // Refresh reports a plain invalid token, not the blocked state.
        let err = manager.refresh(&tokens.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn garbage_refresh_token_is_rejected() {
        let manager = manager();
        assert!(manager.refresh("not-a-jwt").await.is_err());
    }

    #[tokio::test]
    async fn concurrent_refreshes_have_exactly_one_winner() {
        let manager = manager();
        let (_, tokens) = manager
            .register(register_request("race@example.com"))
            .await
            .unwrap();

        let m1 = manager.clone();
        let m2 = manager.clone();
        let t1 = tokens.refresh_token.clone();
        let t2 = tokens.refresh_token.clone();

        let (a, b) = tokio::join!(
            tokio::spawn(async move { m1.refresh(&t1).await }),
            tokio::spawn(async move { m2.refresh(&t2).await }),
        );
        let results = [a.unwrap(), b.unwrap()];

        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1, "exactly one concurrent refresh must win");
    }

    // ===== Logout and revocation =====

    #[tokio::test]
    async fn logout_invalidates_outstanding_tokens() {
        let manager = manager();
        let (_, tokens) = manager
            .register(register_request("leaver@example.com"))
            .await
            .unwrap();

        // Access token works before logout.
        manager.authenticate(&tokens.access_token).await.unwrap();

        manager.logout(Some(&tokens.refresh_token)).await;

        // Version bump kills the unexpired access token and the refresh.
        let err = manager
            .authenticate(&tokens.access_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
        assert!(manager.refresh(&tokens.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn logout_swallows_garbage_tokens() {
        let manager = manager();
        manager.logout(None).await;
        manager.logout(Some("not-a-jwt")).await;
    }

    // ===== Authorization checks =====

    #[tokio::test]
    async fn blocked_user_fails_authentication_with_valid_token() {
        let manager = manager();
        let (user, tokens) = manager
            .register(register_request("banned@example.com"))
            .await
            .unwrap();

        manager.authenticate(&tokens.access_token).await.unwrap();
        manager.set_blocked(user.id, true).await.unwrap();

        let err = manager
            .authenticate(&tokens.access_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Blocked));

        // Unblocking restores the same token.
        manager.set_blocked(user.id, false).await.unwrap();
        manager.authenticate(&tokens.access_token).await.unwrap();
    }

    #[tokio::test]
    async fn token_for_missing_user_is_rejected() {
        let manager = manager();
        let ghost = User {
            id: 9_999,
            full_name: "Ghost".to_string(),
            age: None,
            email: "ghost@example.com".to_string(),
            phone: None,
            password_hash: String::new(),
            role: Role::Student,
            blocked: false,
            refresh_token_hash: None,
            token_version: 0,
            created_at: chrono::Utc::now(),
        };
        let token = manager.codec().issue_access(&ghost).unwrap();

        let err = manager.authenticate(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    // ===== Admin operations =====

    #[tokio::test]
    async fn role_changes_guard_the_admin_role() {
        let manager = manager();
        let admin = manager
            .ensure_user("Admin", "admin@example.com", "sekret1", Role::Admin)
            .await
            .unwrap()
            .unwrap();
        let (student, _) = manager
            .register(register_request("student@example.com"))
            .await
            .unwrap();

        let promoted = manager.set_role(student.id, Role::Teacher).await.unwrap();
        assert_eq!(promoted.role, Role::Teacher);

        assert!(matches!(
            manager.set_role(student.id, Role::Admin).await.unwrap_err(),
            AuthError::InvalidInput(_)
        ));
        assert!(matches!(
            manager.set_role(admin.id, Role::Student).await.unwrap_err(),
            AuthError::InvalidInput(_)
        ));
        assert!(matches!(
            manager.set_blocked(admin.id, true).await.unwrap_err(),
            AuthError::InvalidInput(_)
        ));
        assert!(matches!(
            manager.set_role(777, Role::Teacher).await.unwrap_err(),
            AuthError::UserNotFound
        ));
    }

    #[tokio::test]
    async fn ensure_user_is_idempotent() {
        let manager = manager();
        let created = manager
            .ensure_user("Admin", "root@example.com", "sekret1", Role::Admin)
            .await
            .unwrap();
        assert!(created.is_some());

        let again = manager
            .ensure_user("Admin", "root@example.com", "other-password", Role::Admin)
            .await
            .unwrap();
        assert!(again.is_none());
    }

    // ===== Profile updates =====

    #[tokio::test]
    async fn profile_update_validates_and_clears_phone() {
        let manager = manager();
        let (user, _) = manager
            .register(RegisterRequest {
                phone: Some("+1 555 0100".to_string()),
                ..register_request("profile@example.com")
            })
            .await
            .unwrap();

        let err = manager
            .update_profile(
                user.id,
                UpdateProfileRequest {
                    full_name: Some("X".to_string()),
                    ..UpdateProfileRequest::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidInput(_)));

        let updated = manager
            .update_profile(
                user.id,
                UpdateProfileRequest {
                    full_name: Some("Alice Updated".to_string()),
                    age: Some(30),
                    phone: Some("  ".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.full_name, "Alice Updated");
        assert_eq!(updated.age, Some(30));
        assert!(updated.phone.is_none());
    }
}
