//! JWT codec for access and refresh tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{
    errors::AuthResult,
    models::{AccessClaims, RefreshClaims, User},
};

/// A freshly minted refresh token together with its stored fingerprint.
/// Only the hash is persisted; the token itself goes straight to the client.
#[derive(Debug, Clone)]
pub struct IssuedRefresh {
    pub token: String,
    pub token_hash: String,
}

/// Stateless mint/verify for the two token kinds.
///
/// Access and refresh tokens are signed with distinct secrets, so a token of
/// one kind never verifies as the other. The codec does no I/O; persistence
/// and revocation checks live in [`super::AuthManager`].
#[derive(Clone)]
pub struct TokenCodec {
    access_secret: String,
    refresh_secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    /// Create a codec with explicit token lifetimes.
    ///
    /// # Arguments
    ///
    /// * `access_secret` - Signing key for access tokens
    /// * `refresh_secret` - Signing key for refresh tokens
    /// * `access_ttl_secs` - Access token lifetime in seconds
    /// * `refresh_ttl_secs` - Refresh token lifetime in seconds
    pub fn new(
        access_secret: String,
        refresh_secret: String,
        access_ttl_secs: i64,
        refresh_ttl_secs: i64,
    ) -> Self {
        Self {
            access_secret,
            refresh_secret,
            access_ttl: Duration::seconds(access_ttl_secs),
            refresh_ttl: Duration::seconds(refresh_ttl_secs),
        }
    }

    /// Access token lifetime in seconds, for cookie max-age alignment
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    /// Refresh token lifetime in seconds
    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl.num_seconds()
    }

    /// Mint an access token for a user
    pub fn issue_access(&self, user: &User) -> AuthResult<String> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user.id,
            role: user.role,
            tv: user.token_version,
            exp: (now + self.access_ttl).timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.access_secret.as_bytes()),
        )?;

        Ok(token)
    }

    /// Mint a refresh token for a user
    ///
    /// # Returns
    ///
    /// * `AuthResult<IssuedRefresh>` - Token plus the sha256 fingerprint to store
    pub fn issue_refresh(&self, user: &User) -> AuthResult<IssuedRefresh> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: user.id,
            tv: user.token_version,
            jti: Uuid::new_v4().to_string(),
            exp: (now + self.refresh_ttl).timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.refresh_secret.as_bytes()),
        )?;
        let token_hash = Self::fingerprint(&token);

        Ok(IssuedRefresh { token, token_hash })
    }

    /// Verify an access token signature and expiry
    pub fn verify_access(&self, token: &str) -> AuthResult<AccessClaims> {
        let token_data = decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(self.access_secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }

    /// Verify a refresh token signature and expiry
    pub fn verify_refresh(&self, token: &str) -> AuthResult<RefreshClaims> {
        let token_data = decode::<RefreshClaims>(
            token,
            &DecodingKey::from_secret(self.refresh_secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }

    /// Sha256 hex fingerprint of a token, the only form the server stores
    pub fn fingerprint(token: &str) -> String {
        hex::encode(Sha256::digest(token.as_bytes()))
    }
}
