use crate::error::{AppError, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

/// Number of random bytes behind every refresh token value.
pub const REFRESH_TOKEN_BYTES: usize = 64;

/// Upper bound accepted for the access token lifetime.
pub const MAX_ACCESS_TOKEN_TTL_MINUTES: i64 = 60 * 24 * 30;

/// Upper bound accepted for the refresh token lifetime.
pub const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = 3650;

const SECONDS_PER_DAY: i64 = 86_400;

/// Access token payload.
///
/// Every field defaults when absent so that a structurally valid token with missing
/// claims still parses; callers that need a claim check for it explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Claims {
    pub sub: String,
    pub unique_name: String,
    pub email: String,
    pub jti: String,
    #[serde(rename = "role")]
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// The subject as a user id, if it is one.
    #[must_use]
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }

    #[must_use]
    pub fn jwt_id(&self) -> Option<&str> {
        (!self.jti.is_empty()).then_some(self.jti.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub id: i64,
    pub token_hash: String,
    pub user_id: i64,
    pub jwt_id: String,
    pub is_used: bool,
    pub is_revoked: bool,
    pub added_date: OffsetDateTime,
    pub expiry_date: OffsetDateTime,
}

impl RefreshToken {
    /// Not used, not revoked, and not past its expiry at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: OffsetDateTime) -> bool {
        !self.is_used && !self.is_revoked && now <= self.expiry_date
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active_at(OffsetDateTime::now_utc())
    }
}

/// A freshly persisted refresh token together with the raw value handed to the client.
/// The raw value exists only here; storage keeps its hash.
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub record: RefreshToken,
}

/// `ttl_days` after `added_date`, or `None` when the result is not representable.
#[must_use]
pub fn expiry_after_days(added_date: OffsetDateTime, ttl_days: i64) -> Option<OffsetDateTime> {
    ttl_days.checked_mul(SECONDS_PER_DAY).and_then(|secs| added_date.checked_add(time::Duration::seconds(secs)))
}

/// Generates a cryptographically secure random string (64 bytes -> Base64).
#[must_use]
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Hashes a token using SHA-256 for secure storage.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// # Errors
/// Returns `AppError::Internal` if hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash =
        Argon2::default().hash_password(password.as_bytes(), &salt).map_err(|_| AppError::Internal)?.to_string();
    Ok(password_hash)
}

/// # Errors
/// Returns `AppError::Internal` if the stored hash is not a valid PHC string.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash).map_err(|_| AppError::Internal)?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok())
}
