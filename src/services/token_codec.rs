use crate::config::AuthConfig;
use crate::domain::auth::Claims;
use crate::error::{AppError, Result};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, dangerous::insecure_decode, decode, encode, errors::ErrorKind,
};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token issuer is invalid")]
    InvalidIssuer,
    #[error("token audience is invalid")]
    InvalidAudience,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => Self::InvalidSignature,
            ErrorKind::InvalidIssuer => Self::InvalidIssuer,
            ErrorKind::InvalidAudience => Self::InvalidAudience,
            ErrorKind::MissingRequiredClaim(claim) if claim == "iss" => Self::InvalidIssuer,
            ErrorKind::MissingRequiredClaim(claim) if claim == "aud" => Self::InvalidAudience,
            _ => Self::Malformed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    pub token: String,
    pub jti: String,
    pub expires_at: OffsetDateTime,
}

/// Signs and checks HS256 access tokens.
#[derive(Clone)]
pub struct TokenCodec {
    issuer: Option<String>,
    audience: Option<String>,
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Arc<Validation>,
    expiry_exempt: Arc<Validation>,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// # Errors
    /// Returns `AppError::Configuration` if the signing secret is empty.
    pub fn new(config: &AuthConfig) -> Result<Self> {
        if config.jwt_secret.trim().is_empty() {
            return Err(AppError::Configuration("JWT secret is not configured".to_string()));
        }
        if config.jwt_secret.len() < 32 {
            tracing::warn!("JWT secret is shorter than recommended (32 bytes)");
        }

        let issuer = config.jwt_issuer.clone().filter(|s| !s.is_empty());
        let audience = config.jwt_audience.clone().filter(|s| !s.is_empty());

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        if let Some(issuer) = &issuer {
            validation.set_issuer(&[issuer]);
        }
        match &audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let mut expiry_exempt = validation.clone();
        expiry_exempt.validate_exp = false;

        Ok(Self {
            encoding_key: Arc::new(EncodingKey::from_secret(config.jwt_secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(config.jwt_secret.as_bytes())),
            issuer,
            audience,
            validation: Arc::new(validation),
            expiry_exempt: Arc::new(expiry_exempt),
        })
    }

    /// Issues an access token with a fresh `jti` and one `role` entry per role name.
    ///
    /// # Errors
    /// Returns `AppError::Internal` if signing fails.
    pub fn issue(
        &self,
        user_id: i64,
        username: &str,
        email: &str,
        roles: &BTreeSet<String>,
        ttl_minutes: i64,
    ) -> Result<IssuedAccessToken> {
        let iat = OffsetDateTime::now_utc().unix_timestamp();
        let exp = ttl_minutes.checked_mul(60).and_then(|secs| iat.checked_add(secs)).ok_or_else(|| {
            tracing::error!(ttl_minutes, "Access token expiry overflows");
            AppError::Internal
        })?;
        let expires_at = OffsetDateTime::from_unix_timestamp(exp).map_err(|_| AppError::Internal)?;
        let jti = Uuid::new_v4().to_string();

        let claims = Claims {
            sub: user_id.to_string(),
            unique_name: username.to_string(),
            email: email.to_string(),
            jti: jti.clone(),
            roles: roles.iter().cloned().collect(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat,
            exp,
        };

        let token = self.encode(&claims)?;
        Ok(IssuedAccessToken { token, jti, expires_at })
    }

    /// Decodes the payload without checking signature, issuer, audience or expiry.
    ///
    /// # Errors
    /// Returns `TokenError::Malformed` if the string is not a decodable token.
    pub fn parse(token: &str) -> std::result::Result<Claims, TokenError> {
        insecure_decode::<Claims>(token).map(|data| data.claims).map_err(|_| TokenError::Malformed)
    }

    /// Checks signature, issuer, audience and expiry with no clock-skew allowance.
    ///
    /// # Errors
    /// Returns the first check that failed.
    pub fn validate(&self, token: &str) -> std::result::Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation).map(|data| data.claims).map_err(TokenError::from)
    }

    /// Same as [`Self::validate`] with the expiry check turned off.
    ///
    /// # Errors
    /// Returns the first non-expiry check that failed.
    pub fn verify_ignoring_expiry(&self, token: &str) -> std::result::Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.expiry_exempt)
            .map(|data| data.claims)
            .map_err(TokenError::from)
    }

    pub(crate) fn encode(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(ALGORITHM), claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = %e, "Failed to sign access token");
            AppError::Internal
        })
    }
}
