use crate::config::AuthConfig;
use crate::domain::auth::{self, Claims, MAX_ACCESS_TOKEN_TTL_MINUTES, MAX_REFRESH_TOKEN_TTL_DAYS};
use crate::domain::auth_session::{AuthSession, RefreshOutcome, TokenStatus, UserSummary};
use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::services::refresh_token_store::RefreshTokenStore;
use crate::services::role_resolver::RoleResolver;
use crate::services::token_codec::{IssuedAccessToken, TokenCodec, TokenError};
use crate::services::user_directory::UserDirectory;
use opentelemetry::{global, metrics::Counter};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Clone, Debug)]
struct Metrics {
    login_total: Counter<u64>,
    refresh_total: Counter<u64>,
    refresh_rejected_total: Counter<u64>,
    revoke_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("gatehouse-server");
        Self {
            login_total: meter
                .u64_counter("auth_login_total")
                .with_description("Total number of successful login attempts")
                .build(),
            refresh_total: meter
                .u64_counter("auth_refresh_total")
                .with_description("Total number of successful token rotations")
                .build(),
            refresh_rejected_total: meter
                .u64_counter("auth_refresh_rejected_total")
                .with_description("Total number of rejected token rotations")
                .build(),
            revoke_total: meter
                .u64_counter("auth_revoke_total")
                .with_description("Total number of refresh tokens revoked")
                .build(),
        }
    }
}

/// Why a refresh was turned down. Only ever logged; callers see [`RefreshOutcome::Invalid`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshRejection {
    #[error("access token is malformed")]
    MalformedAccessToken,
    #[error("access token lacks a usable subject or jti")]
    MissingClaims,
    #[error("refresh token not found")]
    NotFound,
    #[error("refresh token is used, revoked or expired")]
    NotActive,
    #[error("refresh token was issued with a different access token")]
    Mismatch,
    #[error("user no longer exists")]
    UnknownUser,
    #[error("refresh token was consumed concurrently")]
    LostRace,
}

#[derive(Clone, Debug)]
pub struct AuthService {
    config: AuthConfig,
    codec: TokenCodec,
    users: Arc<dyn UserDirectory>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    roles: RoleResolver,
    metrics: Metrics,
}

impl AuthService {
    /// # Errors
    /// Returns `AppError::Configuration` if the signing secret is missing or a token
    /// lifetime is not positive or exceeds its upper bound.
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserDirectory>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
    ) -> Result<Self> {
        check_ttl("access token TTL (minutes)", config.access_token_ttl_minutes, MAX_ACCESS_TOKEN_TTL_MINUTES)?;
        check_ttl("refresh token TTL (days)", config.refresh_token_ttl_days, MAX_REFRESH_TOKEN_TTL_DAYS)?;

        let codec = TokenCodec::new(&config)?;
        let roles = RoleResolver::new(Arc::clone(&users), &config.admin_role);
        Ok(Self { config, codec, users, refresh_tokens, roles, metrics: Metrics::new() })
    }

    /// Verifies credentials and issues a session.
    ///
    /// # Errors
    /// Returns `AppError::AuthError` for an unknown user or a wrong password, and
    /// `AppError::Database` if issuance could not be persisted.
    #[tracing::instrument(skip(self, username, password), fields(user_id = tracing::field::Empty), err(level = "warn"))]
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthSession> {
        let Some(user) = self.users.find_by_username(username).await? else {
            tracing::warn!("Login failed: user not found");
            return Err(AppError::AuthError);
        };

        tracing::Span::current().record("user_id", user.id);

        if !self.verify_password(password, &user.password_hash).await? {
            tracing::warn!("Login failed: invalid password");
            return Err(AppError::AuthError);
        }

        let session = self.issue(&user).await?;
        self.metrics.login_total.add(1, &[]);
        Ok(session)
    }

    /// Issues an access token and the refresh token bound to its `jti`.
    ///
    /// # Errors
    /// Returns `AppError::Database` if roles cannot be loaded or the refresh token cannot be
    /// stored. No token is handed out in that case, so the caller may retry.
    #[tracing::instrument(err, skip(self, user), fields(user_id = user.id))]
    pub async fn issue(&self, user: &User) -> Result<AuthSession> {
        let (access, roles) = self.sign_access_token(user).await?;
        let refresh = self.refresh_tokens.create(user.id, &access.jti, self.config.refresh_token_ttl_days).await?;

        Ok(self.session(user, roles, access, refresh.token))
    }

    /// Exchanges a refresh token and the (possibly expired) access token it was issued
    /// with for a new pair. The presented refresh token can never be used again.
    ///
    /// # Errors
    /// Only persistence failures are errors. Every rejection is [`RefreshOutcome::Invalid`].
    #[tracing::instrument(err, skip(self, access_token, refresh_token), fields(user_id = tracing::field::Empty))]
    pub async fn refresh(&self, access_token: &str, refresh_token: &str) -> Result<RefreshOutcome> {
        match self.try_refresh(access_token, refresh_token).await? {
            Ok(session) => {
                tracing::info!("Tokens rotated successfully");
                self.metrics.refresh_total.add(1, &[]);
                Ok(RefreshOutcome::Renewed(session))
            }
            Err(reason) => {
                tracing::debug!(reason = %reason, "Refresh rejected");
                self.metrics.refresh_rejected_total.add(1, &[]);
                Ok(RefreshOutcome::Invalid)
            }
        }
    }

    async fn try_refresh(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<std::result::Result<AuthSession, RefreshRejection>> {
        let Ok(claims) = TokenCodec::parse(access_token) else {
            return Ok(Err(RefreshRejection::MalformedAccessToken));
        };
        let (Some(jwt_id), Some(user_id)) = (claims.jwt_id(), claims.user_id()) else {
            return Ok(Err(RefreshRejection::MissingClaims));
        };

        tracing::Span::current().record("user_id", user_id);

        let Some(stored) = self.refresh_tokens.find_by_token(refresh_token).await? else {
            return Ok(Err(RefreshRejection::NotFound));
        };
        if !stored.is_active() {
            return Ok(Err(RefreshRejection::NotActive));
        }
        if stored.jwt_id != jwt_id || stored.user_id != user_id {
            return Ok(Err(RefreshRejection::Mismatch));
        }

        let Some(user) = self.users.find_by_id(user_id).await? else {
            return Ok(Err(RefreshRejection::UnknownUser));
        };

        let (access, roles) = self.sign_access_token(&user).await?;
        let Some(next) = self.refresh_tokens.rotate(stored.id, &access.jti, self.config.refresh_token_ttl_days).await?
        else {
            return Ok(Err(RefreshRejection::LostRace));
        };

        Ok(Ok(self.session(&user, roles, access, next.token)))
    }

    /// Reports whether `token` is currently valid. A token whose only defect is expiry
    /// still reports who it belonged to, with no time remaining.
    #[must_use]
    pub fn validate(&self, token: &str) -> TokenStatus {
        match self.codec.validate(token) {
            Ok(claims) => {
                let remaining_seconds = (claims.exp - OffsetDateTime::now_utc().unix_timestamp()).max(0);
                TokenStatus {
                    valid: true,
                    user_id: claims.user_id(),
                    username: Some(claims.unique_name),
                    remaining_seconds,
                }
            }
            Err(TokenError::Expired) => match self.codec.verify_ignoring_expiry(token) {
                Ok(claims) => TokenStatus {
                    valid: false,
                    user_id: claims.user_id(),
                    username: Some(claims.unique_name),
                    remaining_seconds: 0,
                },
                Err(e) => {
                    tracing::debug!(error = %e, "Expired token failed verification");
                    TokenStatus::invalid()
                }
            },
            Err(e) => {
                tracing::debug!(error = %e, "Token validation failed");
                TokenStatus::invalid()
            }
        }
    }

    /// Verifies a bearer access token and returns its claims.
    ///
    /// # Errors
    /// Returns `AppError::AuthError` if the token fails any check.
    pub fn authenticate(&self, token: &str) -> Result<Claims> {
        self.codec.validate(token).map_err(|e| {
            tracing::debug!(error = %e, "Bearer token rejected");
            AppError::AuthError
        })
    }

    /// Revokes every active refresh token of the user. Returns `false` instead of failing
    /// when the store is unavailable.
    #[tracing::instrument(skip(self))]
    pub async fn revoke_all(&self, user_id: i64) -> bool {
        match self.refresh_tokens.revoke_all_active(user_id).await {
            Ok(revoked) => {
                tracing::info!(revoked, "Refresh tokens revoked");
                self.metrics.revoke_total.add(revoked, &[]);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to revoke refresh tokens");
                false
            }
        }
    }

    async fn sign_access_token(&self, user: &User) -> Result<(IssuedAccessToken, BTreeSet<String>)> {
        let roles = self.roles.resolve(user).await?;
        let access = self.codec.issue(user.id, &user.username, &user.email, &roles, self.config.access_token_ttl_minutes)?;
        Ok((access, roles))
    }

    async fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool> {
        let password = password.to_string();
        let password_hash = password_hash.to_string();
        tokio::task::spawn_blocking(move || auth::verify_password(&password, &password_hash))
            .await
            .map_err(|_| AppError::Internal)?
    }

    fn session(&self, user: &User, roles: BTreeSet<String>, access: IssuedAccessToken, refresh_token: String) -> AuthSession {
        let redirect_to = if self.roles.is_privileged(&roles) {
            self.config.admin_redirect.clone()
        } else {
            self.config.default_redirect.clone()
        };

        AuthSession {
            token: access.token,
            refresh_token,
            expires_at: access.expires_at,
            user: UserSummary {
                id: user.id,
                username: user.username.clone(),
                email: user.email.clone(),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                roles,
            },
            redirect_to,
        }
    }
}

fn check_ttl(name: &str, value: i64, max: i64) -> Result<()> {
    if (1..=max).contains(&value) {
        Ok(())
    } else {
        Err(AppError::Configuration(format!("{name} must be between 1 and {max}, got {value}")))
    }
}
