use crate::domain::auth::{IssuedRefreshToken, RefreshToken};
use crate::error::Result;
use async_trait::async_trait;

/// Persistence for refresh tokens.
///
/// Implementations generate the raw token value, store only its hash, and must make
/// [`RefreshTokenStore::mark_used`] and [`RefreshTokenStore::rotate`] behave as
/// compare-and-swap operations: of any number of concurrent calls on the same active
/// row, exactly one wins.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync + std::fmt::Debug {
    /// Persists a new active token for `user_id`, bound to the access token `jwt_id`.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the write fails.
    async fn create(&self, user_id: i64, jwt_id: &str, ttl_days: i64) -> Result<IssuedRefreshToken>;

    /// Looks up a token by its raw value.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the read fails.
    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshToken>>;

    /// Moves an active token to used. Returns `false`, changing nothing, if the row was
    /// not active at the time of the update.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    async fn mark_used(&self, id: i64) -> Result<bool>;

    /// Marks `id` used and persists its successor for the same user in one unit of work.
    /// Returns `None` if `id` was no longer active, in which case nothing is written.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the transaction fails.
    async fn rotate(&self, id: i64, jwt_id: &str, ttl_days: i64) -> Result<Option<IssuedRefreshToken>>;

    /// Revokes every active token owned by `user_id` and returns how many changed.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    async fn revoke_all_active(&self, user_id: i64) -> Result<u64>;
}
