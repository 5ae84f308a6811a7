use crate::adapters::database::DbPool;
use crate::adapters::database::records::RefreshTokenRecord;
use crate::domain::auth::{IssuedRefreshToken, RefreshToken, expiry_after_days, generate_opaque_token, hash_token};
use crate::error::{AppError, Result};
use crate::services::refresh_token_store::RefreshTokenStore;
use async_trait::async_trait;
use sqlx::PgConnection;
use time::OffsetDateTime;

const RETURNING: &str = "id, token_hash, user_id, jwt_id, is_used, is_revoked, added_date, expiry_date";

#[derive(Clone, Debug)]
pub struct PgRefreshTokenStore {
    pool: DbPool,
}

impl PgRefreshTokenStore {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Inserts a new refresh token record.
    /// Note: We store the HASH, not the raw token.
    async fn insert(conn: &mut PgConnection, user_id: i64, jwt_id: &str, ttl_days: i64) -> Result<IssuedRefreshToken> {
        let token = generate_opaque_token();
        let added_date = OffsetDateTime::now_utc();
        let expiry_date = expiry_after_days(added_date, ttl_days).ok_or_else(|| {
            tracing::error!(ttl_days, "Refresh token expiry is out of range");
            AppError::Internal
        })?;

        let record = sqlx::query_as::<_, RefreshTokenRecord>(&format!(
            r"
            INSERT INTO refresh_tokens (token_hash, user_id, jwt_id, is_used, is_revoked, added_date, expiry_date)
            VALUES ($1, $2, $3, FALSE, FALSE, $4, $5)
            RETURNING {RETURNING}
            "
        ))
        .bind(hash_token(&token))
        .bind(user_id)
        .bind(jwt_id)
        .bind(added_date)
        .bind(expiry_date)
        .fetch_one(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(IssuedRefreshToken { token, record: record.into() })
    }

    /// Flips `is_used` only while the row is still active, returning the owner when this
    /// call won the update.
    async fn consume(conn: &mut PgConnection, id: i64) -> Result<Option<i64>> {
        let user_id = sqlx::query_scalar::<_, i64>(
            r"
            UPDATE refresh_tokens
            SET is_used = TRUE
            WHERE id = $1 AND is_used = FALSE AND is_revoked = FALSE AND expiry_date >= $2
            RETURNING user_id
            ",
        )
        .bind(id)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(user_id)
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    #[tracing::instrument(level = "debug", skip(self, jwt_id), err)]
    async fn create(&self, user_id: i64, jwt_id: &str, ttl_days: i64) -> Result<IssuedRefreshToken> {
        let mut conn = self.pool.acquire().await?;
        Self::insert(&mut conn, user_id, jwt_id, ttl_days).await
    }

    #[tracing::instrument(level = "debug", skip(self, token), err)]
    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(&format!(
            "SELECT {RETURNING} FROM refresh_tokens WHERE token_hash = $1"
        ))
        .bind(hash_token(token))
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn mark_used(&self, id: i64) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Ok(Self::consume(&mut conn, id).await?.is_some())
    }

    /// The conditional update and the successor insert share one transaction, so a lost
    /// race rolls back without writing anything.
    #[tracing::instrument(level = "debug", skip(self, jwt_id), err)]
    async fn rotate(&self, id: i64, jwt_id: &str, ttl_days: i64) -> Result<Option<IssuedRefreshToken>> {
        let mut tx = self.pool.begin().await?;

        let Some(user_id) = Self::consume(&mut tx, id).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        let issued = Self::insert(&mut tx, user_id, jwt_id, ttl_days).await?;
        tx.commit().await?;

        Ok(Some(issued))
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn revoke_all_active(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query(
            r"
            UPDATE refresh_tokens
            SET is_revoked = TRUE
            WHERE user_id = $1 AND is_used = FALSE AND is_revoked = FALSE AND expiry_date >= $2
            ",
        )
        .bind(user_id)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }
}
