use crate::domain::auth::{IssuedRefreshToken, RefreshToken, expiry_after_days, generate_opaque_token, hash_token};
use crate::error::{AppError, Result};
use crate::services::refresh_token_store::RefreshTokenStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use time::OffsetDateTime;

#[derive(Debug, Default)]
struct Tokens {
    next_id: i64,
    by_id: HashMap<i64, RefreshToken>,
    id_by_hash: HashMap<String, i64>,
}

impl Tokens {
    fn insert(
        &mut self,
        user_id: i64,
        jwt_id: &str,
        added_date: OffsetDateTime,
        expiry_date: OffsetDateTime,
    ) -> IssuedRefreshToken {
        let token = generate_opaque_token();
        self.next_id += 1;

        let record = RefreshToken {
            id: self.next_id,
            token_hash: hash_token(&token),
            user_id,
            jwt_id: jwt_id.to_string(),
            is_used: false,
            is_revoked: false,
            added_date,
            expiry_date,
        };

        self.id_by_hash.insert(record.token_hash.clone(), record.id);
        self.by_id.insert(record.id, record.clone());
        IssuedRefreshToken { token, record }
    }

    fn mark_used(&mut self, id: i64) -> Option<i64> {
        let now = OffsetDateTime::now_utc();
        let record = self.by_id.get_mut(&id).filter(|record| record.is_active_at(now))?;
        record.is_used = true;
        Some(record.user_id)
    }
}

fn lifetime(ttl_days: i64) -> Result<(OffsetDateTime, OffsetDateTime)> {
    let added_date = OffsetDateTime::now_utc();
    let expiry_date = expiry_after_days(added_date, ttl_days).ok_or_else(|| {
        tracing::error!(ttl_days, "Refresh token expiry is out of range");
        AppError::Internal
    })?;
    Ok((added_date, expiry_date))
}

#[derive(Debug, Default)]
pub struct MemoryRefreshTokenStore {
    inner: Mutex<Tokens>,
}

impl MemoryRefreshTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record owned by `user_id`, in insertion order.
    #[must_use]
    pub fn records_for(&self, user_id: i64) -> Vec<RefreshToken> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut records: Vec<_> = inner.by_id.values().filter(|record| record.user_id == user_id).cloned().collect();
        records.sort_by_key(|record| record.id);
        records
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn create(&self, user_id: i64, jwt_id: &str, ttl_days: i64) -> Result<IssuedRefreshToken> {
        let (added_date, expiry_date) = lifetime(ttl_days)?;
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.insert(user_id, jwt_id, added_date, expiry_date))
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.id_by_hash.get(&hash_token(token)).and_then(|id| inner.by_id.get(id)).cloned())
    }

    async fn mark_used(&self, id: i64) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.mark_used(id).is_some())
    }

    async fn rotate(&self, id: i64, jwt_id: &str, ttl_days: i64) -> Result<Option<IssuedRefreshToken>> {
        let (added_date, expiry_date) = lifetime(ttl_days)?;
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.mark_used(id).map(|user_id| inner.insert(user_id, jwt_id, added_date, expiry_date)))
    }

    async fn revoke_all_active(&self, user_id: i64) -> Result<u64> {
        let now = OffsetDateTime::now_utc();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut revoked = 0;
        for record in inner.by_id.values_mut().filter(|record| record.user_id == user_id && record.is_active_at(now)) {
            record.is_revoked = true;
            revoked += 1;
        }
        Ok(revoked)
    }
}
