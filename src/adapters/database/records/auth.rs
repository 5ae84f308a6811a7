use crate::domain::auth::RefreshToken;
use time::OffsetDateTime;

#[derive(sqlx::FromRow)]
pub(crate) struct RefreshTokenRecord {
    pub(crate) id: i64,
    pub(crate) token_hash: String,
    pub(crate) user_id: i64,
    pub(crate) jwt_id: String,
    pub(crate) is_used: bool,
    pub(crate) is_revoked: bool,
    pub(crate) added_date: OffsetDateTime,
    pub(crate) expiry_date: OffsetDateTime,
}

impl From<RefreshTokenRecord> for RefreshToken {
    fn from(record: RefreshTokenRecord) -> Self {
        Self {
            id: record.id,
            token_hash: record.token_hash,
            user_id: record.user_id,
            jwt_id: record.jwt_id,
            is_used: record.is_used,
            is_revoked: record.is_revoked,
            added_date: record.added_date,
            expiry_date: record.expiry_date,
        }
    }
}
