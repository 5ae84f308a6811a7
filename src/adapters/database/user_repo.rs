use crate::adapters::database::DbPool;
use crate::adapters::database::records::UserRecord;
use crate::domain::user::User;
use crate::error::Result;
use crate::services::user_directory::UserDirectory;
use async_trait::async_trait;
use std::collections::BTreeSet;

#[derive(Clone, Debug)]
pub struct PgUserDirectory {
    pool: DbPool,
}

impl PgUserDirectory {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, UserRecord>(
            r"
            SELECT id, username, email, first_name, last_name, password_hash
            FROM users
            WHERE id = $1 AND is_active = TRUE
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self, username), err)]
    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, UserRecord>(
            r"
            SELECT id, username, email, first_name, last_name, password_hash
            FROM users
            WHERE username = $1 AND is_active = TRUE
            ",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn fetch_active_roles(&self, user_id: i64) -> Result<BTreeSet<String>> {
        let roles = sqlx::query_scalar::<_, String>(
            r"
            SELECT r.name
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = $1 AND ur.is_active = TRUE AND r.is_active = TRUE
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(roles.into_iter().collect())
    }
}
