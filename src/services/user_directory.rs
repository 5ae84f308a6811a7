use crate::domain::user::User;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Read access to users and their role assignments.
#[async_trait]
pub trait UserDirectory: Send + Sync + std::fmt::Debug {
    /// Finds an active user by id. Roles are not materialized.
    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>>;

    /// Finds an active user by username. Roles are not materialized.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Names of the roles behind the user's active assignments.
    async fn fetch_active_roles(&self, user_id: i64) -> Result<BTreeSet<String>>;
}
