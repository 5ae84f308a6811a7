use crate::domain::user::User;
use crate::error::Result;
use crate::services::user_directory::UserDirectory;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct RoleResolver {
    directory: Arc<dyn UserDirectory>,
    admin_role: String,
}

impl RoleResolver {
    #[must_use]
    pub fn new(directory: Arc<dyn UserDirectory>, admin_role: &str) -> Self {
        Self { directory, admin_role: admin_role.to_lowercase() }
    }

    /// Role names of the user's active assignments, taken from `user` when already
    /// materialized and fetched from the directory otherwise.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the directory lookup fails.
    #[tracing::instrument(level = "debug", skip(self, user), fields(user_id = user.id), err)]
    pub async fn resolve(&self, user: &User) -> Result<BTreeSet<String>> {
        match &user.roles {
            Some(roles) => Ok(roles.clone()),
            None => self.directory.fetch_active_roles(user.id).await,
        }
    }

    #[must_use]
    pub fn is_privileged(&self, roles: &BTreeSet<String>) -> bool {
        roles.iter().any(|role| role.to_lowercase() == self.admin_role)
    }
}
