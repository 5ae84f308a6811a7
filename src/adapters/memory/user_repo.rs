use crate::domain::user::User;
use crate::error::Result;
use crate::services::user_directory::UserDirectory;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
struct Directory {
    users: HashMap<i64, User>,
    assignments: HashMap<i64, Vec<(String, bool)>>,
}

#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    inner: Mutex<Directory>,
}

impl MemoryUserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.users.insert(user.id, user);
    }

    pub fn remove_user(&self, user_id: i64) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.users.remove(&user_id);
    }

    pub fn assign_role(&self, user_id: i64, role: &str, is_active: bool) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.assignments.entry(user_id).or_default().push((role.to_string(), is_active));
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.users.get(&user_id).map(|user| User { roles: None, ..user.clone() }))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.users.values().find(|user| user.username == username).map(|user| User { roles: None, ..user.clone() }))
    }

    async fn fetch_active_roles(&self, user_id: i64) -> Result<BTreeSet<String>> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(inner
            .assignments
            .get(&user_id)
            .map(|assignments| {
                assignments.iter().filter(|(_, is_active)| *is_active).map(|(role, _)| role.clone()).collect()
            })
            .unwrap_or_default())
    }
}
