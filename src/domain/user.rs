use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    /// Role names, when the loader already joined them.
    pub roles: Option<BTreeSet<String>>,
}
