use std::collections::BTreeSet;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub refresh_token: String,
    pub expires_at: OffsetDateTime,
    pub user: UserSummary,
    pub redirect_to: String,
}

/// Result of a token-refresh attempt. Rejections carry no reason.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Renewed(AuthSession),
    Invalid,
}

/// Session check result for a presented access token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenStatus {
    pub valid: bool,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub remaining_seconds: i64,
}

impl TokenStatus {
    #[must_use]
    pub fn invalid() -> Self {
        Self::default()
    }
}
