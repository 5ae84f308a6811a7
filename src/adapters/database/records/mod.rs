pub(crate) mod auth;
pub(crate) mod user;

pub(crate) use auth::RefreshTokenRecord;
pub(crate) use user::UserRecord;
