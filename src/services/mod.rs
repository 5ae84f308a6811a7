pub mod auth_service;
pub mod refresh_token_store;
pub mod role_resolver;
pub mod token_codec;
pub mod user_directory;
