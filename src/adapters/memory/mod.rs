//! In-process adapters. They back the black-box tests and local runs without Postgres,
//! and keep the same compare-and-swap guarantees as the database adapters by doing every
//! state transition under one lock.

pub mod refresh_token_repo;
pub mod user_repo;
