#![allow(clippy::unwrap_used, unreachable_pub)]
mod common;

use gatehouse_server::adapters::database::DbPool;
use gatehouse_server::adapters::database::refresh_token_repo::PgRefreshTokenStore;
use gatehouse_server::adapters::database::user_repo::PgUserDirectory;
use gatehouse_server::domain::auth::hash_token;
use gatehouse_server::services::refresh_token_store::RefreshTokenStore;
use gatehouse_server::services::user_directory::UserDirectory;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

async fn create_user(pool: &DbPool, is_active: bool) -> (i64, String) {
    let username = format!("user_{}", Uuid::new_v4().simple());
    let id = sqlx::query_scalar::<_, i64>(
        r"
        INSERT INTO users (username, email, first_name, last_name, password_hash, is_active)
        VALUES ($1, $2, 'Test', 'User', 'unused', $3)
        RETURNING id
        ",
    )
    .bind(&username)
    .bind(format!("{username}@example.com"))
    .bind(is_active)
    .fetch_one(pool)
    .await
    .unwrap();

    (id, username)
}

async fn assign_role(pool: &DbPool, user_id: i64, role_active: bool, assignment_active: bool) -> String {
    let name = format!("role_{}", Uuid::new_v4().simple());
    let role_id = sqlx::query_scalar::<_, i64>("INSERT INTO roles (name, is_active) VALUES ($1, $2) RETURNING id")
        .bind(&name)
        .bind(role_active)
        .fetch_one(pool)
        .await
        .unwrap();

    sqlx::query("INSERT INTO user_roles (user_id, role_id, is_active) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(role_id)
        .bind(assignment_active)
        .execute(pool)
        .await
        .unwrap();

    name
}

#[tokio::test]
async fn test_create_stores_only_the_hash() {
    let pool = common::get_test_pool().await;
    let store = PgRefreshTokenStore::new(pool.clone());
    let (user_id, _) = create_user(&pool, true).await;

    let issued = store.create(user_id, "jti-1", 7).await.unwrap();

    let stored: String = sqlx::query_scalar("SELECT token_hash FROM refresh_tokens WHERE id = $1")
        .bind(issued.record.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, hash_token(&issued.token));
    assert_ne!(stored, issued.token);

    let found = store.find_by_token(&issued.token).await.unwrap().unwrap();
    assert_eq!(found.id, issued.record.id);
    assert_eq!(found.jwt_id, "jti-1");
    assert!(found.is_active());
    assert!(store.find_by_token("unknown").await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rotate_has_single_winner() {
    let pool = common::get_test_pool().await;
    let store = Arc::new(PgRefreshTokenStore::new(pool.clone()));
    let (user_id, _) = create_user(&pool, true).await;

    for round in 0..10 {
        let issued = store.create(user_id, &format!("jti-{round}"), 7).await.unwrap();

        let attempts: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                let id = issued.record.id;
                tokio::spawn(async move { store.rotate(id, &format!("next-{round}-{i}"), 7).await })
            })
            .collect();

        let mut winners = Vec::new();
        for attempt in attempts {
            if let Some(next) = attempt.await.unwrap().unwrap() {
                winners.push(next);
            }
        }

        assert_eq!(winners.len(), 1, "round {round}: exactly one rotation must succeed");
        assert_eq!(winners[0].record.user_id, user_id);
        assert!(store.find_by_token(&winners[0].token).await.unwrap().unwrap().is_active());

        let successors: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM refresh_tokens WHERE jwt_id LIKE $1")
            .bind(format!("next-{round}-%"))
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(successors, 1, "losers must not write a successor");

        let original = store.find_by_token(&issued.token).await.unwrap().unwrap();
        assert!(original.is_used);
    }
}

#[tokio::test]
async fn test_expired_row_cannot_be_used_or_rotated() {
    let pool = common::get_test_pool().await;
    let store = PgRefreshTokenStore::new(pool.clone());
    let (user_id, _) = create_user(&pool, true).await;

    let expired = store.create(user_id, "jti-expired", -1).await.unwrap();

    assert!(!store.mark_used(expired.record.id).await.unwrap());
    assert!(store.rotate(expired.record.id, "jti-next", 7).await.unwrap().is_none());

    let found = store.find_by_token(&expired.token).await.unwrap().unwrap();
    assert!(!found.is_used);
    assert!(!found.is_active());
}

#[tokio::test]
async fn test_mark_used_only_succeeds_once() {
    let pool = common::get_test_pool().await;
    let store = PgRefreshTokenStore::new(pool.clone());
    let (user_id, _) = create_user(&pool, true).await;

    let issued = store.create(user_id, "jti-1", 7).await.unwrap();

    assert!(store.mark_used(issued.record.id).await.unwrap());
    assert!(!store.mark_used(issued.record.id).await.unwrap());
}

#[tokio::test]
async fn test_revoke_all_active_is_idempotent() {
    let pool = common::get_test_pool().await;
    let store = PgRefreshTokenStore::new(pool.clone());
    let (user_id, _) = create_user(&pool, true).await;
    let (other_id, _) = create_user(&pool, true).await;

    let used = store.create(user_id, "a", 7).await.unwrap();
    store.mark_used(used.record.id).await.unwrap();
    store.create(user_id, "b", 7).await.unwrap();
    store.create(user_id, "c", 7).await.unwrap();
    store.create(user_id, "d", -1).await.unwrap();
    let other = store.create(other_id, "e", 7).await.unwrap();

    assert_eq!(store.revoke_all_active(user_id).await.unwrap(), 2);
    assert_eq!(store.revoke_all_active(user_id).await.unwrap(), 0);

    assert!(store.find_by_token(&other.token).await.unwrap().unwrap().is_active());
    let used = store.find_by_token(&used.token).await.unwrap().unwrap();
    assert!(!used.is_revoked);
}

#[tokio::test]
async fn test_fetch_active_roles_skips_inactive_assignments_and_roles() {
    let pool = common::get_test_pool().await;
    let directory = PgUserDirectory::new(pool.clone());
    let (user_id, _) = create_user(&pool, true).await;

    let active = assign_role(&pool, user_id, true, true).await;
    assign_role(&pool, user_id, true, false).await;
    assign_role(&pool, user_id, false, true).await;

    let roles = directory.fetch_active_roles(user_id).await.unwrap();

    assert_eq!(roles, BTreeSet::from([active]));
}

#[tokio::test]
async fn test_directory_hides_inactive_users() {
    let pool = common::get_test_pool().await;
    let directory = PgUserDirectory::new(pool.clone());
    let (active_id, active_name) = create_user(&pool, true).await;
    let (inactive_id, inactive_name) = create_user(&pool, false).await;

    let user = directory.find_by_username(&active_name).await.unwrap().unwrap();
    assert_eq!(user.id, active_id);
    assert!(user.roles.is_none());
    assert_eq!(directory.find_by_id(active_id).await.unwrap().unwrap().username, active_name);

    assert!(directory.find_by_id(inactive_id).await.unwrap().is_none());
    assert!(directory.find_by_username(&inactive_name).await.unwrap().is_none());
}
