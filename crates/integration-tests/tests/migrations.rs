//! Schema migration tests.
//!
//! Require a `PostgreSQL` database at `TEST_DATABASE_URL`. Run against a
//! fresh database to exercise extension and table creation.

#![allow(clippy::unwrap_used)]

use screencast_integration_tests::connect;
use screencast_web::db;

#[tokio::test]
#[ignore = "requires database"]
async fn test_concurrent_migrations_all_succeed() {
    let pool = connect().await;

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..4 {
        let pool = pool.clone();
        tasks.spawn(async move { db::migrate(&pool).await });
    }

    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_migrate_is_repeatable() {
    let pool = connect().await;
    db::migrate(&pool).await.unwrap();
    db::migrate(&pool).await.unwrap();
}
