//! Episode credit and feed request event tests.
//!
//! Require a `PostgreSQL` database at `TEST_DATABASE_URL`.

#![allow(clippy::unwrap_used)]

use screencast_core::{FeedType, UserId};
use screencast_integration_tests::{register_user, test_pool};
use screencast_web::db::{EpisodeCreditRepository, FeedRequestEventRepository, RepositoryError};

#[tokio::test]
#[ignore = "requires database"]
async fn test_redeem_spends_a_credit_once() {
    let pool = test_pool().await;
    let credits = EpisodeCreditRepository::new(&pool);
    let user = register_user(&pool).await;
    assert_eq!(user.episode_credit_count, 1);

    let user = credits.redeem(3, user.id).await.unwrap();
    assert_eq!(user.episode_credit_count, 0);
    let unlocked = credits.fetch_for_user(user.id).await.unwrap();
    assert_eq!(unlocked.len(), 1);
    assert_eq!(unlocked.first().unwrap().episode_sequence, 3);

    let err = credits.redeem(3, user.id).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_redeem_without_credits_rolls_back() {
    let pool = test_pool().await;
    let credits = EpisodeCreditRepository::new(&pool);
    let user = register_user(&pool).await;
    credits.redeem(3, user.id).await.unwrap();

    let err = credits.redeem(4, user.id).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));
    assert_eq!(credits.fetch_for_user(user.id).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_feed_requests_are_counted_per_user_agent() {
    let pool = test_pool().await;
    let events = FeedRequestEventRepository::new(&pool);
    let user = register_user(&pool).await;
    let feed = FeedType::PrivateEpisodesFeed;

    assert_eq!(events.record(feed, "Overcast", user.id).await.unwrap().count, 1);
    assert_eq!(events.record(feed, "Overcast", user.id).await.unwrap().count, 2);
    assert_eq!(events.record(feed, "Castro", user.id).await.unwrap().count, 1);

    let stored = events.fetch(feed, "Overcast", user.id).await.unwrap().unwrap();
    assert_eq!(stored.count, 2);
    assert!(events.fetch(feed, "Pocket Casts", user.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_feed_request_for_missing_user_is_not_found() {
    let pool = test_pool().await;
    let err = FeedRequestEventRepository::new(&pool)
        .record(
            FeedType::PrivateEpisodesFeed,
            "Overcast",
            UserId::new(uuid::Uuid::new_v4()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound));
}
