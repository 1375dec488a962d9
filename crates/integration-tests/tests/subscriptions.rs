//! Subscription and team invite repository tests.
//!
//! Require a `PostgreSQL` database at `TEST_DATABASE_URL`.

#![allow(clippy::unwrap_used)]

use screencast_core::SubscriptionStatus;
use screencast_integration_tests::{register_user, stripe_subscription, test_pool, unique_email};
use screencast_web::db::{
    RepositoryError, SubscriptionRepository, TeamInviteRepository, UserRepository,
};

#[tokio::test]
#[ignore = "requires database"]
async fn test_create_links_owner() {
    let pool = test_pool().await;
    let owner = register_user(&pool).await;
    let stripe = stripe_subscription("active");

    let subscription = SubscriptionRepository::new(&pool)
        .create(&stripe, owner.id)
        .await
        .unwrap();
    assert!(subscription.is_owned_by(owner.id));
    assert!(subscription.is_active());

    let owner = UserRepository::new(&pool)
        .fetch_by_id(owner.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(owner.subscription_id, Some(subscription.id));

    let err = SubscriptionRepository::new(&pool)
        .create(&stripe, owner.id)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_status_sync_from_stripe() {
    let pool = test_pool().await;
    let subscriptions = SubscriptionRepository::new(&pool);
    let owner = register_user(&pool).await;
    let mut stripe = stripe_subscription("active");
    subscriptions.create(&stripe, owner.id).await.unwrap();

    stripe.status = SubscriptionStatus::PastDue;
    let synced = subscriptions
        .update_stripe_subscription(&stripe)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(synced.stripe_subscription_status, SubscriptionStatus::PastDue);
    assert!(!synced.is_active());

    let unknown = stripe_subscription("canceled");
    assert!(
        subscriptions
            .update_stripe_subscription(&unknown)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_teammates_join_and_leave() {
    let pool = test_pool().await;
    let subscriptions = SubscriptionRepository::new(&pool);
    let owner = register_user(&pool).await;
    let teammate = register_user(&pool).await;
    let subscription = subscriptions
        .create(&stripe_subscription("active"), owner.id)
        .await
        .unwrap();

    subscriptions
        .add_user(teammate.id, subscription.id)
        .await
        .unwrap();
    let team = subscriptions
        .fetch_teammates_by_owner_id(owner.id)
        .await
        .unwrap();
    let ids: Vec<_> = team.iter().map(|u| u.id).collect();
    assert_eq!(ids, vec![owner.id, teammate.id]);

    let other = subscriptions
        .create(&stripe_subscription("active"), register_user(&pool).await.id)
        .await
        .unwrap();
    assert!(
        !subscriptions
            .remove_teammate(teammate.id, other.id)
            .await
            .unwrap()
    );
    assert!(
        subscriptions
            .remove_teammate(teammate.id, subscription.id)
            .await
            .unwrap()
    );
    let team = subscriptions
        .fetch_teammates_by_owner_id(owner.id)
        .await
        .unwrap();
    assert_eq!(team.len(), 1);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_team_invite_lifecycle() {
    let pool = test_pool().await;
    let invites = TeamInviteRepository::new(&pool);
    let inviter = register_user(&pool).await;
    let email = unique_email();

    let invite = invites.insert(&email, inviter.id).await.unwrap();
    assert_eq!(invite.email, email);
    assert_eq!(invite.inviter_user_id, inviter.id);

    let fetched = invites.fetch(invite.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, invite.id);
    assert_eq!(invites.fetch_for_inviter(inviter.id).await.unwrap().len(), 1);

    invites.delete(invite.id).await.unwrap();
    assert!(invites.fetch(invite.id).await.unwrap().is_none());
    invites.delete(invite.id).await.unwrap();
}
