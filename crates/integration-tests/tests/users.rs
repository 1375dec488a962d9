//! User repository tests.
//!
//! Require a `PostgreSQL` database at `TEST_DATABASE_URL`.

#![allow(clippy::unwrap_used)]

use sqlx::PgPool;

use screencast_core::{Newsletter, UserId};
use screencast_integration_tests::{
    github_envelope, register_user, stripe_subscription, test_pool, unique_email,
};
use screencast_web::db::{
    EmailSettingRepository, RepositoryError, SubscriberFilter, SubscriptionRepository,
    UserRepository,
};
use screencast_web::models::{User, UserUpdate};

#[tokio::test]
#[ignore = "requires database"]
async fn test_upsert_creates_then_refreshes_token() {
    let pool = test_pool().await;
    let users = UserRepository::new(&pool);
    let email = unique_email();
    let mut envelope = github_envelope(Some("Blob"));

    let created = users.upsert_with_github(&envelope, &email).await.unwrap();
    assert_eq!(created.name.as_deref(), Some("Blob"));
    assert_eq!(created.episode_credit_count, 1);
    assert!(!created.is_admin);

    envelope.access_token.access_token = "gho_rotated".to_string();
    let again = users.upsert_with_github(&envelope, &email).await.unwrap();
    assert_eq!(again.id, created.id);
    assert_eq!(again.github_access_token, "gho_rotated");

    let fetched = users
        .fetch_by_github_id(envelope.user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.id, created.id);
    let by_salt = users.fetch_by_rss_salt(created.rss_salt).await.unwrap().unwrap();
    assert_eq!(by_salt.id, created.id);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_email_taken_by_another_account_conflicts() {
    let pool = test_pool().await;
    let users = UserRepository::new(&pool);
    let email = unique_email();

    users
        .upsert_with_github(&github_envelope(None), &email)
        .await
        .unwrap();
    let err = users
        .upsert_with_github(&github_envelope(None), &email)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_register_opts_into_every_newsletter() {
    let pool = test_pool().await;
    let user = register_user(&pool).await;

    let settings = EmailSettingRepository::new(&pool)
        .fetch_for_user(user.id)
        .await
        .unwrap();
    let mut newsletters: Vec<_> = settings.iter().map(|s| s.newsletter).collect();
    newsletters.sort_by_key(|n| n.as_str());
    let mut expected = Newsletter::all().to_vec();
    expected.sort_by_key(|n| n.as_str());
    assert_eq!(newsletters, expected);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_update_replaces_newsletters_and_keeps_unset_fields() {
    let pool = test_pool().await;
    let users = UserRepository::new(&pool);
    let user = register_user(&pool).await;

    let updated = users
        .update(
            user.id,
            &UserUpdate {
                name: Some("Blobby".to_string()),
                newsletters: Some(vec![Newsletter::Announcements]),
                ..UserUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name.as_deref(), Some("Blobby"));
    assert_eq!(updated.email, user.email);

    let settings = EmailSettingRepository::new(&pool)
        .fetch_for_user(user.id)
        .await
        .unwrap();
    assert_eq!(settings.len(), 1);
    assert_eq!(settings.first().unwrap().newsletter, Newsletter::Announcements);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_increment_episode_credits() {
    let pool = test_pool().await;
    let users = UserRepository::new(&pool);
    let user = register_user(&pool).await;

    assert!(users.increment_episode_credits(&[]).await.unwrap().is_empty());

    let updated = users.increment_episode_credits(&[user.id]).await.unwrap();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated.first().unwrap().episode_credit_count, user.episode_credit_count + 1);
}

fn contains(users: &[User], id: UserId) -> bool {
    users.iter().any(|u| u.id == id)
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_fetch_admins_lists_only_admins() {
    let pool = test_pool().await;
    let admin = register_user(&pool).await;
    let member = register_user(&pool).await;
    sqlx::query("UPDATE users SET is_admin = TRUE WHERE id = $1")
        .bind(admin.id)
        .execute(&pool)
        .await
        .unwrap();

    let admins = UserRepository::new(&pool).fetch_admins().await.unwrap();
    assert!(contains(&admins, admin.id));
    assert!(!contains(&admins, member.id));
    assert!(admins.iter().all(|u| u.is_admin));
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_subscriber_filters_follow_subscription() {
    let pool = test_pool().await;
    let users = UserRepository::new(&pool);
    let user = register_user(&pool).await;
    let newsletter = Newsletter::Announcements;

    let everyone = users
        .fetch_subscribed_to(newsletter, SubscriberFilter::Everyone)
        .await
        .unwrap();
    let non_subscribers = users
        .fetch_subscribed_to(newsletter, SubscriberFilter::NonSubscribers)
        .await
        .unwrap();
    let subscribers = users
        .fetch_subscribed_to(newsletter, SubscriberFilter::Subscribers)
        .await
        .unwrap();
    assert!(contains(&everyone, user.id));
    assert!(contains(&non_subscribers, user.id));
    assert!(!contains(&subscribers, user.id));

    SubscriptionRepository::new(&pool)
        .create(&stripe_subscription("active"), user.id)
        .await
        .unwrap();

    let everyone = users
        .fetch_subscribed_to(newsletter, SubscriberFilter::Everyone)
        .await
        .unwrap();
    let non_subscribers = users
        .fetch_subscribed_to(newsletter, SubscriberFilter::NonSubscribers)
        .await
        .unwrap();
    let subscribers = users
        .fetch_subscribed_to(newsletter, SubscriberFilter::Subscribers)
        .await
        .unwrap();
    assert!(contains(&everyone, user.id));
    assert!(!contains(&non_subscribers, user.id));
    assert!(contains(&subscribers, user.id));

    EmailSettingRepository::new(&pool)
        .replace_for_user(user.id, &[])
        .await
        .unwrap();
    let everyone = users
        .fetch_subscribed_to(newsletter, SubscriberFilter::Everyone)
        .await
        .unwrap();
    assert!(!contains(&everyone, user.id));
}

/// Move a user's sign-up to midday `weeks_ago` weeks before today.
async fn backdate(pool: &PgPool, id: UserId, weeks_ago: i32) {
    sqlx::query(
        "UPDATE users SET created_at = CURRENT_DATE - make_interval(days => $2 * 7) \
         + INTERVAL '12 hours' WHERE id = $1",
    )
    .bind(id)
    .bind(weeks_ago)
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_welcome_cohort_is_a_one_day_window() {
    let pool = test_pool().await;
    let users = UserRepository::new(&pool);
    let user = register_user(&pool).await;
    backdate(&pool, user.id, 1).await;

    assert!(contains(&users.fetch_to_welcome(1).await.unwrap(), user.id));
    assert!(!contains(&users.fetch_to_welcome(2).await.unwrap(), user.id));

    EmailSettingRepository::new(&pool)
        .replace_for_user(user.id, &Newsletter::subscriber_newsletters())
        .await
        .unwrap();
    assert!(!contains(&users.fetch_to_welcome(1).await.unwrap(), user.id));
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_welcome_cohort_skips_owners_and_teammates() {
    let pool = test_pool().await;
    let users = UserRepository::new(&pool);
    let subscriptions = SubscriptionRepository::new(&pool);
    let owner = register_user(&pool).await;
    let teammate = register_user(&pool).await;
    backdate(&pool, owner.id, 1).await;
    backdate(&pool, teammate.id, 1).await;

    let cohort = users.fetch_to_welcome(1).await.unwrap();
    assert!(contains(&cohort, owner.id));
    assert!(contains(&cohort, teammate.id));

    let subscription = subscriptions
        .create(&stripe_subscription("active"), owner.id)
        .await
        .unwrap();
    subscriptions
        .add_user(teammate.id, subscription.id)
        .await
        .unwrap();
    let cohort = users.fetch_to_welcome(1).await.unwrap();
    assert!(!contains(&cohort, owner.id));
    assert!(!contains(&cohort, teammate.id));

    // Owning a subscription still excludes the owner after they leave it.
    sqlx::query("UPDATE users SET subscription_id = NULL WHERE id = $1")
        .bind(owner.id)
        .execute(&pool)
        .await
        .unwrap();
    assert!(!contains(&users.fetch_to_welcome(1).await.unwrap(), owner.id));
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_free_episode_users_exclude_active_subscribers() {
    let pool = test_pool().await;
    let users = UserRepository::new(&pool);
    let free = register_user(&pool).await;
    let lapsed = register_user(&pool).await;
    let active = register_user(&pool).await;
    let opted_out = register_user(&pool).await;

    let subscriptions = SubscriptionRepository::new(&pool);
    subscriptions
        .create(&stripe_subscription("canceled"), lapsed.id)
        .await
        .unwrap();
    subscriptions
        .create(&stripe_subscription("active"), active.id)
        .await
        .unwrap();
    EmailSettingRepository::new(&pool)
        .replace_for_user(opted_out.id, &[Newsletter::Announcements])
        .await
        .unwrap();

    let listed = users.fetch_free_episode_users().await.unwrap();
    assert!(contains(&listed, free.id));
    assert!(contains(&listed, lapsed.id));
    assert!(!contains(&listed, active.id));
    assert!(!contains(&listed, opted_out.id));
}
