//! Shared helpers for the database integration tests.
//!
//! # Running Tests
//!
//! ```bash
//! # Point at a scratch database; the schema is created on first use
//! export TEST_DATABASE_URL=postgres://localhost/screencast_test
//!
//! cargo test -p screencast-integration-tests -- --ignored
//! ```
//!
//! Every helper creates rows with random identities, so tests can share one
//! database and run in parallel.

use rand::Rng;
use secrecy::SecretString;
use sqlx::PgPool;
use uuid::Uuid;

use screencast_core::{Email, GitHubUserId};
use screencast_web::db::{self, UserRepository};
use screencast_web::github::{AccessToken, GitHubUser, GitHubUserEnvelope};
use screencast_web::models::User;
use screencast_web::stripe;

/// Connect to `TEST_DATABASE_URL` without touching the schema.
///
/// # Panics
///
/// Panics if the variable is unset or the database is unreachable.
pub async fn connect() -> PgPool {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    db::create_pool(&SecretString::from(url))
        .await
        .expect("Failed to connect to test database")
}

/// Connect to `TEST_DATABASE_URL` and make sure the schema exists.
///
/// # Panics
///
/// Panics if the variable is unset, the database is unreachable, or the
/// migration fails.
pub async fn test_pool() -> PgPool {
    let pool = connect().await;
    db::migrate(&pool).await.expect("Failed to migrate test database");
    pool
}

/// A unique email address.
///
/// # Panics
///
/// Never; the generated address is always valid.
#[must_use]
pub fn unique_email() -> Email {
    Email::parse(&format!("blob+{}@pointfree.co", Uuid::new_v4().simple()))
        .expect("generated email is valid")
}

/// A GitHub identity that no other test uses.
#[must_use]
pub fn github_envelope(name: Option<&str>) -> GitHubUserEnvelope {
    let id: i64 = rand::rng().random_range(1..i64::MAX);
    GitHubUserEnvelope {
        access_token: AccessToken {
            access_token: format!("gho_{}", Uuid::new_v4().simple()),
        },
        user: GitHubUser {
            id: GitHubUserId::new(id),
            login: format!("blob{id}"),
            name: name.map(String::from),
        },
    }
}

/// Register a fresh user.
///
/// # Panics
///
/// Panics if the insert fails.
pub async fn register_user(pool: &PgPool) -> User {
    UserRepository::new(pool)
        .register_with_github(&github_envelope(Some("Blob")), &unique_email())
        .await
        .expect("Failed to register user")
}

/// A Stripe subscription with a unique id and the given status.
///
/// # Panics
///
/// Panics if the fixture JSON no longer matches the model.
#[must_use]
pub fn stripe_subscription(status: &str) -> stripe::Subscription {
    let plan = serde_json::json!({
        "amount": 1700,
        "created": 1_517_356_800,
        "currency": "usd",
        "id": "individual-monthly",
        "interval": "month",
        "metadata": {},
        "name": "Individual Monthly",
        "statement_descriptor": null
    });
    serde_json::from_value(serde_json::json!({
        "canceled_at": null,
        "cancel_at_period_end": false,
        "created": 1_517_356_800,
        "current_period_start": 1_517_356_800,
        "current_period_end": 1_519_776_000,
        "customer": "cus_test",
        "discount": null,
        "ended_at": null,
        "id": format!("sub_{}", Uuid::new_v4().simple()),
        "items": { "data": [], "has_more": false },
        "plan": plan,
        "quantity": 1,
        "start": 1_517_356_800,
        "status": status
    }))
    .expect("subscription fixture decodes")
}
