//! Database operations for the site's `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `users` - GitHub-backed accounts
//! - `subscriptions` - Local mirror of Stripe subscriptions
//! - `team_invites` - Pending invitations to a subscription owner's team
//! - `email_settings` - Newsletter opt-ins, unique per (newsletter, user)
//! - `episode_credits` - Episodes unlocked with a credit, unique per (episode, user)
//! - `feed_request_events` - Private feed fetch counters
//! - `tower_sessions.session` - Session storage, owned by `tower-sessions`
//!
//! # Migrations
//!
//! The schema lives in [`migrations`] and is applied via:
//! ```bash
//! cargo run -p screencast-cli -- migrate
//! ```
//!
//! Queries use `sqlx::query_as` into private row structs which are then
//! validated into domain models with `TryFrom`.

pub mod email_settings;
pub mod episode_credits;
pub mod feed_events;
pub mod migrations;
pub mod subscriptions;
pub mod team_invites;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use email_settings::EmailSettingRepository;
pub use episode_credits::EpisodeCreditRepository;
pub use feed_events::FeedRequestEventRepository;
pub use migrations::migrate;
pub use subscriptions::SubscriptionRepository;
pub use team_invites::TeamInviteRepository;
pub use users::{SubscriberFilter, UserRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to `Conflict` and a dangling reference to
    /// `NotFound`; anything else stays `Database`.
    pub(crate) fn from_insert(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return Self::Conflict(format!("{what} already exists"));
            }
            if db_err.is_foreign_key_violation() {
                return Self::NotFound;
            }
        }
        Self::Database(e)
    }
}

/// Parse a string column into a typed value, flagging bad data as corruption.
pub(crate) fn parse_column<T>(value: &str, column: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e| {
        RepositoryError::DataCorruption(format!("invalid {column} in database: {e}"))
    })
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
