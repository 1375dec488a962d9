//! Subscription repository for database operations.
//!
//! A subscription row is owned by the paying user (`subscriptions.user_id`).
//! Access is granted through `users.subscription_id`, which the owner and
//! every teammate point at the same row.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use screencast_core::{SubscriptionId, UserId};

use super::users::{UserRow, into_users, user_columns};
use super::{RepositoryError, parse_column};
use crate::models::{Subscription, User};
use crate::stripe;

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_id: Uuid,
    stripe_subscription_id: String,
    stripe_subscription_status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = RepositoryError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: SubscriptionId::new(row.id),
            user_id: UserId::new(row.user_id),
            stripe_subscription_id: stripe::SubscriptionId::new(row.stripe_subscription_id),
            stripe_subscription_status: parse_column(
                &row.stripe_subscription_status,
                "stripe_subscription_status",
            )?,
            created_at: row.created_at,
        })
    }
}

/// Repository for subscription database operations.
pub struct SubscriptionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SubscriptionRepository<'a> {
    /// Create a new subscription repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record a Stripe subscription and make `owner` a member of it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the Stripe subscription is already recorded.
    /// Returns `RepositoryError::NotFound` if the owner does not exist.
    pub async fn create(
        &self,
        stripe_subscription: &stripe::Subscription,
        owner: UserId,
    ) -> Result<Subscription, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, SubscriptionRow>(
            "INSERT INTO subscriptions (stripe_subscription_id, stripe_subscription_status, user_id) \
             VALUES ($1, $2, $3) \
             RETURNING id, user_id, stripe_subscription_id, stripe_subscription_status, created_at",
        )
        .bind(stripe_subscription.id.as_str())
        .bind(stripe_subscription.status.as_str())
        .bind(owner)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "subscription"))?;

        let updated = sqlx::query("UPDATE users SET subscription_id = $1 WHERE id = $2")
            .bind(row.id)
            .bind(owner)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Subscription::try_from(row)
    }

    /// Copy the status of a Stripe subscription onto its local record.
    ///
    /// Returns `None` when the subscription is not one of ours.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_stripe_subscription(
        &self,
        stripe_subscription: &stripe::Subscription,
    ) -> Result<Option<Subscription>, RepositoryError> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            "UPDATE subscriptions SET stripe_subscription_status = $1 \
             WHERE stripe_subscription_id = $2 \
             RETURNING id, user_id, stripe_subscription_id, stripe_subscription_status, created_at",
        )
        .bind(stripe_subscription.status.as_str())
        .bind(stripe_subscription.id.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(Subscription::try_from).transpose()
    }

    /// Get a subscription by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn fetch_by_id(
        &self,
        id: SubscriptionId,
    ) -> Result<Option<Subscription>, RepositoryError> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            "SELECT id, user_id, stripe_subscription_id, stripe_subscription_status, created_at \
             FROM subscriptions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Subscription::try_from).transpose()
    }

    /// The most recent subscription `owner` pays for.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn fetch_by_owner_id(
        &self,
        owner: UserId,
    ) -> Result<Option<Subscription>, RepositoryError> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            "SELECT id, user_id, stripe_subscription_id, stripe_subscription_status, created_at \
             FROM subscriptions WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(owner)
        .fetch_optional(self.pool)
        .await?;

        row.map(Subscription::try_from).transpose()
    }

    /// Everyone on a subscription `owner` pays for, the owner included.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn fetch_teammates_by_owner_id(
        &self,
        owner: UserId,
    ) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users \
             INNER JOIN subscriptions ON users.subscription_id = subscriptions.id \
             WHERE subscriptions.user_id = $1 \
             ORDER BY users.created_at"
        ))
        .bind(owner)
        .fetch_all(self.pool)
        .await?;

        into_users(rows)
    }

    /// Point a user at a subscription.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn add_user(
        &self,
        user_id: UserId,
        subscription_id: SubscriptionId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET subscription_id = $1 WHERE id = $2")
            .bind(subscription_id)
            .bind(user_id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::from_insert(e, "subscription member"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Detach a teammate, but only if they are on `subscription_id`.
    ///
    /// Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove_teammate(
        &self,
        teammate: UserId,
        subscription_id: SubscriptionId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET subscription_id = NULL WHERE id = $1 AND subscription_id = $2",
        )
        .bind(teammate)
        .bind(subscription_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
