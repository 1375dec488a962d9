//! Feed request event repository.
//!
//! One row per (feed, user agent, user); repeated fetches bump `count`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use screencast_core::{FeedRequestEventId, FeedType, UserId};

use super::{RepositoryError, parse_column};
use crate::models::FeedRequestEvent;

#[derive(Debug, sqlx::FromRow)]
struct FeedRequestEventRow {
    id: Uuid,
    #[sqlx(rename = "type")]
    feed_type: String,
    user_agent: String,
    user_id: Uuid,
    count: i32,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FeedRequestEventRow> for FeedRequestEvent {
    type Error = RepositoryError;

    fn try_from(row: FeedRequestEventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: FeedRequestEventId::new(row.id),
            feed_type: parse_column(&row.feed_type, "type")?,
            user_agent: row.user_agent,
            user_id: UserId::new(row.user_id),
            count: row.count,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for feed request event database operations.
pub struct FeedRequestEventRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> FeedRequestEventRepository<'a> {
    /// Create a new feed request event repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Count one fetch of a feed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn record(
        &self,
        feed_type: FeedType,
        user_agent: &str,
        user_id: UserId,
    ) -> Result<FeedRequestEvent, RepositoryError> {
        let row = sqlx::query_as::<_, FeedRequestEventRow>(
            r#"INSERT INTO feed_request_events ("type", user_agent, user_id) VALUES ($1, $2, $3)
               ON CONFLICT ("type", user_agent, user_id)
               DO UPDATE SET count = feed_request_events.count + 1
               RETURNING id, "type", user_agent, user_id, count, updated_at"#,
        )
        .bind(feed_type.as_str())
        .bind(user_agent)
        .bind(user_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "feed request event"))?;

        FeedRequestEvent::try_from(row)
    }

    /// Get the counter for one (feed, user agent, user) key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn fetch(
        &self,
        feed_type: FeedType,
        user_agent: &str,
        user_id: UserId,
    ) -> Result<Option<FeedRequestEvent>, RepositoryError> {
        let row = sqlx::query_as::<_, FeedRequestEventRow>(
            r#"SELECT id, "type", user_agent, user_id, count, updated_at
               FROM feed_request_events
               WHERE "type" = $1 AND user_agent = $2 AND user_id = $3"#,
        )
        .bind(feed_type.as_str())
        .bind(user_agent)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(FeedRequestEvent::try_from).transpose()
    }
}
