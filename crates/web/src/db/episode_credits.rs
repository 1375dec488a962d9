//! Episode credit repository.

use sqlx::PgPool;
use uuid::Uuid;

use screencast_core::UserId;

use super::RepositoryError;
use super::users::{UserRow, user_columns};
use crate::models::{EpisodeCredit, User};

#[derive(Debug, sqlx::FromRow)]
struct EpisodeCreditRow {
    episode_sequence: i32,
    user_id: Uuid,
}

impl From<EpisodeCreditRow> for EpisodeCredit {
    fn from(row: EpisodeCreditRow) -> Self {
        Self {
            episode_sequence: row.episode_sequence,
            user_id: UserId::new(row.user_id),
        }
    }
}

/// Repository for episode credit database operations.
pub struct EpisodeCreditRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> EpisodeCreditRepository<'a> {
    /// Create a new episode credit repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Episodes the user has unlocked.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn fetch_for_user(&self, user_id: UserId) -> Result<Vec<EpisodeCredit>, RepositoryError> {
        let rows = sqlx::query_as::<_, EpisodeCreditRow>(
            "SELECT episode_sequence, user_id FROM episode_credits \
             WHERE user_id = $1 ORDER BY episode_sequence",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(EpisodeCredit::from).collect())
    }

    /// Unlock an episode and spend one of the user's credits.
    ///
    /// Both writes happen in one transaction. Returns the updated user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the episode is already unlocked
    /// or the user has no credits left.
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn redeem(&self, sequence: i32, user_id: UserId) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO episode_credits (episode_sequence, user_id) VALUES ($1, $2)")
            .bind(sequence)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::from_insert(e, "episode credit"))?;

        let row = sqlx::query_as::<_, UserRow>(concat!(
            "UPDATE users SET episode_credit_count = episode_credit_count - 1 \
             WHERE id = $1 AND episode_credit_count > 0 RETURNING ",
            user_columns!()
        ))
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        // Dropping the transaction rolls back the credit insert.
        let row = row.ok_or_else(|| RepositoryError::Conflict("no episode credits left".to_owned()))?;

        tx.commit().await?;
        User::try_from(row)
    }
}
