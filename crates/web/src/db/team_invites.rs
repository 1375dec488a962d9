//! Team invite repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use screencast_core::{Email, TeamInviteId, UserId};

use super::RepositoryError;
use crate::models::TeamInvite;

#[derive(Debug, sqlx::FromRow)]
struct TeamInviteRow {
    id: Uuid,
    email: String,
    inviter_user_id: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<TeamInviteRow> for TeamInvite {
    type Error = RepositoryError;

    fn try_from(row: TeamInviteRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            created_at: row.created_at,
            email,
            id: TeamInviteId::new(row.id),
            inviter_user_id: UserId::new(row.inviter_user_id),
        })
    }
}

/// Repository for team invite database operations.
pub struct TeamInviteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TeamInviteRepository<'a> {
    /// Create a new team invite repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create an invite for `email` from `inviter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the inviter does not exist.
    pub async fn insert(&self, email: &Email, inviter: UserId) -> Result<TeamInvite, RepositoryError> {
        let row = sqlx::query_as::<_, TeamInviteRow>(
            "INSERT INTO team_invites (email, inviter_user_id) VALUES ($1, $2) \
             RETURNING id, email, inviter_user_id, created_at",
        )
        .bind(email.as_str())
        .bind(inviter)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "invite"))?;

        TeamInvite::try_from(row)
    }

    /// Get an invite by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn fetch(&self, id: TeamInviteId) -> Result<Option<TeamInvite>, RepositoryError> {
        let row = sqlx::query_as::<_, TeamInviteRow>(
            "SELECT id, email, inviter_user_id, created_at FROM team_invites WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TeamInvite::try_from).transpose()
    }

    /// Outstanding invites sent by `inviter`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn fetch_for_inviter(&self, inviter: UserId) -> Result<Vec<TeamInvite>, RepositoryError> {
        let rows = sqlx::query_as::<_, TeamInviteRow>(
            "SELECT id, email, inviter_user_id, created_at FROM team_invites \
             WHERE inviter_user_id = $1 ORDER BY created_at",
        )
        .bind(inviter)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TeamInvite::try_from).collect()
    }

    /// Delete an invite. Deleting a missing invite is not an error.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: TeamInviteId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM team_invites WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
