//! Newsletter opt-in repository.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use screencast_core::{Newsletter, UserId};

use super::{RepositoryError, parse_column};
use crate::models::EmailSetting;

#[derive(Debug, sqlx::FromRow)]
struct EmailSettingRow {
    newsletter: String,
    user_id: Uuid,
}

impl TryFrom<EmailSettingRow> for EmailSetting {
    type Error = RepositoryError;

    fn try_from(row: EmailSettingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            newsletter: parse_column(&row.newsletter, "newsletter")?,
            user_id: UserId::new(row.user_id),
        })
    }
}

/// Repository for email setting database operations.
pub struct EmailSettingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> EmailSettingRepository<'a> {
    /// Create a new email setting repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The newsletters a user is opted into.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` on an unknown newsletter value.
    pub async fn fetch_for_user(&self, user_id: UserId) -> Result<Vec<EmailSetting>, RepositoryError> {
        let rows = sqlx::query_as::<_, EmailSettingRow>(
            "SELECT newsletter, user_id FROM email_settings WHERE user_id = $1 ORDER BY newsletter",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(EmailSetting::try_from).collect()
    }

    /// Replace a user's opt-ins with exactly `newsletters`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either statement fails; nothing
    /// is changed in that case.
    pub async fn replace_for_user(
        &self,
        user_id: UserId,
        newsletters: &[Newsletter],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        replace(&mut tx, user_id, newsletters).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Delete and re-insert a user's settings on an open connection.
pub(crate) async fn replace(
    conn: &mut PgConnection,
    user_id: UserId,
    newsletters: &[Newsletter],
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM email_settings WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    if newsletters.is_empty() {
        return Ok(());
    }

    let values: Vec<&str> = newsletters.iter().map(Newsletter::as_str).collect();
    sqlx::query(
        "INSERT INTO email_settings (newsletter, user_id) \
         SELECT DISTINCT unnest($1::varchar[]), $2 \
         ON CONFLICT (newsletter, user_id) DO NOTHING",
    )
    .bind(values)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
