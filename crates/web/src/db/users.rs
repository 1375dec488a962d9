//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use screencast_core::{Email, GitHubUserId, Newsletter, RssSalt, SubscriptionId, UserId};

use super::{RepositoryError, email_settings};
use crate::github::GitHubUserEnvelope;
use crate::models::{User, UserUpdate};

/// Expands to the `users` column list, qualified so it survives joins.
macro_rules! user_columns {
    () => {
        "users.id, users.email, users.episode_credit_count, users.github_user_id, \
         users.github_access_token, users.is_admin, users.name, users.rss_salt, \
         users.subscription_id, users.created_at"
    };
}
pub(crate) use user_columns;

/// Which users to include when listing a newsletter's audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriberFilter {
    /// Everyone opted in.
    #[default]
    Everyone,
    /// Only users without a subscription.
    NonSubscribers,
    /// Only users with a subscription.
    Subscribers,
}

/// Internal row type for database queries.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRow {
    id: Uuid,
    email: String,
    episode_credit_count: i32,
    github_user_id: i64,
    github_access_token: String,
    is_admin: bool,
    name: Option<String>,
    rss_salt: Uuid,
    subscription_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            email,
            episode_credit_count: row.episode_credit_count,
            github_user_id: GitHubUserId::new(row.github_user_id),
            github_access_token: row.github_access_token,
            is_admin: row.is_admin,
            name: row.name,
            rss_salt: RssSalt::new(row.rss_salt),
            subscription_id: row.subscription_id.map(SubscriptionId::new),
            created_at: row.created_at,
        })
    }
}

pub(crate) fn into_users(rows: Vec<UserRow>) -> Result<Vec<User>, RepositoryError> {
    rows.into_iter().map(User::try_from).collect()
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
    pub async fn fetch_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE users.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by their GitHub account id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn fetch_by_github_id(
        &self,
        github_user_id: GitHubUserId,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE users.github_user_id = $1"
        ))
        .bind(github_user_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by the salt embedded in their private feed URL.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn fetch_by_rss_salt(&self, salt: RssSalt) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE users.rss_salt = $1"
        ))
        .bind(salt)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Insert a user from a GitHub sign-in, or refresh the token and name of
    /// the existing account with the same GitHub id.
    ///
    /// New accounts start with one episode credit.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email belongs to a different account.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn upsert_with_github(
        &self,
        envelope: &GitHubUserEnvelope,
        email: &Email,
    ) -> Result<User, RepositoryError> {
        let row = upsert_query(envelope, email)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RepositoryError::from_insert(e, "email"))?;

        User::try_from(row)
    }

    /// Upsert a user and opt them into every newsletter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email belongs to a different account.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn register_with_github(
        &self,
        envelope: &GitHubUserEnvelope,
        email: &Email,
    ) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = upsert_query(envelope, email)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| RepositoryError::from_insert(e, "email"))?;
        let user = User::try_from(row)?;

        email_settings::replace(&mut tx, user.id, &Newsletter::all()).await?;
        tx.commit().await?;

        Ok(user)
    }

    /// Apply a partial update. Columns whose field is `None` keep their value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Conflict` if the new email is taken.
    pub async fn update(&self, id: UserId, update: &UserUpdate) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(concat!(
            "UPDATE users SET name = COALESCE($1, name), email = COALESCE($2, email), \
             episode_credit_count = COALESCE($3, episode_credit_count) \
             WHERE id = $4 RETURNING ",
            user_columns!()
        ))
        .bind(update.name.as_deref())
        .bind(update.email.as_ref().map(Email::as_str))
        .bind(update.episode_credit_count)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "email"))?
        .ok_or(RepositoryError::NotFound)?;

        if let Some(newsletters) = &update.newsletters {
            email_settings::replace(&mut tx, id, newsletters).await?;
        }
        tx.commit().await?;

        User::try_from(row)
    }

    /// List every admin.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn fetch_admins(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE users.is_admin = TRUE ORDER BY users.created_at"
        ))
        .fetch_all(self.pool)
        .await?;

        into_users(rows)
    }

    /// List users opted into `newsletter`, optionally narrowed by whether
    /// they have a subscription.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn fetch_subscribed_to(
        &self,
        newsletter: Newsletter,
        filter: SubscriberFilter,
    ) -> Result<Vec<User>, RepositoryError> {
        let sql = match filter {
            SubscriberFilter::Everyone => concat!(
                "SELECT ",
                user_columns!(),
                " FROM email_settings LEFT JOIN users ON email_settings.user_id = users.id \
                 WHERE email_settings.newsletter = $1"
            ),
            SubscriberFilter::NonSubscribers => concat!(
                "SELECT ",
                user_columns!(),
                " FROM email_settings LEFT JOIN users ON email_settings.user_id = users.id \
                 WHERE email_settings.newsletter = $1 AND users.subscription_id IS NULL"
            ),
            SubscriberFilter::Subscribers => concat!(
                "SELECT ",
                user_columns!(),
                " FROM email_settings LEFT JOIN users ON email_settings.user_id = users.id \
                 WHERE email_settings.newsletter = $1 AND users.subscription_id IS NOT NULL"
            ),
        };

        let rows = sqlx::query_as::<_, UserRow>(sql)
            .bind(newsletter.as_str())
            .fetch_all(self.pool)
            .await?;

        into_users(rows)
    }

    /// Users who signed up `weeks_ago` weeks ago (a one-day window), still
    /// want welcome emails, and neither have nor own a subscription.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn fetch_to_welcome(&self, weeks_ago: i32) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM email_settings \
             LEFT JOIN users ON email_settings.user_id = users.id \
             LEFT JOIN subscriptions ON users.id = subscriptions.user_id \
             WHERE email_settings.newsletter = $1 \
             AND users.created_at BETWEEN CURRENT_DATE - make_interval(days => $2 * 7) \
                 AND CURRENT_DATE - make_interval(days => $2 * 7 - 1) \
             AND users.subscription_id IS NULL \
             AND subscriptions.user_id IS NULL"
        ))
        .bind(Newsletter::WelcomeEmails.as_str())
        .bind(weeks_ago)
        .fetch_all(self.pool)
        .await?;

        into_users(rows)
    }

    /// Give each listed user one more episode credit.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn increment_episode_credits(
        &self,
        ids: &[UserId],
    ) -> Result<Vec<User>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = ids.iter().map(UserId::as_uuid).collect();
        let rows = sqlx::query_as::<_, UserRow>(concat!(
            "UPDATE users SET episode_credit_count = episode_credit_count + 1 \
             WHERE id = ANY($1) RETURNING ",
            user_columns!()
        ))
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        into_users(rows)
    }

    /// Users without an active subscription who want new-episode emails.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn fetch_free_episode_users(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users \
             LEFT JOIN subscriptions ON subscriptions.id = users.subscription_id \
             LEFT JOIN email_settings ON email_settings.user_id = users.id \
             WHERE (subscriptions.stripe_subscription_status IS NULL \
                    OR subscriptions.stripe_subscription_status != $1) \
             AND email_settings.newsletter = $2"
        ))
        .bind(screencast_core::SubscriptionStatus::Active.as_str())
        .bind(Newsletter::NewEpisode.as_str())
        .fetch_all(self.pool)
        .await?;

        into_users(rows)
    }
}

fn upsert_query<'q>(
    envelope: &'q GitHubUserEnvelope,
    email: &'q Email,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, UserRow, sqlx::postgres::PgArguments> {
    sqlx::query_as::<_, UserRow>(concat!(
        "INSERT INTO users (email, github_user_id, github_access_token, name, episode_credit_count) \
         VALUES ($1, $2, $3, $4, 1) \
         ON CONFLICT (github_user_id) DO UPDATE \
         SET github_access_token = $3, name = $4 \
         RETURNING ",
        user_columns!()
    ))
    .bind(email.as_str())
    .bind(envelope.user.id)
    .bind(envelope.access_token.access_token.as_str())
    .bind(envelope.user.name.as_deref())
}
