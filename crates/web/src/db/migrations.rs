//! Schema migrations.
//!
//! Every statement is idempotent and the whole list runs on each
//! [`migrate`] call, so it is safe to run at every deploy. New schema
//! changes are appended; existing statements are never edited.
//!
//! Concurrent callers are serialised by a session-level advisory lock, so
//! several instances may migrate the same database at once.

use sqlx::{Executor, PgConnection, PgPool};
use tracing::instrument;

use super::RepositoryError;

/// Forward-only DDL, applied in order.
pub const STATEMENTS: &[&str] = &[
    r#"CREATE EXTENSION IF NOT EXISTS "pgcrypto""#,
    r#"CREATE EXTENSION IF NOT EXISTS "uuid-ossp""#,
    r#"CREATE EXTENSION IF NOT EXISTS "citext""#,
    r#"CREATE TABLE IF NOT EXISTS "users" (
        "id" uuid DEFAULT uuid_generate_v1mc() PRIMARY KEY NOT NULL,
        "email" citext NOT NULL UNIQUE,
        "github_user_id" bigint NOT NULL UNIQUE,
        "github_access_token" character varying NOT NULL,
        "name" character varying,
        "subscription_id" uuid,
        "created_at" timestamptz DEFAULT NOW() NOT NULL,
        "updated_at" timestamptz
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "subscriptions" (
        "id" uuid DEFAULT uuid_generate_v1mc() PRIMARY KEY NOT NULL,
        "user_id" uuid REFERENCES "users" ("id") NOT NULL,
        "stripe_subscription_id" character varying NOT NULL,
        "created_at" timestamptz DEFAULT NOW() NOT NULL,
        "updated_at" timestamptz
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "team_invites" (
        "id" uuid DEFAULT uuid_generate_v1mc() PRIMARY KEY NOT NULL,
        "email" character varying NOT NULL,
        "inviter_user_id" uuid REFERENCES "users" ("id") NOT NULL,
        "created_at" timestamptz DEFAULT NOW() NOT NULL,
        "updated_at" timestamptz
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "email_settings" (
        "newsletter" character varying NOT NULL,
        "user_id" uuid REFERENCES "users" ("id") NOT NULL
    )"#,
    r#"ALTER TABLE "subscriptions"
        ADD COLUMN IF NOT EXISTS "stripe_subscription_status" character varying NOT NULL DEFAULT 'active'"#,
    r#"ALTER TABLE "users"
        ADD COLUMN IF NOT EXISTS "is_admin" boolean NOT NULL DEFAULT FALSE"#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS "index_subscriptions_on_stripe_subscription_id"
        ON "subscriptions" ("stripe_subscription_id")"#,
    r#"CREATE TABLE IF NOT EXISTS "episode_credits" (
        "episode_sequence" integer NOT NULL,
        "user_id" uuid REFERENCES "users" ("id") NOT NULL
    )"#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS "index_episode_credits_on_episode_sequence_and_user_id"
        ON "episode_credits" ("episode_sequence", "user_id")"#,
    r#"ALTER TABLE "users"
        ADD COLUMN IF NOT EXISTS "episode_credit_count" integer NOT NULL DEFAULT 0"#,
    r#"ALTER TABLE "episode_credits"
        ADD COLUMN IF NOT EXISTS "created_at" timestamptz NOT NULL DEFAULT NOW()"#,
    r#"ALTER TABLE "users"
        ADD COLUMN IF NOT EXISTS "rss_salt" uuid NOT NULL DEFAULT uuid_generate_v1mc()"#,
    r#"CREATE TABLE IF NOT EXISTS "feed_request_events" (
        "id" uuid DEFAULT uuid_generate_v1mc() PRIMARY KEY NOT NULL,
        "type" character varying NOT NULL,
        "user_agent" character varying NOT NULL,
        "user_id" uuid REFERENCES "users" ("id") NOT NULL,
        "count" integer NOT NULL DEFAULT 1,
        "created_at" timestamptz NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS "index_feed_request_events_on_type_user_agent_user_id"
        ON "feed_request_events" ("type", "user_agent", "user_id")"#,
    r#"ALTER TABLE "feed_request_events"
        ADD COLUMN IF NOT EXISTS "updated_at" timestamptz NOT NULL DEFAULT NOW()"#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS "index_email_settings_on_newsletter_user_id"
        ON "email_settings" ("newsletter", "user_id")"#,
    r#"CREATE OR REPLACE FUNCTION update_updated_at()
        RETURNS TRIGGER AS $$
        BEGIN
            NEW."updated_at" = NOW();
            RETURN NEW;
        END;
        $$ LANGUAGE PLPGSQL"#,
    r#"DO $$
        DECLARE t text;
        BEGIN
            FOR t IN
                SELECT table_name FROM information_schema.columns
                WHERE column_name = 'updated_at' AND table_schema = 'public'
            LOOP
                EXECUTE format(
                    'DROP TRIGGER IF EXISTS update_updated_at ON %I;
                     CREATE TRIGGER update_updated_at
                     BEFORE UPDATE ON %I
                     FOR EACH ROW EXECUTE PROCEDURE update_updated_at()',
                    t, t
                );
            END LOOP;
        END;
        $$ LANGUAGE PLPGSQL"#,
];

/// Advisory lock key held while migrating.
pub const MIGRATION_LOCK_ID: i64 = 0x5C2E_A57D;

/// Apply every statement in [`STATEMENTS`] while holding
/// [`MIGRATION_LOCK_ID`].
///
/// # Errors
///
/// Returns `RepositoryError::Database` on the first failing statement.
#[instrument(skip(pool))]
pub async fn migrate(pool: &PgPool) -> Result<(), RepositoryError> {
    let mut conn = pool.acquire().await?;

    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(MIGRATION_LOCK_ID)
        .execute(&mut *conn)
        .await?;

    let applied = apply(&mut conn).await;

    // The lock belongs to the session, which goes back to the pool.
    let unlocked = sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(MIGRATION_LOCK_ID)
        .execute(&mut *conn)
        .await;

    applied?;
    unlocked?;
    tracing::info!(count = STATEMENTS.len(), "Migrations applied");
    Ok(())
}

async fn apply(conn: &mut PgConnection) -> Result<(), RepositoryError> {
    for (index, statement) in STATEMENTS.iter().enumerate() {
        tracing::debug!(index, "Applying migration statement");
        Executor::execute(&mut *conn, sqlx::raw_sql(statement)).await?;
    }
    Ok(())
}
