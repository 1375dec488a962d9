//! Database migration command.
//!
//! Applies the application schema, then creates the session table used by
//! tower-sessions. Both steps are idempotent.

use tower_sessions_sqlx_store::PostgresStore;

use screencast_web::db;

use super::{CommandError, connect};

/// Run all migrations.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or a statement fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    db::migrate(&pool).await?;

    PostgresStore::new(pool.clone())
        .migrate()
        .await
        .map_err(|e| CommandError::SessionStore(e.to_string()))?;

    tracing::info!("Migrations complete!");
    Ok(())
}
