//! Command implementations.

pub mod credits;
pub mod migrate;
pub mod welcome;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use screencast_web::config::ConfigError;
use screencast_web::db::{self, RepositoryError};

/// Errors shared by every command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Query or migration failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Session table migration failed.
    #[error("Session store error: {0}")]
    SessionStore(String),

    /// Mail transport could not be built.
    #[error("SMTP error: {0}")]
    Smtp(String),

    /// A user id argument did not parse.
    #[error("Invalid user id: {0}")]
    InvalidUserId(String),
}

/// Connect to the database named by `DATABASE_URL`.
async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&database_url).await?)
}
