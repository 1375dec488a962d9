//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::WebConfig;
use crate::github::{GitHubClient, GitHubError};
use crate::services::email::EmailService;
use crate::stripe::{StripeClient, StripeError};

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("stripe client: {0}")]
    Stripe(#[from] StripeError),
    #[error("github client: {0}")]
    GitHub(#[from] GitHubError),
    #[error("smtp transport: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; holds the database pool, API clients and
/// mailer, each built once at startup.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: WebConfig,
    pool: PgPool,
    stripe: StripeClient,
    github: GitHubClient,
    email: EmailService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if an API client or the SMTP transport cannot be
    /// built from `config`.
    pub fn new(config: WebConfig, pool: PgPool) -> Result<Self, StateError> {
        let stripe = StripeClient::new(&config.stripe)?;
        let github = GitHubClient::new(&config.github)?;
        let email = EmailService::new(config.email.as_ref(), &config.base_url)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                stripe,
                github,
                email,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &WebConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Stripe billing client.
    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }

    /// GitHub OAuth client.
    #[must_use]
    pub fn github(&self) -> &GitHubClient {
        &self.inner.github
    }

    /// Transactional email; a no-op when SMTP is not configured.
    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }
}
