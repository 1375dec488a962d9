//! Welcome reminder emails.
//!
//! Meant to run once a day. Each run emails the users who signed up exactly
//! one, two and three weeks earlier, still want welcome emails, and have not
//! subscribed.

use screencast_web::config::{EmailConfig, base_url_from_env};
use screencast_web::db::UserRepository;
use screencast_web::services::email::EmailService;

use super::{CommandError, connect};

/// Cohorts reminded on a default run.
const DEFAULT_WEEKS: [i32; 3] = [1, 2, 3];

/// Outcome of a run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub sent: usize,
    pub failed: usize,
}

/// Which cohorts to email.
fn cohorts(weeks_ago: Option<i32>) -> Vec<i32> {
    weeks_ago.map_or_else(|| DEFAULT_WEEKS.to_vec(), |weeks| vec![weeks])
}

/// Send reminders to each cohort.
///
/// A failed send is logged and counted; it does not stop the run.
///
/// # Errors
///
/// Returns `CommandError` if configuration is missing or a query fails.
pub async fn send(weeks_ago: Option<i32>) -> Result<Summary, CommandError> {
    let pool = connect().await?;
    let base_url = base_url_from_env()?;
    let email_config = EmailConfig::from_env()?;
    if email_config.is_none() {
        tracing::warn!("SMTP_HOST is not set; emails will be logged, not sent");
    }
    let mailer = EmailService::new(email_config.as_ref(), &base_url)
        .map_err(|e| CommandError::Smtp(e.to_string()))?;

    let users = UserRepository::new(&pool);
    let mut summary = Summary::default();
    for weeks in cohorts(weeks_ago) {
        let cohort = users.fetch_to_welcome(weeks).await?;
        tracing::info!(weeks, count = cohort.len(), "Sending welcome reminders");
        for user in &cohort {
            match mailer.send_welcome_reminder(user, weeks).await {
                Ok(()) => summary.sent += 1,
                Err(e) => {
                    tracing::error!(error = %e, user_id = %user.id, weeks, "Welcome reminder failed");
                    summary.failed += 1;
                }
            }
        }
    }

    tracing::info!(sent = summary.sent, failed = summary.failed, "Welcome reminders done");
    Ok(summary)
}
