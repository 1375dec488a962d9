//! Email service for account and team notifications.
//!
//! Uses SMTP via lettre for delivery with Askama HTML and text templates.
//! Without SMTP settings the service still renders every message but only
//! logs it, so development and test environments need no mail server.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::instrument;

use screencast_core::EpisodeStats;

use crate::config::EmailConfig;
use crate::filters;
use crate::models::{TeamInvite, User};

const SITE_NAME: &str = "Screencast";

#[derive(Template)]
#[template(path = "email/registration.html")]
struct RegistrationEmailHtml<'a> {
    name: &'a str,
    account_url: &'a str,
    stats: EpisodeStats,
}

#[derive(Template)]
#[template(path = "email/registration.txt")]
struct RegistrationEmailText<'a> {
    name: &'a str,
    account_url: &'a str,
    stats: EpisodeStats,
}

#[derive(Template)]
#[template(path = "email/team_invite.html")]
struct TeamInviteEmailHtml<'a> {
    inviter: &'a str,
    invite_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/team_invite.txt")]
struct TeamInviteEmailText<'a> {
    inviter: &'a str,
    invite_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/invite_accepted.html")]
struct InviteAcceptedEmailHtml<'a> {
    teammate: &'a str,
    account_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/invite_accepted.txt")]
struct InviteAcceptedEmailText<'a> {
    teammate: &'a str,
    account_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/teammate_removed.html")]
struct TeammateRemovedEmailHtml<'a> {
    owner: &'a str,
}

#[derive(Template)]
#[template(path = "email/teammate_removed.txt")]
struct TeammateRemovedEmailText<'a> {
    owner: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome_reminder.html")]
struct WelcomeReminderEmailHtml<'a> {
    name: &'a str,
    weeks_ago: i32,
    home_url: &'a str,
    stats: EpisodeStats,
}

#[derive(Template)]
#[template(path = "email/welcome_reminder.txt")]
struct WelcomeReminderEmailText<'a> {
    name: &'a str,
    weeks_ago: i32,
    home_url: &'a str,
    stats: EpisodeStats,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// A rendered message, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_address: String,
    base_url: String,
}

impl EmailService {
    /// Create a new email service. `None` config renders and logs messages
    /// without sending them.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: Option<&EmailConfig>, base_url: &str) -> Result<Self, SmtpError> {
        let (mailer, from_address) = match config {
            Some(config) => {
                let credentials = Credentials::new(
                    config.smtp_username.clone(),
                    config.smtp_password.expose_secret().to_string(),
                );

                let mailer =
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                        .port(config.smtp_port)
                        .credentials(credentials)
                        .build();
                (Some(mailer), config.from_address.clone())
            }
            None => (None, format!("{SITE_NAME} <noreply@localhost>")),
        };

        Ok(Self {
            mailer,
            from_address,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Whether messages are actually delivered.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.mailer.is_some()
    }

    /// Thank a new user for signing up.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn send_registration(&self, user: &User) -> Result<(), EmailError> {
        self.send(registration_email(user, &self.base_url)?).await
    }

    /// Invite someone to join the inviter's team subscription.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    #[instrument(skip(self, invite, inviter), fields(invite_id = %invite.id))]
    pub async fn send_team_invite(
        &self,
        invite: &TeamInvite,
        inviter: &User,
    ) -> Result<(), EmailError> {
        self.send(team_invite_email(invite, inviter, &self.base_url)?)
            .await
    }

    /// Tell a subscription owner that an invite was accepted.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_invite_accepted(
        &self,
        inviter: &User,
        teammate: &User,
    ) -> Result<(), EmailError> {
        let account_url = format!("{}/account", self.base_url);
        let teammate_name = teammate.display_name();
        let html = InviteAcceptedEmailHtml {
            teammate: teammate_name,
            account_url: &account_url,
        }
        .render()?;
        let text = InviteAcceptedEmailText {
            teammate: teammate_name,
            account_url: &account_url,
        }
        .render()?;

        self.send(OutgoingEmail {
            to: inviter.email.to_string(),
            subject: format!("{teammate_name} has accepted your invitation!"),
            text,
            html,
        })
        .await
    }

    /// Tell a teammate they were removed from a team.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_teammate_removed(&self, owner: &User, teammate: &User) -> Result<(), EmailError> {
        let owner_name = owner.display_name();
        let html = TeammateRemovedEmailHtml { owner: owner_name }.render()?;
        let text = TeammateRemovedEmailText { owner: owner_name }.render()?;

        self.send(OutgoingEmail {
            to: teammate.email.to_string(),
            subject: format!("You have been removed from {owner_name}'s {SITE_NAME} team"),
            text,
            html,
        })
        .await
    }

    /// Nudge a user who signed up `weeks_ago` weeks ago but never subscribed.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn send_welcome_reminder(&self, user: &User, weeks_ago: i32) -> Result<(), EmailError> {
        self.send(welcome_reminder_email(user, weeks_ago, &self.base_url)?)
            .await
    }

    /// Send a rendered message, or log it when SMTP is not configured.
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        let Some(mailer) = &self.mailer else {
            tracing::info!(
                to = %email.to,
                subject = %email.subject,
                "SMTP not configured, skipping email"
            );
            return Ok(());
        };

        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(email
                .to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(email.to.clone()))?)
            .subject(&email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html),
                    ),
            )?;

        mailer.send(message).await?;

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }
}

fn registration_email(user: &User, base_url: &str) -> Result<OutgoingEmail, EmailError> {
    let account_url = format!("{base_url}/account");
    let stats = EpisodeStats::current();
    let name = user.display_name();
    let html = RegistrationEmailHtml {
        name,
        account_url: &account_url,
        stats,
    }
    .render()?;
    let text = RegistrationEmailText {
        name,
        account_url: &account_url,
        stats,
    }
    .render()?;

    Ok(OutgoingEmail {
        to: user.email.to_string(),
        subject: format!("Thanks for signing up for {SITE_NAME}!"),
        text,
        html,
    })
}

fn team_invite_email(
    invite: &TeamInvite,
    inviter: &User,
    base_url: &str,
) -> Result<OutgoingEmail, EmailError> {
    let invite_url = format!("{base_url}/invites/{}", invite.id);
    let inviter_name = inviter.display_name();
    let html = TeamInviteEmailHtml {
        inviter: inviter_name,
        invite_url: &invite_url,
    }
    .render()?;
    let text = TeamInviteEmailText {
        inviter: inviter_name,
        invite_url: &invite_url,
    }
    .render()?;

    Ok(OutgoingEmail {
        to: invite.email.to_string(),
        subject: format!("You're invited to join {inviter_name}'s team on {SITE_NAME}"),
        text,
        html,
    })
}

fn welcome_reminder_email(
    user: &User,
    weeks_ago: i32,
    base_url: &str,
) -> Result<OutgoingEmail, EmailError> {
    let home_url = format!("{base_url}/");
    let stats = EpisodeStats::current();
    let name = user.display_name();
    let html = WelcomeReminderEmailHtml {
        name,
        weeks_ago,
        home_url: &home_url,
        stats,
    }
    .render()?;
    let text = WelcomeReminderEmailText {
        name,
        weeks_ago,
        home_url: &home_url,
        stats,
    }
    .render()?;

    let subject = match weeks_ago {
        1 => format!("Quick tour of {SITE_NAME}"),
        2 => format!("{} episodes and counting", stats.all_episode_count),
        _ => format!("Still thinking about {SITE_NAME}?"),
    };

    Ok(OutgoingEmail {
        to: user.email.to_string(),
        subject,
        text,
        html,
    })
}
