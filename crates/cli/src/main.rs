//! Screencast CLI - database migrations and scheduled jobs.
//!
//! # Usage
//!
//! ```bash
//! # Create or update the schema
//! sc-cli migrate
//!
//! # Send welcome reminders to users who signed up 1, 2 and 3 weeks ago
//! sc-cli welcome-emails
//!
//! # Only the two-week cohort
//! sc-cli welcome-emails --weeks-ago 2
//!
//! # Give one episode credit to specific users, or to every free user
//! sc-cli episode-credits grant --user-id 6f1c...
//! sc-cli episode-credits grant --free-episode-users
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `BASE_URL` - public site URL, for links in emails
//! - `SMTP_*`, `EMAIL_FROM` - outgoing mail (see the web crate's config)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sc-cli")]
#[command(author, version, about = "Screencast CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Send welcome reminder emails to recent sign-ups without a subscription
    WelcomeEmails {
        /// Only the cohort that signed up this many weeks ago (default: 1, 2 and 3)
        #[arg(long)]
        weeks_ago: Option<i32>,
    },
    /// Manage episode credits
    EpisodeCredits {
        #[command(subcommand)]
        action: CreditAction,
    },
}

#[derive(Subcommand)]
enum CreditAction {
    /// Give one episode credit to each selected user
    Grant {
        /// User id to credit (repeatable)
        #[arg(long = "user-id")]
        user_ids: Vec<String>,

        /// Credit every user without an active subscription who wants
        /// new-episode emails
        #[arg(long)]
        free_episode_users: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::WelcomeEmails { weeks_ago } => {
            commands::welcome::send(weeks_ago).await?;
        }
        Commands::EpisodeCredits { action } => match action {
            CreditAction::Grant {
                user_ids,
                free_episode_users,
            } => {
                commands::credits::grant(&user_ids, free_episode_users).await?;
            }
        },
    }
    Ok(())
}
