//! Home and gift landing pages.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use screencast_core::{Episode, EpisodeStats};

use super::{Layout, active_subscription};
use crate::error::Result;
use crate::filters;
use crate::flash::Flash;
use crate::middleware::CurrentUser;
use crate::state::AppState;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    /// Newest first.
    pub episodes: Vec<&'static Episode>,
    pub stats: EpisodeStats,
    pub is_subscriber: bool,
}

/// Gift landing page template.
#[derive(Template, WebTemplate)]
#[template(path = "gifts.html")]
pub struct GiftsTemplate {
    pub layout: Layout,
    pub stats: EpisodeStats,
}

/// Display the home page.
#[instrument(skip_all)]
pub async fn home(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    flash: Option<Flash>,
) -> Result<impl IntoResponse> {
    let is_subscriber = match &user {
        Some(user) => active_subscription(&state, user).await?.is_some(),
        None => false,
    };

    Ok(HomeTemplate {
        layout: Layout::new("Screencast", user, flash),
        episodes: Episode::all().iter().rev().collect(),
        stats: EpisodeStats::current(),
        is_subscriber,
    })
}

/// Display the gift subscriptions landing page.
pub async fn gifts(CurrentUser(user): CurrentUser, flash: Option<Flash>) -> impl IntoResponse {
    GiftsTemplate {
        layout: Layout::new("Gift Subscription", user, flash),
        stats: EpisodeStats::current(),
    }
}
