//! Episode pages and credit redemption.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use tracing::instrument;

use screencast_core::Episode;

use super::{Layout, active_subscription};
use crate::db::{EpisodeCreditRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::filters;
use crate::flash::Flash;
use crate::middleware::CurrentUser;
use crate::models::User;
use crate::pipeline::{RequireUser, Stage, StageExt, Step, filter_map, not_found, respond};
use crate::state::AppState;

/// How the viewer may watch an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Free for everyone.
    Free,
    /// Covered by an active subscription.
    Subscriber,
    /// Unlocked with an episode credit.
    Credit,
    /// Locked; `can_redeem` when the viewer has a credit to spend.
    Locked { can_redeem: bool },
}

impl Access {
    #[must_use]
    pub const fn is_unlocked(&self) -> bool {
        !matches!(self, Self::Locked { .. })
    }

    #[must_use]
    pub const fn can_redeem(&self) -> bool {
        matches!(self, Self::Locked { can_redeem: true })
    }
}

/// Decide access to `episode` given what we know about the viewer.
#[must_use]
pub fn access_for(
    episode: &Episode,
    user: Option<&User>,
    is_subscriber: bool,
    credited: bool,
) -> Access {
    if episode.is_free() {
        Access::Free
    } else if is_subscriber {
        Access::Subscriber
    } else if credited {
        Access::Credit
    } else {
        Access::Locked {
            can_redeem: user.is_some_and(User::has_credits),
        }
    }
}

/// Episode page template.
#[derive(Template, WebTemplate)]
#[template(path = "episodes/show.html")]
pub struct EpisodeTemplate {
    pub layout: Layout,
    pub episode: &'static Episode,
    pub access: Access,
    pub credit_count: i32,
}

async fn viewer_access(state: &AppState, episode: &Episode, user: Option<&User>) -> Result<Access> {
    let Some(user) = user else {
        return Ok(access_for(episode, None, false, false));
    };
    if episode.is_free() {
        return Ok(Access::Free);
    }
    let is_subscriber = active_subscription(state, user).await?.is_some();
    let credited = EpisodeCreditRepository::new(state.pool())
        .fetch_for_user(user.id)
        .await?
        .iter()
        .any(|credit| credit.episode_sequence == episode.sequence);
    Ok(access_for(episode, Some(user), is_subscriber, credited))
}

/// Find an episode the user can spend a credit on:
/// `(User, i32)` to `(&Episode, (User, ()))`.
pub struct RedeemableEpisode<'a> {
    state: &'a AppState,
}

impl<'a> RedeemableEpisode<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }
}

impl Stage<(User, i32)> for RedeemableEpisode<'_> {
    type Out = (&'static Episode, (User, ()));

    async fn call(&self, (user, sequence): (User, i32)) -> Step<Self::Out> {
        let Some(episode) = Episode::find(sequence) else {
            return Step::Halt(not_found());
        };
        let path = format!("/episodes/{}", episode.sequence);
        match viewer_access(self.state, episode, Some(&user)).await {
            Ok(Access::Locked { can_redeem: true }) => Step::Next((episode, (user, ()))),
            Ok(Access::Locked { can_redeem: false }) => Step::redirect(
                Flash::error("You don't have any episode credits left."),
                &path,
            ),
            Ok(_) => Step::redirect(
                Flash::notice("You already have access to this episode."),
                &path,
            ),
            Err(e) => Step::fail(e),
        }
    }
}

impl StageExt for RedeemableEpisode<'_> {}

/// Display an episode.
///
/// # Route
///
/// `GET /episodes/{sequence}`
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    flash: Option<Flash>,
    Path(sequence): Path<i32>,
) -> Response {
    let stage = filter_map(
        |(sequence, rest): (i32, ())| Episode::find(sequence).map(|episode| (episode, rest)),
        not_found,
    );

    respond(stage, (sequence, ()), |(episode, ())| async move {
        let access = viewer_access(&state, episode, user.as_ref()).await?;
        let credit_count = user.as_ref().map_or(0, |u| u.episode_credit_count);
        Ok::<_, AppError>(EpisodeTemplate {
            layout: Layout::new(format!("#{}: {}", episode.sequence, episode.title), user, flash),
            episode,
            access,
            credit_count,
        })
    })
    .await
}

/// Spend one episode credit to unlock an episode.
///
/// # Route
///
/// `POST /episodes/{sequence}/credit`
#[instrument(skip_all)]
pub async fn redeem_credit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(sequence): Path<i32>,
) -> Response {
    let lookup_state = state.clone();
    let stage = RequireUser::new(format!("/episodes/{sequence}"))
        .then(RedeemableEpisode::new(&lookup_state));

    respond(stage, (user, sequence), |(episode, (user, ()))| async move {
        let path = format!("/episodes/{}", episode.sequence);
        match EpisodeCreditRepository::new(state.pool())
            .redeem(episode.sequence, user.id)
            .await
        {
            Ok(user) => {
                tracing::info!(
                    user_id = %user.id,
                    episode = episode.sequence,
                    remaining = user.episode_credit_count,
                    "Episode credit redeemed"
                );
                Flash::notice("You now have access to this episode. Enjoy!").redirect(&path)
            }
            Err(RepositoryError::Conflict(_)) => {
                Flash::error("We couldn't use an episode credit for this episode.").redirect(&path)
            }
            Err(e) => AppError::from(e).into_response(),
        }
    })
    .await
}
