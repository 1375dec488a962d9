//! Team invite route handlers.
//!
//! Owners of an active subscription invite teammates by email. The invitee
//! follows the emailed link, signs in with GitHub and accepts, which attaches
//! their account to the owner's subscription.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use screencast_core::{Email, TeamInviteId};

use super::{Layout, active_subscription};
use crate::db::{SubscriptionRepository, TeamInviteRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::filters;
use crate::flash::Flash;
use crate::middleware::CurrentUser;
use crate::models::{TeamInvite, User};
use crate::pipeline::{
    RequireTeamInvite, RequireUser, Stage, StageExt, Step, filter, respond, stage_fn,
};
use crate::state::AppState;

const NOT_YOUR_INVITE: &str = "That invite belongs to someone else.";

/// Invite landing page template.
#[derive(Template, WebTemplate)]
#[template(path = "invites/show.html")]
pub struct InviteTemplate {
    pub layout: Layout,
    pub invite_id: TeamInviteId,
    pub invite_email: String,
    pub inviter_name: String,
    pub is_inviter: bool,
    pub signed_in: bool,
}

/// Form for sending an invite.
#[derive(Debug, Deserialize)]
pub struct InviteForm {
    pub email: String,
}

/// Reorders `(User, TeamInviteId)` so the invite can be loaded.
fn invite_for_user<'a>(
    lookup: &'a sqlx::PgPool,
    return_to: String,
) -> impl Stage<(Option<User>, TeamInviteId), Out = (TeamInvite, (User, ()))> + StageExt + 'a {
    RequireUser::new(return_to)
        .then(stage_fn(|(user, invite_id): (User, TeamInviteId)| async move {
            Step::Next((invite_id, (user, ())))
        }))
        .then(RequireTeamInvite::new(lookup))
}

/// Only the inviter may manage an invite.
fn require_inviter((invite, (user, ())): &(TeamInvite, (User, ()))) -> bool {
    invite.inviter_user_id == user.id
}

/// Show an invite.
///
/// # Route
///
/// `GET /invites/{id}`
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    flash: Option<Flash>,
    Path(invite_id): Path<TeamInviteId>,
) -> Response {
    let lookup_state = state.clone();
    let stage = RequireTeamInvite::new(lookup_state.pool());

    respond(stage, (invite_id, ()), |(invite, ())| async move {
        let inviter = UserRepository::new(state.pool())
            .fetch_by_id(invite.inviter_user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("inviter".to_string()))?;

        Ok::<_, AppError>(InviteTemplate {
            invite_id: invite.id,
            invite_email: invite.email.to_string(),
            inviter_name: inviter.display_name().to_string(),
            is_inviter: user.as_ref().is_some_and(|u| u.id == inviter.id),
            signed_in: user.is_some(),
            layout: Layout::new("Team invite", user, flash),
        })
    })
    .await
}

/// Send an invite from the signed-in owner.
///
/// # Route
///
/// `POST /invites`
#[instrument(skip_all)]
pub async fn send(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<InviteForm>,
) -> Response {
    respond(
        RequireUser::new("/account"),
        (user, ()),
        |(inviter, ())| async move {
            let Ok(email) = Email::parse(form.email.trim()) else {
                return Ok(Flash::error(format!(
                    "\"{}\" is not a valid email address.",
                    form.email.trim()
                ))
                .redirect("/account"));
            };

            let subscriptions = SubscriptionRepository::new(state.pool());
            let owned = subscriptions
                .fetch_by_owner_id(inviter.id)
                .await?
                .filter(crate::models::Subscription::is_active);
            if owned.is_none() {
                return Ok(Flash::error("You need an active subscription to invite teammates.")
                    .redirect("/account"));
            }

            let teammates = subscriptions.fetch_teammates_by_owner_id(inviter.id).await?;
            if inviter.email.matches(&email) || teammates.iter().any(|t| t.email.matches(&email)) {
                return Ok(Flash::warning(format!("{email} is already on your team."))
                    .redirect("/account"));
            }

            let invite = TeamInviteRepository::new(state.pool())
                .insert(&email, inviter.id)
                .await?;
            tracing::info!(invite_id = %invite.id, inviter_id = %inviter.id, "Team invite created");
            if let Err(e) = state.email().send_team_invite(&invite, &inviter).await {
                tracing::error!(error = %e, invite_id = %invite.id, "Failed to send team invite");
            }

            Ok::<_, AppError>(
                Flash::notice(format!("We've sent an invite to {email}!")).redirect("/account"),
            )
        },
    )
    .await
}

/// Join the inviter's team.
///
/// # Route
///
/// `POST /invites/{id}/accept`
#[instrument(skip_all)]
pub async fn accept(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(invite_id): Path<TeamInviteId>,
) -> Response {
    let lookup_state = state.clone();
    let stage = invite_for_user(lookup_state.pool(), format!("/invites/{invite_id}"));

    respond(stage, (user, invite_id), |(invite, (teammate, ()))| async move {
        accept_invite(&state, &invite, &teammate).await
    })
    .await
}

async fn accept_invite(state: &AppState, invite: &TeamInvite, teammate: &User) -> Result<Response> {
    let Some(inviter) = UserRepository::new(state.pool())
        .fetch_by_id(invite.inviter_user_id)
        .await?
    else {
        return Ok(Flash::warning("Could not find that invite.").redirect("/"));
    };

    let Some(subscription) = active_subscription(state, &inviter)
        .await?
        .filter(|s| s.is_owned_by(inviter.id))
    else {
        return Ok(Flash::error(
            "The inviter's subscription is no longer active, so this invite can't be accepted.",
        )
        .redirect("/account"));
    };

    SubscriptionRepository::new(state.pool())
        .add_user(teammate.id, subscription.id)
        .await?;
    TeamInviteRepository::new(state.pool())
        .delete(invite.id)
        .await?;
    tracing::info!(
        invite_id = %invite.id,
        teammate_id = %teammate.id,
        subscription_id = %subscription.id,
        "Team invite accepted"
    );

    if let Err(e) = state.email().send_invite_accepted(&inviter, teammate).await {
        tracing::error!(error = %e, "Failed to send invite accepted email");
    }

    Ok(Flash::notice(format!("You are now on {}'s team!", inviter.display_name()))
        .redirect("/account"))
}

/// Delete an invite.
///
/// # Route
///
/// `POST /invites/{id}/revoke`
#[instrument(skip_all)]
pub async fn revoke(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(invite_id): Path<TeamInviteId>,
) -> Response {
    let lookup_state = state.clone();
    let stage = invite_for_user(lookup_state.pool(), "/account".to_string()).then(filter(
        require_inviter,
        || Flash::error(NOT_YOUR_INVITE).redirect("/account"),
    ));

    respond(stage, (user, invite_id), |(invite, (_, ()))| async move {
        match TeamInviteRepository::new(state.pool()).delete(invite.id).await {
            Ok(()) => {
                Flash::notice(format!("The invite to {} has been revoked.", invite.email))
                    .redirect("/account")
            }
            Err(e) => AppError::from(e).into_response(),
        }
    })
    .await
}

/// Send an invite email again.
///
/// # Route
///
/// `POST /invites/{id}/resend`
#[instrument(skip_all)]
pub async fn resend(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(invite_id): Path<TeamInviteId>,
) -> Response {
    let lookup_state = state.clone();
    let stage = invite_for_user(lookup_state.pool(), "/account".to_string()).then(filter(
        require_inviter,
        || Flash::error(NOT_YOUR_INVITE).redirect("/account"),
    ));

    respond(stage, (user, invite_id), |(invite, (inviter, ()))| async move {
        state
            .email()
            .send_team_invite(&invite, &inviter)
            .await
            .map(|()| {
                Flash::notice(format!("We've resent the invite to {}.", invite.email))
                    .redirect("/account")
            })
            .map_err(AppError::from)
    })
    .await
}
