//! Sign-in with GitHub.
//!
//! `/login` stores a random `state` and where to return to in the session,
//! then redirects to GitHub. `/github-auth` checks the state, exchanges the
//! code, registers or updates the user and signs them in.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::db::{RepositoryError, UserRepository};
use crate::error::{AppError, add_breadcrumb, clear_sentry_user};
use crate::flash::Flash;
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::session_keys;
use crate::state::AppState;

const SIGN_IN_FAILED: &str = "We couldn't sign you in with GitHub. Please try again.";

/// Query parameters for `/login`.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub redirect: Option<String>,
}

/// Query parameters GitHub sends to the callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Only site-relative paths are followed after sign-in.
fn safe_redirect(target: Option<&str>) -> &str {
    target
        .filter(|path| path.starts_with('/') && !path.starts_with("//"))
        .unwrap_or("/")
}

/// 256 bits of randomness, base64url encoded.
fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Start the GitHub OAuth flow.
///
/// # Route
///
/// `GET /login?redirect=`
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<LoginQuery>,
) -> Response {
    let oauth_state = generate_state();
    let redirect = safe_redirect(query.redirect.as_deref()).to_string();

    let stored = async {
        session
            .insert(session_keys::GITHUB_OAUTH_STATE, &oauth_state)
            .await?;
        session.insert(session_keys::LOGIN_REDIRECT, &redirect).await
    };
    if let Err(e) = stored.await {
        tracing::error!(error = %e, "Failed to store OAuth state in session");
        return Flash::error(SIGN_IN_FAILED).redirect("/");
    }

    let callback = state.config().url("/github-auth");
    Redirect::to(&state.github().authorize_url(&callback, &oauth_state)).into_response()
}

/// Handle the GitHub OAuth callback.
///
/// New accounts are opted in to every newsletter and sent a welcome email.
///
/// # Route
///
/// `GET /github-auth?code=&state=`
#[instrument(skip_all)]
pub async fn github_callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(error) = query.error {
        tracing::warn!(%error, "GitHub authorization denied");
        return Flash::warning("GitHub authorization was cancelled.").redirect("/");
    }

    let stored_state: Option<String> = session
        .remove(session_keys::GITHUB_OAUTH_STATE)
        .await
        .ok()
        .flatten();
    let redirect: String = session
        .remove(session_keys::LOGIN_REDIRECT)
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| "/".to_string());

    let (Some(code), Some(returned_state)) = (query.code, query.state) else {
        tracing::warn!("GitHub callback missing code or state");
        return Flash::error(SIGN_IN_FAILED).redirect("/");
    };
    if stored_state.as_deref() != Some(returned_state.as_str()) {
        tracing::warn!("GitHub callback state mismatch");
        return Flash::error(SIGN_IN_FAILED).redirect("/");
    }

    let (envelope, email) = match state.github().authenticate(&code).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, "GitHub authentication failed");
            return Flash::error(SIGN_IN_FAILED).redirect("/");
        }
    };

    let users = UserRepository::new(state.pool());
    let existing = match users.fetch_by_github_id(envelope.user.id).await {
        Ok(existing) => existing,
        Err(e) => return AppError::from(e).into_response(),
    };

    let result = if existing.is_some() {
        users.upsert_with_github(&envelope, &email).await
    } else {
        users.register_with_github(&envelope, &email).await
    };
    let user = match result {
        Ok(user) => user,
        Err(RepositoryError::Conflict(_)) => {
            return Flash::error(
                "That email address already belongs to another account. \
                 Change your primary email on GitHub and try again.",
            )
            .redirect("/");
        }
        Err(e) => return AppError::from(e).into_response(),
    };

    if existing.is_none() {
        tracing::info!(user_id = %user.id, "New user registered");
        if let Err(e) = state.email().send_registration(&user).await {
            tracing::error!(error = %e, user_id = %user.id, "Failed to send registration email");
        }
    }

    if let Err(e) = set_current_user(&session, user.id).await {
        tracing::error!(error = %e, "Failed to set session");
        return Flash::error(SIGN_IN_FAILED).redirect("/");
    }

    add_breadcrumb("auth", "Signed in with GitHub", None);
    Redirect::to(&redirect).into_response()
}

/// Sign out.
///
/// # Route
///
/// `POST /logout`
pub async fn logout(session: Session) -> Response {
    if let Err(e) = clear_current_user(&session).await {
        tracing::error!(error = %e, "Failed to clear session");
    }
    clear_sentry_user();
    Flash::notice("You are now logged out.").redirect("/")
}
