//! Current-user extractor and session helpers.
//!
//! The session holds only the signed-in user's id. The full record is loaded
//! from the database on each request, so account changes take effect
//! immediately.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use screencast_core::UserId;

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::{User, session_keys};
use crate::state::AppState;

/// The signed-in user, if any.
///
/// A session pointing at a user that no longer exists counts as signed out.
/// Pass the inner value to [`crate::pipeline::RequireUser`] to demand a user.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(CurrentUser(user): CurrentUser) -> impl IntoResponse {
///     match user {
///         Some(user) => format!("Hello, {}!", user.display_name()),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<User>);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(session) = parts.extensions.get::<Session>() else {
            return Ok(Self(None));
        };

        let Some(user_id) = session
            .get::<UserId>(session_keys::USER_ID)
            .await
            .ok()
            .flatten()
        else {
            return Ok(Self(None));
        };

        let user = UserRepository::new(state.pool())
            .fetch_by_id(user_id)
            .await
            .map_err(|e| AppError::from(e).into_response())?;

        match &user {
            Some(user) => set_sentry_user(&user.id, Some(user.email.as_str())),
            None => tracing::debug!(%user_id, "Session refers to a missing user"),
        }

        Ok(Self(user))
    }
}

/// Sign `user_id` in.
///
/// The session id is rotated to prevent fixation.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user_id: UserId,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::USER_ID, user_id).await
}

/// Sign out, discarding everything in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
