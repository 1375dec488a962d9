//! Admin dashboard.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{OriginalUri, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use screencast_core::UserId;

use super::Layout;
use crate::db::UserRepository;
use crate::error::AppError;
use crate::filters;
use crate::flash::Flash;
use crate::middleware::CurrentUser;
use crate::models::User;
use crate::pipeline::{RequireAdmin, RequireUser, StageExt, respond};
use crate::state::AppState;

/// Admin dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/index.html")]
pub struct AdminTemplate {
    pub layout: Layout,
    pub admins: Vec<User>,
    pub free_episode_users: Vec<User>,
}

/// Form for granting episode credits.
#[derive(Debug, Deserialize)]
pub struct GrantCreditsForm {
    /// User ids separated by commas or whitespace.
    pub user_ids: String,
}

impl GrantCreditsForm {
    /// Parse the submitted ids, reporting the first one that is malformed.
    ///
    /// # Errors
    ///
    /// Returns the offending token.
    pub fn parse_ids(&self) -> Result<Vec<UserId>, String> {
        let mut ids = Vec::new();
        for token in self
            .user_ids
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            let id = token.parse::<UserId>().map_err(|_| token.to_string())?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}

/// Admin dashboard.
///
/// # Route
///
/// `GET /admin`
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    flash: Option<Flash>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    let stage = RequireUser::new(uri.path()).then(RequireAdmin);

    respond(stage, (user, ()), |(admin, ())| async move {
        let users = UserRepository::new(state.pool());
        let admins = users.fetch_admins().await?;
        let free_episode_users = users.fetch_free_episode_users().await?;

        Ok::<_, AppError>(AdminTemplate {
            layout: Layout::new("Admin", Some(admin), flash),
            admins,
            free_episode_users,
        })
    })
    .await
}

/// Give each listed user one episode credit.
///
/// # Route
///
/// `POST /admin/episode-credits`
#[instrument(skip_all)]
pub async fn grant_credits(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<GrantCreditsForm>,
) -> Response {
    let stage = RequireUser::new("/admin").then(RequireAdmin);

    respond(stage, (user, ()), |(admin, ())| async move {
        let ids = match form.parse_ids() {
            Ok(ids) if ids.is_empty() => {
                return Flash::warning("No users selected.").redirect("/admin");
            }
            Ok(ids) => ids,
            Err(token) => {
                return Flash::error(format!("\"{token}\" is not a user id.")).redirect("/admin");
            }
        };

        match UserRepository::new(state.pool())
            .increment_episode_credits(&ids)
            .await
        {
            Ok(updated) => {
                tracing::info!(admin_id = %admin.id, count = updated.len(), "Episode credits granted");
                Flash::notice(format!("Granted an episode credit to {} users.", updated.len()))
                    .redirect("/admin")
            }
            Err(e) => AppError::from(e).into_response(),
        }
    })
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ids_accepts_commas_and_whitespace() {
        let form = GrantCreditsForm {
            user_ids: "00000000-0000-0000-0000-000000000001,\n\
                       00000000-0000-0000-0000-000000000002  00000000-0000-0000-0000-000000000001"
                .to_string(),
        };
        let ids = form.parse_ids().unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_parse_ids_reports_bad_token() {
        let form = GrantCreditsForm {
            user_ids: "00000000-0000-0000-0000-000000000001 blob".to_string(),
        };
        assert_eq!(form.parse_ids().unwrap_err(), "blob");
    }
}
