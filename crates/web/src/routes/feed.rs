//! Private podcast feed route.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::instrument;

use screencast_core::{FeedType, RssSalt, UserId};

use crate::db::{FeedRequestEventRepository, SubscriptionRepository, UserRepository};
use crate::error::Result;
use crate::services::feed::{FeedDenial, check_access, render_denial, render_episodes};
use crate::state::AppState;

const RSS_CONTENT_TYPE: &str = "application/rss+xml; charset=utf-8";

fn rss(status: StatusCode, body: String) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(RSS_CONTENT_TYPE)),
            (header::CACHE_CONTROL, HeaderValue::from_static("private, no-cache")),
        ],
        body,
    )
        .into_response()
}

/// Serve a subscriber's episode feed.
///
/// Podcast apps rarely show HTTP errors, so a refused request still gets a
/// well-formed feed whose single item explains the problem.
///
/// # Route
///
/// `GET /account/rss/{user_id}/{rss_salt}`
#[instrument(skip_all)]
pub async fn private_feed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((user_id, salt)): Path<(String, String)>,
) -> Result<Response> {
    let base_url = state.config().base_url.as_str();
    let Some((user_id, salt)) = user_id
        .parse::<UserId>()
        .ok()
        .zip(salt.parse::<RssSalt>().ok())
    else {
        return Ok(rss(
            StatusCode::FORBIDDEN,
            render_denial(FeedDenial::InvalidUrl, base_url)?,
        ));
    };

    let user = UserRepository::new(state.pool()).fetch_by_id(user_id).await?;
    let subscription = match user.as_ref().and_then(|u| u.subscription_id) {
        Some(id) => SubscriptionRepository::new(state.pool()).fetch_by_id(id).await?,
        None => None,
    };

    if let Some(user) = user.as_ref().filter(|u| u.rss_salt == salt) {
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if let Err(e) = FeedRequestEventRepository::new(state.pool())
            .record(FeedType::PrivateEpisodesFeed, user_agent, user.id)
            .await
        {
            tracing::warn!(error = %e, user_id = %user.id, "Failed to record feed request");
        }
    }

    match check_access(user.as_ref(), salt, subscription.as_ref()) {
        Ok(()) => {
            let Some(user) = user else {
                return Ok(rss(
                    StatusCode::FORBIDDEN,
                    render_denial(FeedDenial::InvalidUrl, base_url)?,
                ));
            };
            Ok(rss(StatusCode::OK, render_episodes(&user, base_url)?))
        }
        Err(denial) => {
            tracing::info!(%user_id, ?denial, "Feed request refused");
            Ok(rss(StatusCode::FORBIDDEN, render_denial(denial, base_url)?))
        }
    }
}
