//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                                  - Home page, episode list
//! GET  /gifts                             - Gift subscriptions landing page
//!
//! # Auth
//! GET  /login?redirect=                   - Redirect to GitHub authorization
//! GET  /github-auth?code=&state=          - OAuth callback
//! POST /logout                            - Sign out
//!
//! # Episodes
//! GET  /episodes/{sequence}               - Episode page
//! POST /episodes/{sequence}/credit        - Unlock with an episode credit
//!
//! # Account (requires a user)
//! GET  /account                           - Overview and settings
//! POST /account                           - Update name, email, newsletters
//! GET  /account/invoices                  - Payment history
//! GET  /account/invoices/{id}             - Single invoice
//! POST /account/subscription/cancel       - Cancel at period end
//! POST /account/subscription/reactivate   - Undo a pending cancellation
//! POST /account/teammates/{id}/remove     - Remove a teammate
//! GET  /account/rss/{user_id}/{rss_salt}  - Private podcast feed
//!
//! # Team invites
//! POST /invites                           - Send an invite
//! GET  /invites/{id}                      - Show an invite
//! POST /invites/{id}/accept               - Join the inviter's team
//! POST /invites/{id}/revoke               - Inviter deletes the invite
//! POST /invites/{id}/resend               - Inviter re-sends the email
//!
//! # Admin
//! GET  /admin                             - Dashboard
//! POST /admin/episode-credits             - Grant episode credits
//!
//! # Webhooks
//! POST /webhooks/stripe                   - Subscription status sync
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod episodes;
pub mod feed;
pub mod home;
pub mod invites;
pub mod webhooks;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::db::SubscriptionRepository;
use crate::error::Result;
use crate::filters;
use crate::flash::Flash;
use crate::middleware::{CurrentUser, RequestId, auth_rate_limiter, feed_rate_limiter};
use crate::models::{Subscription, User};
use crate::state::AppState;

/// Data every page layout needs.
pub struct Layout {
    pub title: String,
    pub user: Option<User>,
    pub flash: Option<Flash>,
}

impl Layout {
    #[must_use]
    pub fn new(title: impl Into<String>, user: Option<User>, flash: Option<Flash>) -> Self {
        Self {
            title: title.into(),
            user,
            flash,
        }
    }
}

/// Error page template.
#[derive(Template, WebTemplate)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub layout: Layout,
    pub heading: &'static str,
    pub request_id: String,
}

/// The subscription `user` belongs to, if it currently grants access.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn active_subscription(state: &AppState, user: &User) -> Result<Option<Subscription>> {
    let Some(id) = user.subscription_id else {
        return Ok(None);
    };
    let subscription = SubscriptionRepository::new(state.pool())
        .fetch_by_id(id)
        .await?;
    Ok(subscription.filter(Subscription::is_active))
}

/// 404 page for unknown paths.
async fn not_found(
    CurrentUser(user): CurrentUser,
    flash: Option<Flash>,
    request_id: RequestId,
) -> Response {
    let page = ErrorTemplate {
        layout: Layout::new("Not found", user, flash),
        heading: "We couldn't find that page.",
        request_id: request_id.0,
    };
    (StatusCode::NOT_FOUND, page).into_response()
}

/// Sign-in routes, rate limited per client IP.
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login))
        .route("/github-auth", get(auth::github_callback))
        .layer(auth_rate_limiter())
}

fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::show).post(account::update))
        .route("/invoices", get(account::invoices))
        .route("/invoices/{id}", get(account::invoice))
        .route("/subscription/cancel", post(account::cancel))
        .route("/subscription/reactivate", post(account::reactivate))
        .route("/teammates/{id}/remove", post(account::remove_teammate))
        .route(
            "/rss/{user_id}/{rss_salt}",
            get(feed::private_feed).layer(feed_rate_limiter()),
        )
}

fn invite_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(invites::send))
        .route("/{id}", get(invites::show))
        .route("/{id}/accept", post(invites::accept))
        .route("/{id}/revoke", post(invites::revoke))
        .route("/{id}/resend", post(invites::resend))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin::index))
        .route("/episode-credits", post(admin::grant_credits))
}

/// Create all page routes for the site.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/gifts", get(home::gifts))
        .merge(auth_routes())
        .route("/logout", post(auth::logout))
        .route("/episodes/{sequence}", get(episodes::show))
        .route("/episodes/{sequence}/credit", post(episodes::redeem_credit))
        .nest("/account", account_routes())
        .nest("/invites", invite_routes())
        .nest("/admin", admin_routes())
        .route("/webhooks/stripe", post(webhooks::stripe))
        .fallback(not_found)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        body::Body,
        http::{
            Request,
            header::{LOCATION, SET_COOKIE},
        },
    };
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::tests::test_config;

    /// Router over a pool that never connects; only usable for requests that
    /// halt before touching the database.
    fn app() -> Router {
        let config = test_config();
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/screencast_test")
            .unwrap();
        routes().with_state(AppState::new(config, pool).unwrap())
    }

    #[tokio::test]
    async fn test_account_pages_redirect_anonymous_users_to_login() {
        for path in ["/account", "/account/invoices", "/account/invoices/in_123", "/admin"] {
            let request = Request::builder().uri(path).body(Body::empty()).unwrap();
            let response = app().oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::SEE_OTHER, "path: {path}");
            let location = response.headers().get(LOCATION).unwrap().to_str().unwrap();
            assert_eq!(
                location,
                format!("/login?redirect={}", urlencoding::encode(path))
            );
            let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
            assert!(cookie.starts_with("flash="), "path: {path}");
        }
    }

    #[tokio::test]
    async fn test_anonymous_credit_redemption_redirects_to_login() {
        let request = Request::builder()
            .method("POST")
            .uri("/episodes/1/credit")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers().get(LOCATION).unwrap().to_str().unwrap();
        assert_eq!(
            location,
            format!("/login?redirect={}", urlencoding::encode("/episodes/1"))
        );
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("flash="));
    }

    #[tokio::test]
    async fn test_malformed_feed_url_gets_denial_feed() {
        let request = Request::builder()
            .uri("/account/rss/not-a-user/not-a-salt")
            .header("x-real-ip", "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/rss+xml; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_unsigned_webhook_is_rejected() {
        let request = Request::builder()
            .method("POST")
            .uri("/webhooks/stripe")
            .body(Body::from(r#"{"id":"evt_1"}"#))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
