//! Account route handlers.
//!
//! Every route here requires a signed-in user. Billing pages additionally
//! require that the user owns a subscription whose Stripe record loads.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{OriginalUri, Path, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use screencast_core::{Email, Episode, Newsletter, SubscriptionStatus, UserId};

use super::Layout;
use crate::db::{
    EmailSettingRepository, EpisodeCreditRepository, RepositoryError, SubscriptionRepository,
    TeamInviteRepository, UserRepository,
};
use crate::error::{AppError, Result};
use crate::filters;
use crate::flash::Flash;
use crate::middleware::CurrentUser;
use crate::models::{TeamInvite, User, UserUpdate};
use crate::pipeline::{
    FetchInvoices, RequireInvoice, RequireStripeSubscription, RequireUser, StageExt, filter,
    respond,
};
use crate::state::AppState;
use crate::stripe::{self, BillingApi, Invoice, InvoiceId, ListEnvelope};

const DATE_FORMAT: &str = "%B %-d, %Y";

// =============================================================================
// View models
// =============================================================================

/// Summary of a Stripe subscription for the account page.
pub struct SubscriptionView {
    pub plan: String,
    pub status: String,
    pub quantity: u32,
    pub is_team: bool,
    pub period_end: String,
    pub is_canceling: bool,
    pub is_canceled: bool,
    pub discount: Option<String>,
    pub card: Option<String>,
}

impl From<&stripe::Subscription> for SubscriptionView {
    fn from(subscription: &stripe::Subscription) -> Self {
        Self {
            plan: subscription.plan.name.clone(),
            status: subscription.status.as_str().replace('_', " "),
            quantity: subscription.quantity,
            is_team: subscription.plan.id.is_team(),
            period_end: subscription
                .current_period_end
                .format(DATE_FORMAT)
                .to_string(),
            is_canceling: subscription.is_canceling(),
            is_canceled: subscription.status == SubscriptionStatus::Canceled,
            discount: subscription
                .discount
                .as_ref()
                .map(|d| d.coupon.formatted_description()),
            card: subscription
                .customer
                .object()
                .and_then(stripe::Customer::default_card)
                .map(card_description),
        }
    }
}

fn card_description(card: &stripe::Card) -> String {
    format!(
        "{} ending in {}, expires {:02}/{}",
        card.brand.as_str(),
        card.last4,
        card.exp_month,
        card.exp_year
    )
}

/// A newsletter checkbox on the settings form.
pub struct NewsletterOption {
    pub value: &'static str,
    pub label: &'static str,
    pub checked: bool,
}

/// An unlocked episode.
pub struct CreditView {
    pub sequence: i32,
    pub title: &'static str,
}

/// One row of the payment history.
pub struct InvoiceRow {
    pub id: String,
    pub number: String,
    pub date: String,
    pub total: String,
    pub paid: bool,
}

impl From<&Invoice> for InvoiceRow {
    fn from(invoice: &Invoice) -> Self {
        Self {
            id: invoice.id.to_string(),
            number: invoice
                .number
                .clone()
                .unwrap_or_else(|| invoice.id.to_string()),
            date: invoice.date.format(DATE_FORMAT).to_string(),
            total: invoice.total.to_dollars(),
            paid: invoice.amount_paid >= invoice.amount_due,
        }
    }
}

/// One line of an invoice.
pub struct LineView {
    pub description: String,
    pub quantity: u32,
    pub amount: String,
}

/// A printable invoice.
pub struct InvoiceView {
    pub number: String,
    pub date: String,
    pub period: String,
    pub lines: Vec<LineView>,
    pub subtotal: String,
    pub discount: Option<String>,
    pub total: String,
    pub amount_paid: String,
    pub card: Option<String>,
    pub bill_to: String,
    pub extra_info: Option<String>,
}

impl InvoiceView {
    fn new(invoice: &Invoice, subscription: &stripe::Subscription, user: &User) -> Self {
        let card = invoice
            .charge
            .as_ref()
            .and_then(stripe::Expandable::object)
            .map(|charge| card_description(&charge.source));
        let extra_info = subscription
            .customer
            .object()
            .and_then(stripe::Customer::extra_invoice_info)
            .map(String::from);

        Self {
            number: invoice
                .number
                .clone()
                .unwrap_or_else(|| invoice.id.to_string()),
            date: invoice.date.format(DATE_FORMAT).to_string(),
            period: format!(
                "{} to {}",
                invoice.period_start.format(DATE_FORMAT),
                invoice.period_end.format(DATE_FORMAT)
            ),
            lines: invoice
                .lines
                .data
                .iter()
                .map(|line| LineView {
                    description: line
                        .description
                        .clone()
                        .or_else(|| line.plan.as_ref().map(|plan| plan.name.clone()))
                        .unwrap_or_else(|| "Subscription".to_string()),
                    quantity: line.quantity,
                    amount: line.amount.to_dollars(),
                })
                .collect(),
            subtotal: invoice.subtotal.to_dollars(),
            discount: invoice
                .discount
                .as_ref()
                .map(|d| d.coupon.formatted_description()),
            total: invoice.total.to_dollars(),
            amount_paid: invoice.amount_paid.to_dollars(),
            card,
            bill_to: format!("{} <{}>", user.display_name(), user.email),
            extra_info,
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Account overview page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/show.html")]
pub struct AccountTemplate {
    pub layout: Layout,
    pub name: String,
    pub email: String,
    pub newsletters: Vec<NewsletterOption>,
    pub credit_count: i32,
    pub credits: Vec<CreditView>,
    pub has_subscription: bool,
    pub is_owner: bool,
    pub subscription_active: bool,
    pub subscription: Option<SubscriptionView>,
    pub teammates: Vec<User>,
    pub invites: Vec<TeamInvite>,
    pub feed_url: Option<String>,
}

/// Payment history template.
#[derive(Template, WebTemplate)]
#[template(path = "account/invoices.html")]
pub struct InvoicesTemplate {
    pub layout: Layout,
    pub invoices: Vec<InvoiceRow>,
}

/// Single invoice template.
#[derive(Template, WebTemplate)]
#[template(path = "account/invoice.html")]
pub struct InvoiceTemplate {
    pub layout: Layout,
    pub invoice: InvoiceView,
}

// =============================================================================
// Forms
// =============================================================================

/// Account settings form. Newsletter checkboxes are present only when ticked.
#[derive(Debug, Deserialize)]
pub struct AccountForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub announcements: Option<String>,
    #[serde(default, rename = "newBlogPost")]
    pub new_blog_post: Option<String>,
    #[serde(default, rename = "newEpisode")]
    pub new_episode: Option<String>,
    #[serde(default, rename = "welcomeEmails")]
    pub welcome_emails: Option<String>,
}

impl AccountForm {
    /// Newsletters whose boxes were ticked.
    #[must_use]
    pub fn newsletters(&self) -> Vec<Newsletter> {
        [
            (Newsletter::Announcements, &self.announcements),
            (Newsletter::NewBlogPost, &self.new_blog_post),
            (Newsletter::NewEpisode, &self.new_episode),
            (Newsletter::WelcomeEmails, &self.welcome_emails),
        ]
        .into_iter()
        .filter(|(_, ticked)| ticked.is_some())
        .map(|(newsletter, _)| newsletter)
        .collect()
    }

    /// Turn the form into an update.
    ///
    /// # Errors
    ///
    /// Returns a message for the user if the email is invalid.
    pub fn into_update(self) -> std::result::Result<UserUpdate, String> {
        let email = Email::parse(self.email.trim())
            .map_err(|_| format!("\"{}\" is not a valid email address.", self.email.trim()))?;
        let name = self.name.trim();
        Ok(UserUpdate {
            name: (!name.is_empty()).then(|| name.to_string()),
            email: Some(email),
            newsletters: Some(self.newsletters()),
            episode_credit_count: None,
        })
    }
}

// =============================================================================
// Handlers
// =============================================================================

struct AccountData {
    newsletters: Vec<NewsletterOption>,
    credits: Vec<CreditView>,
    subscription: Option<crate::models::Subscription>,
    stripe_subscription: Option<SubscriptionView>,
    teammates: Vec<User>,
    invites: Vec<TeamInvite>,
}

async fn load_account(state: &AppState, user: &User) -> Result<AccountData> {
    let settings = EmailSettingRepository::new(state.pool())
        .fetch_for_user(user.id)
        .await?;
    let newsletters = Newsletter::all()
        .into_iter()
        .map(|newsletter| NewsletterOption {
            value: newsletter.as_str(),
            label: newsletter.label(),
            checked: settings.iter().any(|s| s.newsletter == newsletter),
        })
        .collect();

    let credits = EpisodeCreditRepository::new(state.pool())
        .fetch_for_user(user.id)
        .await?
        .into_iter()
        .filter_map(|credit| Episode::find(credit.episode_sequence))
        .map(|episode| CreditView {
            sequence: episode.sequence,
            title: episode.title,
        })
        .collect();

    let subscriptions = SubscriptionRepository::new(state.pool());
    let subscription = match user.subscription_id {
        Some(id) => subscriptions.fetch_by_id(id).await?,
        None => None,
    };

    let owned = subscription.as_ref().filter(|s| s.is_owned_by(user.id));
    let (stripe_subscription, teammates, invites) = match owned {
        Some(owned) => {
            let stripe_subscription = match state
                .stripe()
                .fetch_subscription(&owned.stripe_subscription_id)
                .await
            {
                Ok(s) => Some(SubscriptionView::from(&s)),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to fetch Stripe subscription for account page");
                    None
                }
            };
            let teammates = subscriptions.fetch_teammates_by_owner_id(user.id).await?;
            let invites = TeamInviteRepository::new(state.pool())
                .fetch_for_inviter(user.id)
                .await?;
            (stripe_subscription, teammates, invites)
        }
        None => (None, Vec::new(), Vec::new()),
    };

    Ok(AccountData {
        newsletters,
        credits,
        subscription,
        stripe_subscription,
        teammates,
        invites,
    })
}

/// Display the account overview.
///
/// # Route
///
/// `GET /account`
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    flash: Option<Flash>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    respond(RequireUser::new(uri.path()), (user, ()), |(user, ())| async move {
        let data = load_account(&state, &user).await?;
        let subscription_active = data
            .subscription
            .as_ref()
            .is_some_and(crate::models::Subscription::is_active);
        let feed_url = subscription_active
            .then(|| state.config().url(&format!("/account/rss/{}/{}", user.id, user.rss_salt)));

        Ok::<_, AppError>(AccountTemplate {
            name: user.name.clone().unwrap_or_default(),
            email: user.email.to_string(),
            newsletters: data.newsletters,
            credit_count: user.episode_credit_count,
            credits: data.credits,
            has_subscription: data.subscription.is_some(),
            is_owner: data
                .subscription
                .as_ref()
                .is_some_and(|s| s.is_owned_by(user.id)),
            subscription_active,
            subscription: data.stripe_subscription,
            teammates: data.teammates,
            invites: data.invites,
            feed_url,
            layout: Layout::new("Account", Some(user), flash),
        })
    })
    .await
}

/// Update name, email and newsletter settings.
///
/// # Route
///
/// `POST /account`
#[instrument(skip_all)]
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<AccountForm>,
) -> Response {
    respond(RequireUser::new("/account"), (user, ()), |(user, ())| async move {
        let update = match form.into_update() {
            Ok(update) => update,
            Err(message) => return Flash::error(message).redirect("/account"),
        };

        match UserRepository::new(state.pool()).update(user.id, &update).await {
            Ok(_) => Flash::notice("We've updated your account settings.").redirect("/account"),
            Err(RepositoryError::Conflict(_)) => {
                Flash::error("That email address is already in use by another account.")
                    .redirect("/account")
            }
            Err(e) => AppError::from(e).into_response(),
        }
    })
    .await
}

/// Payment history.
///
/// # Route
///
/// `GET /account/invoices`
#[instrument(skip_all)]
pub async fn invoices(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    flash: Option<Flash>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    let stage = RequireUser::new(uri.path())
        .then(RequireStripeSubscription::new(state.pool(), state.stripe()))
        .then(FetchInvoices::new(state.stripe()));

    respond(
        stage,
        (user, ()),
        |(_, (invoices, (user, ()))): (_, (ListEnvelope<Invoice>, (User, ())))| async move {
            InvoicesTemplate {
                layout: Layout::new("Payment history", Some(user), flash),
                invoices: invoices.data.iter().map(InvoiceRow::from).collect(),
            }
        },
    )
    .await
}

/// A single invoice, printable.
///
/// # Route
///
/// `GET /account/invoices/{id}`
#[instrument(skip_all)]
pub async fn invoice(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    flash: Option<Flash>,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<String>,
) -> Response {
    let stage = RequireUser::new(uri.path())
        .then(RequireStripeSubscription::new(state.pool(), state.stripe()))
        .then(RequireInvoice::new(state.stripe()));

    respond(
        stage,
        (user, InvoiceId::new(id)),
        |(subscription, (user, invoice))| async move {
            InvoiceTemplate {
                invoice: InvoiceView::new(&invoice, &subscription, &user),
                layout: Layout::new("Invoice", Some(user), flash),
            }
        },
    )
    .await
}

/// Cancel the subscription at the end of the current period.
///
/// # Route
///
/// `POST /account/subscription/cancel`
#[instrument(skip_all)]
pub async fn cancel(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Response {
    let lookup_state = state.clone();
    let stage = RequireUser::new("/account")
        .then(RequireStripeSubscription::new(
            lookup_state.pool(),
            lookup_state.stripe(),
        ))
        .then(filter(
            |(subscription, _): &(stripe::Subscription, (User, ()))| subscription.is_renewing(),
            || Flash::error("Your subscription is already canceled.").redirect("/account"),
        ));

    respond(stage, (user, ()), |(subscription, (user, ()))| async move {
        sync_subscription(&state, &user, state.stripe().cancel_subscription(&subscription.id).await)
            .await
            .map(|()| {
                Flash::notice(
                    "We've canceled your subscription. You'll keep access until the end of \
                     the current billing period.",
                )
                .redirect("/account")
            })
    })
    .await
}

/// Undo a pending cancellation.
///
/// # Route
///
/// `POST /account/subscription/reactivate`
#[instrument(skip_all)]
pub async fn reactivate(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Response {
    let lookup_state = state.clone();
    let stage = RequireUser::new("/account")
        .then(RequireStripeSubscription::new(
            lookup_state.pool(),
            lookup_state.stripe(),
        ))
        .then(filter(
            |(subscription, _): &(stripe::Subscription, (User, ()))| subscription.is_canceling(),
            || Flash::error("Your subscription is not set to cancel.").redirect("/account"),
        ));

    respond(stage, (user, ()), |(subscription, (user, ()))| async move {
        let result = state
            .stripe()
            .reactivate_subscription(&subscription.id)
            .await;
        sync_subscription(&state, &user, result)
            .await
            .map(|()| Flash::notice("We've reactivated your subscription.").redirect("/account"))
    })
    .await
}

/// Store the status Stripe reported after a change.
async fn sync_subscription(
    state: &AppState,
    user: &User,
    result: std::result::Result<stripe::Subscription, stripe::StripeError>,
) -> Result<()> {
    let subscription = result?;
    SubscriptionRepository::new(state.pool())
        .update_stripe_subscription(&subscription)
        .await?;
    tracing::info!(
        user_id = %user.id,
        subscription = %subscription.id,
        cancel_at_period_end = subscription.cancel_at_period_end,
        "Subscription updated"
    );
    Ok(())
}

/// Remove a teammate from the owner's subscription.
///
/// # Route
///
/// `POST /account/teammates/{id}/remove`
#[instrument(skip_all)]
pub async fn remove_teammate(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(teammate_id): Path<UserId>,
) -> Response {
    respond(RequireUser::new("/account"), (user, ()), |(owner, ())| async move {
        if teammate_id == owner.id {
            return Ok(Flash::error("You can't remove yourself from your own subscription.")
                .redirect("/account"));
        }

        let subscriptions = SubscriptionRepository::new(state.pool());
        let Some(subscription) = subscriptions.fetch_by_owner_id(owner.id).await? else {
            return Ok(Flash::error("You don't have a subscription to manage.").redirect("/account"));
        };

        if !subscriptions
            .remove_teammate(teammate_id, subscription.id)
            .await?
        {
            return Ok(Flash::error("That person isn't on your team.").redirect("/account"));
        }

        tracing::info!(owner_id = %owner.id, %teammate_id, "Teammate removed");
        if let Some(teammate) = UserRepository::new(state.pool())
            .fetch_by_id(teammate_id)
            .await?
            && let Err(e) = state.email().send_teammate_removed(&owner, &teammate).await
        {
            tracing::error!(error = %e, "Failed to send teammate removed email");
        }

        Ok::<_, AppError>(Flash::notice("The teammate has been removed.").redirect("/account"))
    })
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::user::tests::test_user;
    use crate::pipeline::tests::stripe_subscription;
    use crate::stripe::models::tests::invoice_json;

    async fn form(email: &str, ticked: &[&str]) -> AccountForm {
        use axum::extract::FromRequest;

        let mut pairs = vec![format!("name=Blob%20Sr&email={}", urlencoding::encode(email))];
        pairs.extend(ticked.iter().map(|name| format!("{name}=on")));
        let request = axum::http::Request::builder()
            .method("POST")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(axum::body::Body::from(pairs.join("&")))
            .unwrap();
        Form::<AccountForm>::from_request(request, &())
            .await
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn test_account_form_collects_ticked_newsletters() {
        let update = form("blob@pointfree.co", &["announcements", "newEpisode"])
            .await
            .into_update()
            .unwrap();
        assert_eq!(
            update.newsletters,
            Some(vec![Newsletter::Announcements, Newsletter::NewEpisode])
        );
        assert_eq!(update.name.as_deref(), Some("Blob Sr"));
    }

    #[tokio::test]
    async fn test_account_form_rejects_bad_email() {
        let message = form("not-an-email", &[]).await.into_update().unwrap_err();
        assert!(message.contains("not-an-email"));
    }

    #[tokio::test]
    async fn test_unticked_form_clears_newsletters() {
        let update = form("blob@pointfree.co", &[]).await.into_update().unwrap();
        assert_eq!(update.newsletters, Some(Vec::new()));
    }

    #[test]
    fn test_subscription_view() {
        let view = SubscriptionView::from(&stripe_subscription("cus_test"));
        assert_eq!(view.plan, "Individual Monthly");
        assert_eq!(view.status, "active");
        assert!(!view.is_canceling);
        assert!(!view.is_team);
        assert_eq!(view.card, None);
    }

    #[test]
    fn test_invoice_view_bills_user() {
        let invoice: Invoice =
            serde_json::from_value(invoice_json("in_test", "cus_test")).unwrap();
        let view = InvoiceView::new(&invoice, &stripe_subscription("cus_test"), &test_user());
        assert_eq!(view.bill_to, "Blob <blob@pointfree.co>");
        assert!(!view.lines.is_empty());

        let row = InvoiceRow::from(&invoice);
        assert_eq!(row.id, "in_test");
    }
}
