//! Request pipelines built from composable stages.
//!
//! A handler describes its preconditions as a chain of [`Stage`]s. Each stage
//! receives a context value and either continues with a new (usually wider)
//! context or halts with a finished response:
//!
//! ```rust,ignore
//! let stage = RequireUser::new(uri.path())
//!     .then(RequireStripeSubscription::new(state.pool(), state.stripe()))
//!     .then(FetchInvoices::new(state.stripe()));
//!
//! respond(stage, (user, ()), |(subscription, (invoices, (user, ())))| async move {
//!     render_invoices(subscription, invoices, user)
//! })
//! .await
//! ```
//!
//! Contexts are nested pairs `(head, tail)`. A guard only names the parts of
//! the context it inspects and passes the tail through untouched, so the
//! same guard works in front of any handler. Stages run strictly in the
//! order they are chained; once one halts, nothing after it runs.

use std::future::Future;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use screencast_core::{SubscriptionId, TeamInviteId};

use crate::db::{RepositoryError, SubscriptionRepository, TeamInviteRepository};
use crate::error::AppError;
use crate::flash::Flash;
use crate::models::{Subscription, TeamInvite, User};
use crate::stripe::{self, BillingApi, Invoice, InvoiceId, ListEnvelope};

/// Outcome of a single stage.
#[derive(Debug)]
pub enum Step<C> {
    /// Continue with this context.
    Next(C),
    /// Stop and send this response.
    Halt(Response),
}

impl<C> Step<C> {
    /// Halt with a redirect carrying a flash message.
    #[must_use]
    pub fn redirect(flash: Flash, to: &str) -> Self {
        Self::Halt(flash.redirect(to))
    }

    /// Halt with an error response.
    #[must_use]
    pub fn fail(error: impl Into<AppError>) -> Self {
        Self::Halt(error.into().into_response())
    }
}

/// One step of a request pipeline.
pub trait Stage<In>: Send + Sync {
    /// Context handed to the next stage.
    type Out: Send;

    /// Run the stage.
    fn call(&self, input: In) -> impl Future<Output = Step<Self::Out>> + Send;
}

/// Chaining for stages.
pub trait StageExt: Sized {
    /// Run `self`, then `next` on its output.
    fn then<B>(self, next: B) -> Then<Self, B> {
        Then {
            first: self,
            second: next,
        }
    }
}

/// Two stages run back to back. Built by [`StageExt::then`].
#[derive(Debug, Clone)]
pub struct Then<A, B> {
    first: A,
    second: B,
}

impl<In, A, B> Stage<In> for Then<A, B>
where
    In: Send,
    A: Stage<In>,
    B: Stage<A::Out>,
{
    type Out = B::Out;

    async fn call(&self, input: In) -> Step<B::Out> {
        match self.first.call(input).await {
            Step::Next(context) => self.second.call(context).await,
            Step::Halt(response) => Step::Halt(response),
        }
    }
}

impl<A, B> StageExt for Then<A, B> {}

/// A stage backed by an async closure.
#[derive(Debug, Clone)]
pub struct FnStage<F>(F);

/// Lift an async closure into a stage.
pub const fn stage_fn<F>(f: F) -> FnStage<F> {
    FnStage(f)
}

impl<In, Out, F, Fut> Stage<In> for FnStage<F>
where
    In: Send,
    Out: Send,
    F: Fn(In) -> Fut + Send + Sync,
    Fut: Future<Output = Step<Out>> + Send,
{
    type Out = Out;

    fn call(&self, input: In) -> impl Future<Output = Step<Out>> + Send {
        (self.0)(input)
    }
}

impl<F> StageExt for FnStage<F> {}

/// A guard that transforms the context or halts. Built by [`filter_map`].
#[derive(Debug, Clone)]
pub struct FilterMap<F, H> {
    f: F,
    otherwise: H,
}

/// Continue with `f(context)` when it is `Some`, otherwise halt with
/// `otherwise()`.
pub const fn filter_map<F, H>(f: F, otherwise: H) -> FilterMap<F, H> {
    FilterMap { f, otherwise }
}

impl<In, Out, F, H> Stage<In> for FilterMap<F, H>
where
    In: Send,
    Out: Send,
    F: Fn(In) -> Option<Out> + Send + Sync,
    H: Fn() -> Response + Send + Sync,
{
    type Out = Out;

    fn call(&self, input: In) -> impl Future<Output = Step<Out>> + Send {
        let step = match (self.f)(input) {
            Some(output) => Step::Next(output),
            None => Step::Halt((self.otherwise)()),
        };
        std::future::ready(step)
    }
}

impl<F, H> StageExt for FilterMap<F, H> {}

/// A guard that passes the context through unchanged or halts. Built by
/// [`filter`].
#[derive(Debug, Clone)]
pub struct Filter<P, H> {
    predicate: P,
    otherwise: H,
}

/// Continue when `predicate(&context)` holds, otherwise halt with
/// `otherwise()`.
pub const fn filter<P, H>(predicate: P, otherwise: H) -> Filter<P, H> {
    Filter {
        predicate,
        otherwise,
    }
}

impl<In, P, H> Stage<In> for Filter<P, H>
where
    In: Send,
    P: Fn(&In) -> bool + Send + Sync,
    H: Fn() -> Response + Send + Sync,
{
    type Out = In;

    fn call(&self, input: In) -> impl Future<Output = Step<In>> + Send {
        let step = if (self.predicate)(&input) {
            Step::Next(input)
        } else {
            Step::Halt((self.otherwise)())
        };
        std::future::ready(step)
    }
}

impl<P, H> StageExt for Filter<P, H> {}

/// Run `stage` on `context` and hand the result to `handler`.
///
/// Returns the halting response if any stage halts; `handler` is then
/// never called.
pub async fn respond<C, S, H, Fut, R>(stage: S, context: C, handler: H) -> Response
where
    S: Stage<C>,
    H: FnOnce(S::Out) -> Fut,
    Fut: Future<Output = R>,
    R: IntoResponse,
{
    match stage.call(context).await {
        Step::Next(context) => handler(context).await.into_response(),
        Step::Halt(response) => response,
    }
}

/// Plain 404 used by guards that should not reveal what exists.
#[must_use]
pub fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

/// Path of the login page that returns to `return_to` afterwards.
#[must_use]
pub fn login_path(return_to: &str) -> String {
    format!("/login?redirect={}", urlencoding::encode(return_to))
}

// =============================================================================
// Data lookups used by guards
// =============================================================================

/// The records guards need to read.
///
/// Implemented by `PgPool`; tests substitute an in-memory fake.
pub trait Lookup: Send + Sync {
    /// Fetch a subscription by id.
    fn subscription(
        &self,
        id: SubscriptionId,
    ) -> impl Future<Output = Result<Option<Subscription>, RepositoryError>> + Send;

    /// Fetch a team invite by id.
    fn team_invite(
        &self,
        id: TeamInviteId,
    ) -> impl Future<Output = Result<Option<TeamInvite>, RepositoryError>> + Send;
}

impl Lookup for sqlx::PgPool {
    async fn subscription(
        &self,
        id: SubscriptionId,
    ) -> Result<Option<Subscription>, RepositoryError> {
        SubscriptionRepository::new(self).fetch_by_id(id).await
    }

    async fn team_invite(&self, id: TeamInviteId) -> Result<Option<TeamInvite>, RepositoryError> {
        TeamInviteRepository::new(self).fetch(id).await
    }
}

// =============================================================================
// Guards
// =============================================================================

const LOGIN_REQUIRED: &str = "You must be logged in to access this page.";
const NO_SUBSCRIPTION: &str = "You don't have a subscription to manage.";
const BILLING_UNAVAILABLE: &str =
    "We had some trouble loading your subscription! Please try again later.";
const INVOICES_UNAVAILABLE: &str =
    "We had some trouble loading your invoices! Please try again later.";
const INVOICE_NOT_FOUND: &str =
    "We had some trouble loading your invoice! Please try again later.";
const INVITE_NOT_FOUND: &str = "Could not find that invite.";

/// Require a signed-in user: `(Option<User>, A)` to `(User, A)`.
///
/// Anonymous requests are sent to the login page, which returns them to
/// `return_to` once they sign in.
#[derive(Debug, Clone)]
pub struct RequireUser {
    return_to: String,
}

impl RequireUser {
    #[must_use]
    pub fn new(return_to: impl Into<String>) -> Self {
        Self {
            return_to: return_to.into(),
        }
    }
}

impl<A: Send> Stage<(Option<User>, A)> for RequireUser {
    type Out = (User, A);

    async fn call(&self, (user, rest): (Option<User>, A)) -> Step<(User, A)> {
        match user {
            Some(user) => Step::Next((user, rest)),
            None => Step::redirect(Flash::error(LOGIN_REQUIRED), &login_path(&self.return_to)),
        }
    }
}

impl StageExt for RequireUser {}

/// Require the user to be an admin. Everyone else gets a 404.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireAdmin;

impl<A: Send> Stage<(User, A)> for RequireAdmin {
    type Out = (User, A);

    async fn call(&self, (user, rest): (User, A)) -> Step<(User, A)> {
        if user.is_admin {
            Step::Next((user, rest))
        } else {
            Step::Halt(not_found())
        }
    }
}

impl StageExt for RequireAdmin {}

/// Load the Stripe subscription the user pays for:
/// `(User, A)` to `(stripe::Subscription, (User, A))`.
///
/// Teammates on someone else's subscription are turned away, since only the
/// owner can see billing details.
pub struct RequireStripeSubscription<'a, L, B> {
    lookup: &'a L,
    billing: &'a B,
}

impl<'a, L, B> RequireStripeSubscription<'a, L, B> {
    #[must_use]
    pub const fn new(lookup: &'a L, billing: &'a B) -> Self {
        Self { lookup, billing }
    }
}

impl<A, L, B> Stage<(User, A)> for RequireStripeSubscription<'_, L, B>
where
    A: Send,
    L: Lookup,
    B: BillingApi,
{
    type Out = (stripe::Subscription, (User, A));

    async fn call(&self, (user, rest): (User, A)) -> Step<Self::Out> {
        let Some(subscription_id) = user.subscription_id else {
            return Step::redirect(Flash::error(NO_SUBSCRIPTION), "/account");
        };

        let subscription = match self.lookup.subscription(subscription_id).await {
            Ok(Some(subscription)) if subscription.is_owned_by(user.id) => subscription,
            Ok(_) => return Step::redirect(Flash::error(NO_SUBSCRIPTION), "/account"),
            Err(e) => return Step::fail(e),
        };

        match self
            .billing
            .fetch_subscription(&subscription.stripe_subscription_id)
            .await
        {
            Ok(stripe_subscription) => Step::Next((stripe_subscription, (user, rest))),
            Err(e) => {
                tracing::warn!(error = %e, user_id = %user.id, "Failed to fetch Stripe subscription");
                Step::redirect(Flash::error(BILLING_UNAVAILABLE), "/account")
            }
        }
    }
}

impl<L, B> StageExt for RequireStripeSubscription<'_, L, B> {}

/// Load the subscription customer's invoices:
/// `(stripe::Subscription, A)` to `(stripe::Subscription, (ListEnvelope<Invoice>, A))`.
pub struct FetchInvoices<'a, B> {
    billing: &'a B,
}

impl<'a, B> FetchInvoices<'a, B> {
    #[must_use]
    pub const fn new(billing: &'a B) -> Self {
        Self { billing }
    }
}

impl<A, B> Stage<(stripe::Subscription, A)> for FetchInvoices<'_, B>
where
    A: Send,
    B: BillingApi,
{
    type Out = (stripe::Subscription, (ListEnvelope<Invoice>, A));

    async fn call(&self, (subscription, rest): (stripe::Subscription, A)) -> Step<Self::Out> {
        match self.billing.fetch_invoices(subscription.customer_id()).await {
            Ok(invoices) => Step::Next((subscription, (invoices, rest))),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch invoices");
                Step::redirect(Flash::error(INVOICES_UNAVAILABLE), "/account")
            }
        }
    }
}

impl<B> StageExt for FetchInvoices<'_, B> {}

/// Load one invoice and make sure it was billed to the subscription's
/// customer: `(stripe::Subscription, (User, InvoiceId))` to
/// `(stripe::Subscription, (User, Invoice))`.
pub struct RequireInvoice<'a, B> {
    billing: &'a B,
}

impl<'a, B> RequireInvoice<'a, B> {
    #[must_use]
    pub const fn new(billing: &'a B) -> Self {
        Self { billing }
    }
}

impl<B: BillingApi> Stage<(stripe::Subscription, (User, InvoiceId))> for RequireInvoice<'_, B> {
    type Out = (stripe::Subscription, (User, Invoice));

    async fn call(
        &self,
        (subscription, (user, invoice_id)): (stripe::Subscription, (User, InvoiceId)),
    ) -> Step<Self::Out> {
        match self.billing.fetch_invoice(&invoice_id).await {
            Ok(invoice) if &invoice.customer == subscription.customer_id() => {
                Step::Next((subscription, (user, invoice)))
            }
            Ok(_) => {
                tracing::warn!(user_id = %user.id, invoice_id = %invoice_id, "Invoice belongs to another customer");
                Step::redirect(Flash::error(INVOICE_NOT_FOUND), "/account/invoices")
            }
            Err(e) => {
                tracing::warn!(error = %e, invoice_id = %invoice_id, "Failed to fetch invoice");
                Step::redirect(Flash::error(INVOICE_NOT_FOUND), "/account/invoices")
            }
        }
    }
}

impl<B> StageExt for RequireInvoice<'_, B> {}

/// Load a team invite: `(TeamInviteId, A)` to `(TeamInvite, A)`.
pub struct RequireTeamInvite<'a, L> {
    lookup: &'a L,
}

impl<'a, L> RequireTeamInvite<'a, L> {
    #[must_use]
    pub const fn new(lookup: &'a L) -> Self {
        Self { lookup }
    }
}

impl<A, L> Stage<(TeamInviteId, A)> for RequireTeamInvite<'_, L>
where
    A: Send,
    L: Lookup,
{
    type Out = (TeamInvite, A);

    async fn call(&self, (invite_id, rest): (TeamInviteId, A)) -> Step<Self::Out> {
        match self.lookup.team_invite(invite_id).await {
            Ok(Some(invite)) => Step::Next((invite, rest)),
            Ok(None) => Step::redirect(Flash::warning(INVITE_NOT_FOUND), "/"),
            Err(e) => Step::fail(e),
        }
    }
}

impl<L> StageExt for RequireTeamInvite<'_, L> {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use axum::http::header::{LOCATION, SET_COOKIE};
    use uuid::Uuid;

    use screencast_core::{Email, SubscriptionStatus};

    use super::*;
    use crate::models::user::tests::test_user;
    use crate::stripe::models::tests::{invoice_json, subscription_json};
    use crate::stripe::{Coupon, CouponId, Customer, CustomerId, StripeError};

    /// In-memory billing provider.
    #[derive(Default)]
    pub(crate) struct FakeBilling {
        pub(crate) subscription: Option<stripe::Subscription>,
        pub(crate) invoices: Vec<Invoice>,
    }

    fn missing(what: &str) -> StripeError {
        StripeError::Api {
            status: 404,
            message: format!("No such {what}"),
        }
    }

    impl BillingApi for FakeBilling {
        async fn fetch_customer(&self, _id: &CustomerId) -> Result<Customer, StripeError> {
            Err(missing("customer"))
        }

        async fn fetch_subscription(
            &self,
            _id: &stripe::SubscriptionId,
        ) -> Result<stripe::Subscription, StripeError> {
            self.subscription.clone().ok_or_else(|| missing("subscription"))
        }

        async fn fetch_invoices(
            &self,
            customer: &CustomerId,
        ) -> Result<ListEnvelope<Invoice>, StripeError> {
            Ok(ListEnvelope {
                data: self
                    .invoices
                    .iter()
                    .filter(|invoice| &invoice.customer == customer)
                    .cloned()
                    .collect(),
                has_more: false,
            })
        }

        async fn fetch_invoice(&self, id: &InvoiceId) -> Result<Invoice, StripeError> {
            self.invoices
                .iter()
                .find(|invoice| &invoice.id == id)
                .cloned()
                .ok_or_else(|| missing("invoice"))
        }

        async fn fetch_coupon(&self, _id: &CouponId) -> Result<Coupon, StripeError> {
            Err(missing("coupon"))
        }

        async fn cancel_subscription(
            &self,
            _id: &stripe::SubscriptionId,
        ) -> Result<stripe::Subscription, StripeError> {
            self.subscription.clone().ok_or_else(|| missing("subscription"))
        }

        async fn reactivate_subscription(
            &self,
            _id: &stripe::SubscriptionId,
        ) -> Result<stripe::Subscription, StripeError> {
            self.subscription.clone().ok_or_else(|| missing("subscription"))
        }
    }

    /// In-memory records.
    #[derive(Default)]
    pub(crate) struct FakeLookup {
        pub(crate) subscriptions: Vec<Subscription>,
        pub(crate) invites: Vec<TeamInvite>,
    }

    impl Lookup for FakeLookup {
        async fn subscription(
            &self,
            id: SubscriptionId,
        ) -> Result<Option<Subscription>, RepositoryError> {
            Ok(self.subscriptions.iter().find(|s| s.id == id).cloned())
        }

        async fn team_invite(
            &self,
            id: TeamInviteId,
        ) -> Result<Option<TeamInvite>, RepositoryError> {
            Ok(self.invites.iter().find(|i| i.id == id).cloned())
        }
    }

    pub(crate) fn stripe_subscription(customer: &str) -> stripe::Subscription {
        serde_json::from_value(subscription_json(customer, "active")).unwrap()
    }

    fn invoice(id: &str, customer: &str) -> Invoice {
        serde_json::from_value(invoice_json(id, customer)).unwrap()
    }

    /// A user who owns subscription 9 and its local record.
    fn subscriber() -> (User, Subscription) {
        let mut user = test_user();
        let subscription = Subscription {
            id: SubscriptionId::new(Uuid::from_u128(9)),
            user_id: user.id,
            stripe_subscription_id: stripe::SubscriptionId::new("sub_test"),
            stripe_subscription_status: SubscriptionStatus::Active,
            created_at: user.created_at,
        };
        user.subscription_id = Some(subscription.id);
        (user, subscription)
    }

    fn location(response: &Response) -> &str {
        response.headers().get(LOCATION).unwrap().to_str().unwrap()
    }

    fn halted<C: std::fmt::Debug>(step: Step<C>) -> Response {
        match step {
            Step::Halt(response) => response,
            Step::Next(context) => panic!("expected halt, got {context:?}"),
        }
    }

    #[tokio::test]
    async fn test_then_runs_in_declaration_order() {
        let stage = stage_fn(|mut log: Vec<&'static str>| async move {
            log.push("first");
            Step::Next(log)
        })
        .then(stage_fn(|mut log: Vec<&'static str>| async move {
            log.push("second");
            Step::Next(log)
        }))
        .then(stage_fn(|mut log: Vec<&'static str>| async move {
            log.push("third");
            Step::Next(log)
        }));

        match stage.call(Vec::new()).await {
            Step::Next(log) => assert_eq!(log, ["first", "second", "third"]),
            Step::Halt(_) => panic!("unexpected halt"),
        }
    }

    #[tokio::test]
    async fn test_halt_skips_later_stages_and_handler() {
        let ran = AtomicBool::new(false);
        let stage = filter(|n: &i32| *n > 0, not_found).then(stage_fn(|n: i32| {
            ran.store(true, Ordering::SeqCst);
            std::future::ready(Step::Next(n))
        }));

        let handled = AtomicBool::new(false);
        let response = respond(stage, -1, |_| async {
            handled.store(true, Ordering::SeqCst);
            "handled"
        })
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!ran.load(Ordering::SeqCst));
        assert!(!handled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_filter_map_widens_context() {
        let stage = filter_map(
            |(raw, rest): (&'static str, ())| raw.parse::<i32>().ok().map(|n| (n, (raw, rest))),
            not_found,
        );

        let response = respond(stage, ("42", ()), |(n, (raw, ()))| async move {
            format!("{raw} -> {n}")
        })
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let parse = filter_map(|s: &'static str| s.parse::<i32>().ok(), not_found);
        let response = halted(parse.call("nope").await);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_require_user_redirects_to_login_with_flash() {
        let response = halted(RequireUser::new("/account/invoices").call((None, ())).await);

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?redirect=%2Faccount%2Finvoices");
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        let encoded = cookie
            .strip_prefix("flash=")
            .and_then(|rest| rest.split(';').next())
            .unwrap();
        assert_eq!(Flash::decode(encoded), Some(Flash::error(LOGIN_REQUIRED)));
    }

    #[tokio::test]
    async fn test_require_user_passes_user_through() {
        match RequireUser::new("/").call((Some(test_user()), 7)).await {
            Step::Next((user, rest)) => {
                assert_eq!(user.email, Email::parse("blob@pointfree.co").unwrap());
                assert_eq!(rest, 7);
            }
            Step::Halt(_) => panic!("unexpected halt"),
        }
    }

    #[tokio::test]
    async fn test_require_admin_hides_page_from_non_admins() {
        let stage = RequireUser::new("/admin").then(RequireAdmin);

        let response = respond(stage, (Some(test_user()), ()), |_| async { "admin" }).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let mut admin = test_user();
        admin.is_admin = true;
        let stage = RequireUser::new("/admin").then(RequireAdmin);
        let response = respond(stage, (Some(admin), ()), |_| async { "admin" }).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_require_stripe_subscription() {
        let (user, subscription) = subscriber();
        let lookup = FakeLookup {
            subscriptions: vec![subscription],
            ..FakeLookup::default()
        };
        let billing = FakeBilling {
            subscription: Some(stripe_subscription("cus_test")),
            ..FakeBilling::default()
        };
        let stage = RequireStripeSubscription::new(&lookup, &billing);

        match stage.call((user, ())).await {
            Step::Next((stripe_subscription, (user, ()))) => {
                assert_eq!(stripe_subscription.customer_id().as_str(), "cus_test");
                assert_eq!(user.display_name(), "Blob");
            }
            Step::Halt(_) => panic!("unexpected halt"),
        }

        let response = halted(stage.call((test_user(), ())).await);
        assert_eq!(location(&response), "/account");
    }

    #[tokio::test]
    async fn test_require_stripe_subscription_rejects_teammates() {
        let (_, subscription) = subscriber();
        let mut teammate = test_user();
        teammate.id = screencast_core::UserId::new(Uuid::from_u128(3));
        teammate.subscription_id = Some(subscription.id);

        let lookup = FakeLookup {
            subscriptions: vec![subscription],
            ..FakeLookup::default()
        };
        let billing = FakeBilling {
            subscription: Some(stripe_subscription("cus_test")),
            ..FakeBilling::default()
        };

        let response = halted(
            RequireStripeSubscription::new(&lookup, &billing)
                .call((teammate, ()))
                .await,
        );
        assert_eq!(location(&response), "/account");
    }

    #[tokio::test]
    async fn test_require_invoice_checks_customer() {
        let (user, subscription) = subscriber();
        let lookup = FakeLookup {
            subscriptions: vec![subscription],
            ..FakeLookup::default()
        };
        let billing = FakeBilling {
            subscription: Some(stripe_subscription("cus_test")),
            invoices: vec![invoice("in_mine", "cus_test"), invoice("in_theirs", "cus_other")],
        };
        let stage = || {
            RequireUser::new("/account/invoices")
                .then(RequireStripeSubscription::new(&lookup, &billing))
                .then(RequireInvoice::new(&billing))
        };

        let response = respond(
            stage(),
            (Some(user.clone()), InvoiceId::new("in_mine")),
            |(_, (_, invoice))| async move { invoice.id.to_string() },
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = respond(
            stage(),
            (Some(user), InvoiceId::new("in_theirs")),
            |_| async { "leaked" },
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/account/invoices");
    }

    #[tokio::test]
    async fn test_fetch_invoices_only_lists_customer_invoices() {
        let billing = FakeBilling {
            subscription: None,
            invoices: vec![invoice("in_mine", "cus_test"), invoice("in_theirs", "cus_other")],
        };

        match FetchInvoices::new(&billing)
            .call((stripe_subscription("cus_test"), ()))
            .await
        {
            Step::Next((_, (invoices, ()))) => {
                assert_eq!(invoices.data.len(), 1);
                assert_eq!(invoices.data.first().unwrap().id.as_str(), "in_mine");
            }
            Step::Halt(_) => panic!("unexpected halt"),
        }
    }

    #[tokio::test]
    async fn test_require_team_invite() {
        let inviter = test_user();
        let invite = TeamInvite {
            created_at: inviter.created_at,
            email: Email::parse("blob.jr@pointfree.co").unwrap(),
            id: TeamInviteId::new(Uuid::from_u128(5)),
            inviter_user_id: inviter.id,
        };
        let lookup = FakeLookup {
            invites: vec![invite.clone()],
            ..FakeLookup::default()
        };
        let stage = RequireTeamInvite::new(&lookup);

        match stage.call((invite.id, ())).await {
            Step::Next((found, ())) => assert_eq!(found.email, invite.email),
            Step::Halt(_) => panic!("unexpected halt"),
        }

        let response = halted(
            stage
                .call((TeamInviteId::new(Uuid::from_u128(6)), ()))
                .await,
        );
        assert_eq!(location(&response), "/");
    }
}
