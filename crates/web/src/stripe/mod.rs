//! Stripe billing integration.
//!
//! - [`models`] - typed API objects (subscriptions, invoices, coupons, ...)
//! - [`client`] - [`StripeClient`], the reqwest-backed [`BillingApi`]
//! - [`webhook`] - `Stripe-Signature` verification for incoming events
//!
//! Handlers and pipeline guards depend on the [`BillingApi`] trait rather than
//! the concrete client so they can be exercised against an in-memory fake.

pub mod client;
pub mod models;
pub mod webhook;

use std::future::Future;

use thiserror::Error;

pub use client::StripeClient;
pub use models::{
    Card, Charge, Coupon, CouponId, Customer, CustomerId, Discount, Event, EventType, Expandable,
    Invoice, InvoiceId, ListEnvelope, Plan, PlanId, Subscription, SubscriptionId,
};

/// Errors that can occur when talking to Stripe.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// The billing operations the site performs.
pub trait BillingApi: Send + Sync {
    /// Fetch a customer with its card sources.
    fn fetch_customer(
        &self,
        id: &CustomerId,
    ) -> impl Future<Output = Result<Customer, StripeError>> + Send;

    /// Fetch a subscription with its customer expanded.
    fn fetch_subscription(
        &self,
        id: &SubscriptionId,
    ) -> impl Future<Output = Result<Subscription, StripeError>> + Send;

    /// List a customer's invoices, most recent first.
    fn fetch_invoices(
        &self,
        customer: &CustomerId,
    ) -> impl Future<Output = Result<ListEnvelope<Invoice>, StripeError>> + Send;

    /// Fetch a single invoice with its charge expanded.
    fn fetch_invoice(
        &self,
        id: &InvoiceId,
    ) -> impl Future<Output = Result<Invoice, StripeError>> + Send;

    /// Fetch a coupon by id.
    fn fetch_coupon(
        &self,
        id: &CouponId,
    ) -> impl Future<Output = Result<Coupon, StripeError>> + Send;

    /// Cancel a subscription at the end of the current period.
    fn cancel_subscription(
        &self,
        id: &SubscriptionId,
    ) -> impl Future<Output = Result<Subscription, StripeError>> + Send;

    /// Undo a pending cancellation.
    fn reactivate_subscription(
        &self,
        id: &SubscriptionId,
    ) -> impl Future<Output = Result<Subscription, StripeError>> + Send;
}
