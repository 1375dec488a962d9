//! Stripe webhook endpoint.
//!
//! Keeps the local copy of each subscription's status in step with Stripe.
//! Deliveries are authenticated by their `Stripe-Signature` header before
//! anything else happens.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use tracing::instrument;

use crate::db::SubscriptionRepository;
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::stripe::webhook::{SIGNATURE_HEADER, WebhookError, verify_signature};
use crate::stripe::{BillingApi, Event, EventType, Invoice, Subscription};

/// Why a delivery was refused.
#[derive(Debug, PartialEq, Eq)]
pub enum Rejection {
    MissingSignature,
    BadSignature(WebhookError),
    MalformedEvent(String),
}

/// Authenticate and decode a delivery.
///
/// # Errors
///
/// Returns a [`Rejection`] if the signature is missing or wrong, or the body
/// is not a Stripe event.
pub fn parse_event(
    headers: &HeaderMap,
    body: &str,
    secret: &str,
    now: i64,
) -> std::result::Result<Event<serde_json::Value>, Rejection> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(Rejection::MissingSignature)?;
    verify_signature(signature, body, secret, now).map_err(Rejection::BadSignature)?;
    serde_json::from_str(body).map_err(|e| Rejection::MalformedEvent(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(event: Event<serde_json::Value>) -> Result<T> {
    serde_json::from_value(event.data.object)
        .map_err(|e| AppError::BadRequest(format!("unexpected event object: {e}")))
}

/// Receive a Stripe event.
///
/// Unknown event types are acknowledged and ignored. Failures while syncing
/// return 500 so Stripe retries the delivery.
///
/// # Route
///
/// `POST /webhooks/stripe`
#[instrument(skip_all)]
pub async fn stripe(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    let secret = state.config().stripe.webhook_secret.expose_secret();
    let event = match parse_event(&headers, &body, secret, chrono::Utc::now().timestamp()) {
        Ok(event) => event,
        Err(rejection) => {
            tracing::warn!(?rejection, "Rejected Stripe webhook");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let event_id = event.id.to_string();
    match handle(&state, event).await {
        Ok(()) => (StatusCode::OK, "ok").into_response(),
        Err(e) => {
            tracing::error!(error = %e, %event_id, "Failed to handle Stripe webhook");
            e.into_response()
        }
    }
}

async fn handle(state: &AppState, event: Event<serde_json::Value>) -> Result<()> {
    let event_type = event.event_type;
    tracing::info!(event_id = %event.id, ?event_type, "Stripe webhook received");

    let subscription = match event_type {
        EventType::CustomerSubscriptionDeleted => decode::<Subscription>(event)?,
        EventType::InvoicePaymentFailed | EventType::InvoicePaymentSucceeded => {
            let invoice = decode::<Invoice>(event)?;
            let Some(subscription_id) = invoice.subscription else {
                tracing::debug!(invoice_id = %invoice.id, "Invoice has no subscription");
                return Ok(());
            };
            state.stripe().fetch_subscription(&subscription_id).await?
        }
        EventType::Other => return Ok(()),
    };

    match SubscriptionRepository::new(state.pool())
        .update_stripe_subscription(&subscription)
        .await?
    {
        Some(local) => tracing::info!(
            subscription_id = %local.id,
            status = local.stripe_subscription_status.as_str(),
            "Subscription status synced"
        ),
        None => tracing::warn!(
            stripe_subscription_id = %subscription.id,
            "Webhook for unknown subscription"
        ),
    }
    Ok(())
}
