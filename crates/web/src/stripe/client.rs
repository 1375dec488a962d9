//! reqwest-backed Stripe client.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::instrument;

use super::models::StripeErrorEnvelope;
use super::{
    BillingApi, Coupon, CouponId, Customer, CustomerId, Invoice, InvoiceId, ListEnvelope,
    StripeError, Subscription, SubscriptionId,
};
use crate::config::StripeConfig;

/// Maximum page size Stripe accepts for list endpoints.
const LIST_LIMIT: &str = "100";

/// Stripe REST API client.
///
/// Authenticates with the secret key as a bearer token and sends
/// form-encoded bodies, as the Stripe API expects.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
}

impl StripeClient {
    /// Create a new Stripe API client.
    ///
    /// # Errors
    ///
    /// Returns error if the secret key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, StripeError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| StripeError::Parse(format!("Invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, StripeError> {
        let url = url::Url::parse_with_params(&format!("{}{path}", self.api_base), query)
            .map_err(|e| StripeError::Parse(format!("Invalid URL: {e}")))?;
        let response = self.client.get(url).send().await?;
        decode(response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<T, StripeError> {
        let url = format!("{}{path}", self.api_base);
        let response = self.client.post(&url).form(form).send().await?;
        decode(response).await
    }
}

/// Decode a successful body or turn Stripe's error envelope into an error.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, StripeError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .map_or(body, |envelope| envelope.error.message);
        return Err(StripeError::Api {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| StripeError::Parse(e.to_string()))
}

impl BillingApi for StripeClient {
    #[instrument(skip(self))]
    async fn fetch_customer(&self, id: &CustomerId) -> Result<Customer, StripeError> {
        self.get(&format!("/customers/{id}"), &[]).await
    }

    #[instrument(skip(self))]
    async fn fetch_subscription(&self, id: &SubscriptionId) -> Result<Subscription, StripeError> {
        self.get(
            &format!("/subscriptions/{id}"),
            &[("expand[]", "customer")],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn fetch_invoices(
        &self,
        customer: &CustomerId,
    ) -> Result<ListEnvelope<Invoice>, StripeError> {
        self.get(
            "/invoices",
            &[
                ("customer", customer.as_str()),
                ("limit", LIST_LIMIT),
                ("expand[]", "data.charge"),
            ],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn fetch_invoice(&self, id: &InvoiceId) -> Result<Invoice, StripeError> {
        self.get(&format!("/invoices/{id}"), &[("expand[]", "charge")])
            .await
    }

    #[instrument(skip(self))]
    async fn fetch_coupon(&self, id: &CouponId) -> Result<Coupon, StripeError> {
        self.get(&format!("/coupons/{id}"), &[]).await
    }

    #[instrument(skip(self))]
    async fn cancel_subscription(&self, id: &SubscriptionId) -> Result<Subscription, StripeError> {
        self.post(
            &format!("/subscriptions/{id}"),
            &[("cancel_at_period_end", "true"), ("expand[]", "customer")],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn reactivate_subscription(
        &self,
        id: &SubscriptionId,
    ) -> Result<Subscription, StripeError> {
        self.post(
            &format!("/subscriptions/{id}"),
            &[("cancel_at_period_end", "false"), ("expand[]", "customer")],
        )
        .await
    }
}
