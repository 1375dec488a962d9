//! Typed Stripe API objects.
//!
//! Only the fields the site reads are modelled. Timestamps arrive as unix
//! seconds and amounts as integer cents.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use screencast_core::{Cents, SubscriptionStatus};

/// Define a string id newtype for a Stripe object.
macro_rules! stripe_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

stripe_id!(CardId);
stripe_id!(ChargeId);
stripe_id!(CouponId);
stripe_id!(CustomerId);
stripe_id!(EventId);
stripe_id!(InvoiceId);
stripe_id!(PlanId);
stripe_id!(SubscriptionId);
stripe_id!(TokenId);

impl PlanId {
    pub const INDIVIDUAL_MONTHLY: &'static str = "individual-monthly";
    pub const INDIVIDUAL_YEARLY: &'static str = "individual-yearly";
    pub const TEAM_MONTHLY: &'static str = "team-monthly";
    pub const TEAM_YEARLY: &'static str = "team-yearly";

    /// Whether this is one of the team plans (seats priced by quantity).
    #[must_use]
    pub fn is_team(&self) -> bool {
        self.0 == Self::TEAM_MONTHLY || self.0 == Self::TEAM_YEARLY
    }
}

/// Either a bare id or the expanded object.
///
/// Stripe returns related objects as ids unless the request asked for them
/// to be expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
#[serde(bound(
    serialize = "T: Serialize, T::Id: Serialize",
    deserialize = "T: Deserialize<'de>, T::Id: Deserialize<'de>"
))]
pub enum Expandable<T: Expand> {
    Id(T::Id),
    Object(Box<T>),
}

/// Objects that can appear expanded in place of their id.
pub trait Expand {
    type Id: Clone + Eq + std::fmt::Debug;

    fn id(&self) -> &Self::Id;
}

impl<T: Expand> Expandable<T> {
    /// The id, whether or not the object was expanded.
    #[must_use]
    pub fn id(&self) -> &T::Id {
        match self {
            Self::Id(id) => id,
            Self::Object(object) => object.id(),
        }
    }

    /// The expanded object, if present.
    #[must_use]
    pub fn object(&self) -> Option<&T> {
        match self {
            Self::Id(_) => None,
            Self::Object(object) => Some(object),
        }
    }
}

/// Card brand as reported by Stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Brand {
    Visa,
    #[serde(rename = "American Express")]
    AmericanExpress,
    MasterCard,
    Discover,
    #[serde(rename = "JCB")]
    Jcb,
    #[serde(rename = "Diners Club")]
    DinersClub,
    #[serde(other)]
    Unknown,
}

impl Brand {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Visa => "Visa",
            Self::AmericanExpress => "American Express",
            Self::MasterCard => "MasterCard",
            Self::Discover => "Discover",
            Self::Jcb => "JCB",
            Self::DinersClub => "Diners Club",
            Self::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub brand: Brand,
    pub customer: Option<CustomerId>,
    pub exp_month: u32,
    pub exp_year: i32,
    pub id: CardId,
    pub last4: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    pub amount: Cents,
    pub id: ChargeId,
    pub source: Card,
}

impl Expand for Charge {
    type Id = ChargeId;

    fn id(&self) -> &ChargeId {
        &self.id
    }
}

/// How long a coupon's discount applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duration {
    Forever,
    Once,
    Repeating { months: u32 },
}

/// A coupon's discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rate {
    AmountOff(Cents),
    PercentOff(u32),
}

impl Rate {
    /// e.g. `$5.00 off` or `25% off`.
    #[must_use]
    pub fn formatted_description(&self) -> String {
        match self {
            Self::AmountOff(cents) => format!("{} off", cents.to_dollars()),
            Self::PercentOff(percent) => format!("{percent}% off"),
        }
    }
}

/// A Stripe coupon.
///
/// Stripe spreads duration and rate across flat keys (`duration`,
/// `duration_in_months`, `amount_off`, `percent_off`); they are folded into
/// [`Duration`] and [`Rate`] on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CouponJson", into = "CouponJson")]
pub struct Coupon {
    pub duration: Duration,
    pub id: CouponId,
    pub name: Option<String>,
    pub rate: Rate,
    pub valid: bool,
}

impl Coupon {
    /// Human-readable summary shown on invoices and the account page.
    #[must_use]
    pub fn formatted_description(&self) -> String {
        let rate = self.rate.formatted_description();
        match self.duration {
            Duration::Forever => format!("{rate} every billing period"),
            Duration::Once => format!("{rate} the first billing period"),
            Duration::Repeating { months } => {
                format!("{rate} every billing period for the first {months} months")
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
struct CouponJson {
    id: CouponId,
    #[serde(default)]
    name: Option<String>,
    valid: bool,
    duration: String,
    #[serde(default)]
    duration_in_months: Option<u32>,
    #[serde(default)]
    amount_off: Option<Cents>,
    #[serde(default)]
    percent_off: Option<u32>,
}

impl TryFrom<CouponJson> for Coupon {
    type Error = String;

    fn try_from(json: CouponJson) -> Result<Self, Self::Error> {
        let duration = match json.duration.as_str() {
            "forever" => Duration::Forever,
            "once" => Duration::Once,
            "repeating" => Duration::Repeating {
                months: json
                    .duration_in_months
                    .ok_or("repeating coupon without duration_in_months")?,
            },
            other => return Err(format!("unknown coupon duration: {other}")),
        };
        let rate = match (json.amount_off, json.percent_off) {
            (Some(cents), _) => Rate::AmountOff(cents),
            (None, Some(percent)) => Rate::PercentOff(percent),
            (None, None) => return Err("coupon has neither amount_off nor percent_off".into()),
        };
        Ok(Self {
            duration,
            id: json.id,
            name: json.name,
            rate,
            valid: json.valid,
        })
    }
}

impl From<Coupon> for CouponJson {
    fn from(coupon: Coupon) -> Self {
        let (duration, duration_in_months) = match coupon.duration {
            Duration::Forever => ("forever", None),
            Duration::Once => ("once", None),
            Duration::Repeating { months } => ("repeating", Some(months)),
        };
        let (amount_off, percent_off) = match coupon.rate {
            Rate::AmountOff(cents) => (Some(cents), None),
            Rate::PercentOff(percent) => (None, Some(percent)),
        };
        Self {
            id: coupon.id,
            name: coupon.name,
            valid: coupon.valid,
            duration: duration.to_string(),
            duration_in_months,
            amount_off,
            percent_off,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default)]
    pub business_vat_id: Option<String>,
    #[serde(default)]
    pub default_source: Option<CardId>,
    pub id: CustomerId,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default = "ListEnvelope::empty")]
    pub sources: ListEnvelope<Card>,
}

impl Customer {
    /// Free-form billing details the customer asked to have printed on invoices.
    #[must_use]
    pub fn extra_invoice_info(&self) -> Option<&str> {
        self.metadata.get("extraInvoiceInfo").map(String::as_str)
    }

    /// The card charged by default, if it is among the listed sources.
    #[must_use]
    pub fn default_card(&self) -> Option<&Card> {
        let id = self.default_source.as_ref()?;
        self.sources.data.iter().find(|card| &card.id == id)
    }
}

impl Expand for Customer {
    type Id = CustomerId;

    fn id(&self) -> &CustomerId {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub coupon: Coupon,
}

/// Webhook event types the site reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "customer.subscription.deleted")]
    CustomerSubscriptionDeleted,
    #[serde(rename = "invoice.payment_failed")]
    InvoicePaymentFailed,
    #[serde(rename = "invoice.payment_succeeded")]
    InvoicePaymentSucceeded,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<T> {
    pub data: EventData<T>,
    pub id: EventId,
    #[serde(rename = "type")]
    pub event_type: EventType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData<T> {
    pub object: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// What is still owed on the invoice.
    #[serde(rename = "amount_remaining")]
    pub amount_due: Cents,
    pub amount_paid: Cents,
    #[serde(default)]
    pub charge: Option<Expandable<Charge>>,
    #[serde(default)]
    pub closed: bool,
    pub customer: CustomerId,
    #[serde(alias = "created", with = "chrono::serde::ts_seconds")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub discount: Option<Discount>,
    pub id: InvoiceId,
    pub lines: ListEnvelope<LineItem>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub period_start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub period_end: DateTime<Utc>,
    #[serde(default)]
    pub subscription: Option<SubscriptionId>,
    pub subtotal: Cents,
    pub total: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub amount: Cents,
    #[serde(default)]
    pub description: Option<String>,
    pub id: String,
    pub plan: Option<Plan>,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default)]
    pub subscription: Option<SubscriptionId>,
}

const fn one() -> u32 {
    1
}

/// Stripe's paginated list wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEnvelope<T> {
    pub data: Vec<T>,
    pub has_more: bool,
}

impl<T> ListEnvelope<T> {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            data: Vec::new(),
            has_more: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Usd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Month,
    Year,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub amount: Cents,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created: DateTime<Utc>,
    pub currency: Currency,
    pub id: PlanId,
    pub interval: Interval,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub statement_descriptor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionItem {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created: DateTime<Utc>,
    pub id: String,
    pub plan: Plan,
    #[serde(default = "one")]
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub canceled_at: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub current_period_start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub current_period_end: DateTime<Utc>,
    pub customer: Expandable<Customer>,
    #[serde(default)]
    pub discount: Option<Discount>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub ended_at: Option<DateTime<Utc>>,
    pub id: SubscriptionId,
    pub items: ListEnvelope<SubscriptionItem>,
    pub plan: Plan,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(alias = "start_date", with = "chrono::serde::ts_seconds")]
    pub start: DateTime<Utc>,
    pub status: SubscriptionStatus,
}

impl Subscription {
    /// Active but set to end when the current period does.
    #[must_use]
    pub fn is_canceling(&self) -> bool {
        self.status == SubscriptionStatus::Active && self.cancel_at_period_end
    }

    /// Will bill again at the end of the current period.
    #[must_use]
    pub fn is_renewing(&self) -> bool {
        self.status != SubscriptionStatus::Canceled && !self.cancel_at_period_end
    }

    #[must_use]
    pub fn customer_id(&self) -> &CustomerId {
        self.customer.id()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
}

/// Error body returned by the Stripe API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeErrorEnvelope {
    pub error: StripeErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeErrorBody {
    pub message: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use serde_json::json;

    use super::*;

    pub(crate) fn plan_json() -> serde_json::Value {
        json!({
            "amount": 1700,
            "created": 1_517_356_800,
            "currency": "usd",
            "id": "individual-monthly",
            "interval": "month",
            "metadata": {},
            "name": "Individual Monthly",
            "statement_descriptor": null
        })
    }

    pub(crate) fn subscription_json(customer: &str, status: &str) -> serde_json::Value {
        json!({
            "canceled_at": null,
            "cancel_at_period_end": false,
            "created": 1_517_356_800,
            "current_period_start": 1_517_356_800,
            "current_period_end": 1_519_776_000,
            "customer": customer,
            "discount": null,
            "ended_at": null,
            "id": "sub_test",
            "items": {
                "data": [{
                    "created": 1_517_356_800,
                    "id": "si_test",
                    "plan": plan_json(),
                    "quantity": 1
                }],
                "has_more": false
            },
            "plan": plan_json(),
            "quantity": 1,
            "start": 1_517_356_800,
            "status": status
        })
    }

    pub(crate) fn invoice_json(id: &str, customer: &str) -> serde_json::Value {
        json!({
            "amount_remaining": 0,
            "amount_paid": 1700,
            "charge": "ch_test",
            "closed": true,
            "customer": customer,
            "date": 1_517_356_800,
            "discount": null,
            "id": id,
            "lines": {
                "data": [{
                    "amount": 1700,
                    "description": null,
                    "id": "ii_test",
                    "plan": plan_json(),
                    "quantity": 1,
                    "subscription": "sub_test"
                }],
                "has_more": false
            },
            "number": "0000000-0001",
            "period_start": 1_517_356_800,
            "period_end": 1_519_776_000,
            "subscription": "sub_test",
            "subtotal": 1700,
            "total": 1700
        })
    }

    #[test]
    fn test_subscription_decodes_with_customer_id() {
        let sub: Subscription =
            serde_json::from_value(subscription_json("cus_test", "active")).unwrap();
        assert_eq!(sub.customer_id().as_str(), "cus_test");
        assert!(sub.customer.object().is_none());
        assert_eq!(sub.plan.interval, Interval::Month);
        assert!(sub.is_renewing());
        assert!(!sub.is_canceling());
    }

    #[test]
    fn test_subscription_decodes_with_expanded_customer() {
        let mut value = subscription_json("cus_test", "active");
        value["customer"] = json!({
            "id": "cus_expanded",
            "metadata": { "extraInvoiceInfo": "VAT 123" },
            "sources": { "data": [], "has_more": false }
        });
        let sub: Subscription = serde_json::from_value(value).unwrap();
        assert_eq!(sub.customer_id().as_str(), "cus_expanded");
        assert_eq!(
            sub.customer.object().unwrap().extra_invoice_info(),
            Some("VAT 123")
        );
    }

    #[test]
    fn test_canceling_and_renewing() {
        let mut sub: Subscription =
            serde_json::from_value(subscription_json("cus_test", "active")).unwrap();
        sub.cancel_at_period_end = true;
        assert!(sub.is_canceling());
        assert!(!sub.is_renewing());

        sub.status = SubscriptionStatus::Canceled;
        sub.cancel_at_period_end = false;
        assert!(!sub.is_canceling());
        assert!(!sub.is_renewing());
    }

    #[test]
    fn test_invoice_amount_due_reads_amount_remaining() {
        let mut value = invoice_json("in_test", "cus_test");
        value["amount_remaining"] = json!(500);
        let invoice: Invoice = serde_json::from_value(value).unwrap();
        assert_eq!(invoice.amount_due, Cents::new(500));
        assert_eq!(invoice.charge.unwrap().id().as_str(), "ch_test");
        assert_eq!(invoice.lines.data.len(), 1);
    }

    #[test]
    fn test_coupon_repeating_amount_off() {
        let coupon: Coupon = serde_json::from_value(json!({
            "id": "holiday",
            "name": null,
            "valid": true,
            "duration": "repeating",
            "duration_in_months": 3,
            "amount_off": 500,
            "percent_off": null
        }))
        .unwrap();
        assert_eq!(coupon.duration, Duration::Repeating { months: 3 });
        assert_eq!(coupon.rate, Rate::AmountOff(Cents::new(500)));
        assert_eq!(
            coupon.formatted_description(),
            "$5.00 off every billing period for the first 3 months"
        );
    }

    #[test]
    fn test_coupon_descriptions() {
        let mut coupon = Coupon {
            duration: Duration::Forever,
            id: CouponId::new("student"),
            name: Some("Student".into()),
            rate: Rate::PercentOff(50),
            valid: true,
        };
        assert_eq!(coupon.formatted_description(), "50% off every billing period");
        coupon.duration = Duration::Once;
        assert_eq!(
            coupon.formatted_description(),
            "50% off the first billing period"
        );
    }

    #[test]
    fn test_coupon_without_rate_is_rejected() {
        let result = serde_json::from_value::<Coupon>(json!({
            "id": "broken",
            "valid": true,
            "duration": "once"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_coupon_serializes_flat() {
        let coupon = Coupon {
            duration: Duration::Repeating { months: 6 },
            id: CouponId::new("c"),
            name: None,
            rate: Rate::PercentOff(10),
            valid: true,
        };
        let value = serde_json::to_value(&coupon).unwrap();
        assert_eq!(value["duration"], "repeating");
        assert_eq!(value["duration_in_months"], 6);
        assert_eq!(value["percent_off"], 10);
    }

    #[test]
    fn test_event_types() {
        let event: Event<serde_json::Value> = serde_json::from_value(json!({
            "id": "evt_1",
            "type": "invoice.payment_failed",
            "data": { "object": {} }
        }))
        .unwrap();
        assert_eq!(event.event_type, EventType::InvoicePaymentFailed);

        let event: Event<serde_json::Value> = serde_json::from_value(json!({
            "id": "evt_2",
            "type": "charge.refunded",
            "data": { "object": {} }
        }))
        .unwrap();
        assert_eq!(event.event_type, EventType::Other);
    }

    #[test]
    fn test_card_brand_names() {
        let brand: Brand = serde_json::from_str("\"American Express\"").unwrap();
        assert_eq!(brand, Brand::AmericanExpress);
        let brand: Brand = serde_json::from_str("\"UnionPay\"").unwrap();
        assert_eq!(brand, Brand::Unknown);
    }

    #[test]
    fn test_team_plan_ids() {
        assert!(PlanId::new(PlanId::TEAM_YEARLY).is_team());
        assert!(!PlanId::new(PlanId::INDIVIDUAL_MONTHLY).is_team());
    }
}
