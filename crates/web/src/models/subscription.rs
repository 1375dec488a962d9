//! Subscription and team invite domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use screencast_core::{Email, SubscriptionId, SubscriptionStatus, TeamInviteId, UserId};

use crate::stripe;

/// A local record of a Stripe subscription.
///
/// `user_id` is the owner who pays; teammates reference the subscription
/// through their own `users.subscription_id`.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub stripe_subscription_id: stripe::SubscriptionId,
    pub stripe_subscription_status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// Whether the subscription currently grants access.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.stripe_subscription_status.is_active()
    }

    /// Whether `user` pays for this subscription.
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.user_id == user
    }
}

/// An outstanding invitation to join a subscription owner's team.
#[derive(Debug, Clone, Serialize)]
pub struct TeamInvite {
    pub created_at: DateTime<Utc>,
    pub email: Email,
    pub id: TeamInviteId,
    pub inviter_user_id: UserId,
}
