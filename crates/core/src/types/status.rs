//! Status and category enums persisted as strings.
//!
//! Each enum round-trips through `as_str`/`FromStr` using the exact string
//! that is stored in the database and exchanged with external APIs.

use serde::{Deserialize, Serialize};

/// Error returned when a stored string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Subscription status, mirroring the billing provider's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Canceled,
    PastDue,
    Trialing,
    Unpaid,
}

impl SubscriptionStatus {
    /// The wire/database representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Canceled => "canceled",
            Self::PastDue => "past_due",
            Self::Trialing => "trialing",
            Self::Unpaid => "unpaid",
        }
    }

    /// Whether the subscription currently grants access to subscriber content.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "canceled" => Ok(Self::Canceled),
            "past_due" => Ok(Self::PastDue),
            "trialing" => Ok(Self::Trialing),
            "unpaid" => Ok(Self::Unpaid),
            _ => Err(UnknownVariant::new("subscription status", s)),
        }
    }
}

/// Newsletter categories a user can opt in to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Newsletter {
    Announcements,
    NewBlogPost,
    NewEpisode,
    WelcomeEmails,
}

impl Newsletter {
    /// Every newsletter; new registrations are opted in to all of them.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [
            Self::Announcements,
            Self::NewBlogPost,
            Self::NewEpisode,
            Self::WelcomeEmails,
        ]
    }

    /// Newsletters that remain relevant once someone has subscribed.
    #[must_use]
    pub const fn subscriber_newsletters() -> [Self; 3] {
        [Self::Announcements, Self::NewBlogPost, Self::NewEpisode]
    }

    /// The database representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Announcements => "announcements",
            Self::NewBlogPost => "newBlogPost",
            Self::NewEpisode => "newEpisode",
            Self::WelcomeEmails => "welcomeEmails",
        }
    }

    /// Label shown on the account settings form.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Announcements => "New announcements (very infrequently)",
            Self::NewBlogPost => "New blog posts (about once a week)",
            Self::NewEpisode => "New episode is available (about once a week)",
            Self::WelcomeEmails => "A few introductory emails for new members",
        }
    }
}

impl std::fmt::Display for Newsletter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Newsletter {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "announcements" => Ok(Self::Announcements),
            "newBlogPost" => Ok(Self::NewBlogPost),
            "newEpisode" => Ok(Self::NewEpisode),
            "welcomeEmails" => Ok(Self::WelcomeEmails),
            _ => Err(UnknownVariant::new("newsletter", s)),
        }
    }
}

/// Kinds of feed whose requests are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeedType {
    PrivateEpisodesFeed,
}

impl FeedType {
    /// The database representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PrivateEpisodesFeed => "privateEpisodesFeed",
        }
    }
}

impl std::str::FromStr for FeedType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "privateEpisodesFeed" => Ok(Self::PrivateEpisodesFeed),
            _ => Err(UnknownVariant::new("feed type", s)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_status_strings() {
        for status in [
            SubscriptionStatus::Active,
            SubscriptionStatus::Canceled,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Trialing,
            SubscriptionStatus::Unpaid,
        ] {
            assert_eq!(status.as_str().parse::<SubscriptionStatus>().unwrap(), status);
        }
        assert_eq!(SubscriptionStatus::PastDue.as_str(), "past_due");
    }

    #[test]
    fn test_subscription_status_serde_matches_stripe() {
        let status: SubscriptionStatus = serde_json::from_str("\"past_due\"").unwrap();
        assert_eq!(status, SubscriptionStatus::PastDue);
        assert!(!status.is_active());
        assert!(SubscriptionStatus::Trialing.is_active());
    }

    #[test]
    fn test_newsletter_strings_are_camel_case() {
        assert_eq!(Newsletter::NewBlogPost.as_str(), "newBlogPost");
        assert_eq!(
            "welcomeEmails".parse::<Newsletter>().unwrap(),
            Newsletter::WelcomeEmails
        );
        assert!("weekly".parse::<Newsletter>().is_err());
    }

    #[test]
    fn test_subscriber_newsletters_exclude_welcome_emails() {
        assert!(!Newsletter::subscriber_newsletters().contains(&Newsletter::WelcomeEmails));
        assert_eq!(Newsletter::all().len(), 4);
    }

    #[test]
    fn test_unknown_variant_message() {
        let err = "bogus".parse::<FeedType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown feed type: bogus");
    }
}
