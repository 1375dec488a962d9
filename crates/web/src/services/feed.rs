//! Private podcast feed for subscribers.
//!
//! Each user has a feed URL containing their id and a random salt. The salt
//! can be rotated to revoke a leaked URL. Only members of an active
//! subscription get episodes; everyone else gets a feed with a single item
//! explaining what is wrong, since podcast apps rarely surface HTTP errors.

use askama::Template;

use screencast_core::{Episode, RssSalt, SubscriptionStatus};

use crate::models::{Subscription, User};

/// Why a feed request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedDenial {
    /// No user with that id, or the salt does not match.
    InvalidUrl,
    /// The user is not on any subscription.
    NoSubscription,
    /// The subscription exists but does not grant access.
    Inactive(SubscriptionStatus),
}

impl FeedDenial {
    /// Explanation shown as the feed's only item.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::InvalidUrl => "This feed URL is no longer valid. Visit your account page \
                                 to get a fresh link."
                .to_string(),
            Self::NoSubscription => "Your account does not have a subscription. Subscribe to \
                                     get every episode in your podcast app."
                .to_string(),
            Self::Inactive(status) => format!(
                "Your subscription is {}. Update your payment details on your account page \
                 to keep receiving episodes.",
                status.as_str().replace('_', " ")
            ),
        }
    }
}

/// Decide whether `user` may read the feed addressed by `salt`.
///
/// `subscription` is the subscription the user is a member of, if any.
///
/// # Errors
///
/// Returns the reason access is refused.
pub fn check_access(
    user: Option<&User>,
    salt: RssSalt,
    subscription: Option<&Subscription>,
) -> Result<(), FeedDenial> {
    let user = user.ok_or(FeedDenial::InvalidUrl)?;
    if user.rss_salt != salt {
        return Err(FeedDenial::InvalidUrl);
    }
    let subscription = subscription.ok_or(FeedDenial::NoSubscription)?;
    if subscription.stripe_subscription_status != SubscriptionStatus::Active {
        return Err(FeedDenial::Inactive(subscription.stripe_subscription_status));
    }
    Ok(())
}

struct FeedItem {
    title: String,
    link: String,
    description: String,
    pub_date: String,
    duration: u32,
}

#[derive(Template)]
#[template(path = "feed/episodes.xml")]
struct FeedTemplate<'a> {
    title: &'a str,
    link: &'a str,
    description: &'a str,
    items: Vec<FeedItem>,
}

/// Render the full episode feed, newest first.
///
/// # Errors
///
/// Returns error if the template fails to render.
pub fn render_episodes(user: &User, base_url: &str) -> Result<String, askama::Error> {
    let items = Episode::all()
        .iter()
        .rev()
        .map(|episode| FeedItem {
            title: format!("#{}: {}", episode.sequence, episode.title),
            link: format!("{base_url}/episodes/{}", episode.sequence),
            description: episode.blurb.to_string(),
            pub_date: episode
                .published_on()
                .format("%a, %d %b %Y 00:00:00 +0000")
                .to_string(),
            duration: episode.length,
        })
        .collect();

    let title = format!("Screencast ({})", user.display_name());
    FeedTemplate {
        title: &title,
        link: base_url,
        description: "Every Screencast episode, for subscribers.",
        items,
    }
    .render()
}

/// Render a feed whose only item explains `denial`.
///
/// # Errors
///
/// Returns error if the template fails to render.
pub fn render_denial(denial: FeedDenial, base_url: &str) -> Result<String, askama::Error> {
    let account_url = format!("{base_url}/account");
    let message = denial.message();
    FeedTemplate {
        title: "Screencast",
        link: base_url,
        description: &message,
        items: vec![FeedItem {
            title: "Feed unavailable".to_string(),
            link: account_url,
            description: message.clone(),
            pub_date: chrono::Utc::now().to_rfc2822(),
            duration: 0,
        }],
    }
    .render()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use uuid::Uuid;

    use screencast_core::SubscriptionId;

    use super::*;
    use crate::models::user::tests::test_user;
    use crate::stripe;

    fn subscription(user: &User, status: SubscriptionStatus) -> Subscription {
        Subscription {
            id: SubscriptionId::new(Uuid::from_u128(9)),
            user_id: user.id,
            stripe_subscription_id: stripe::SubscriptionId::new("sub_test"),
            stripe_subscription_status: status,
            created_at: user.created_at,
        }
    }

    #[test]
    fn test_active_member_with_matching_salt_gets_access() {
        let user = test_user();
        let sub = subscription(&user, SubscriptionStatus::Active);
        assert_eq!(check_access(Some(&user), user.rss_salt, Some(&sub)), Ok(()));
    }

    #[test]
    fn test_wrong_salt_is_refused_before_subscription_check() {
        let user = test_user();
        let other = RssSalt::new(Uuid::from_u128(99));
        assert_eq!(
            check_access(Some(&user), other, None),
            Err(FeedDenial::InvalidUrl)
        );
        assert_eq!(check_access(None, other, None), Err(FeedDenial::InvalidUrl));
    }

    #[test]
    fn test_only_active_status_grants_access() {
        let user = test_user();
        assert_eq!(
            check_access(Some(&user), user.rss_salt, None),
            Err(FeedDenial::NoSubscription)
        );
        let sub = subscription(&user, SubscriptionStatus::PastDue);
        assert_eq!(
            check_access(Some(&user), user.rss_salt, Some(&sub)),
            Err(FeedDenial::Inactive(SubscriptionStatus::PastDue))
        );
        assert!(
            FeedDenial::Inactive(SubscriptionStatus::PastDue)
                .message()
                .contains("past due")
        );
    }

    #[test]
    fn test_render_episodes_lists_newest_first() {
        let xml = render_episodes(&test_user(), "http://localhost:8080").unwrap();
        let newest = Episode::all().last().unwrap();
        let first_item = xml.find("<item>").unwrap();
        let newest_link = xml
            .find(&format!("http://localhost:8080/episodes/{}", newest.sequence))
            .unwrap();
        assert!(newest_link > first_item);
        assert!(xml.contains("Screencast (Blob)"));
    }

    #[test]
    fn test_render_denial_has_single_item() {
        let xml = render_denial(FeedDenial::NoSubscription, "http://localhost:8080").unwrap();
        assert_eq!(xml.matches("<item>").count(), 1);
    }
}
