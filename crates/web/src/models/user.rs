//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use screencast_core::{Email, GitHubUserId, Newsletter, RssSalt, SubscriptionId, UserId};

/// A registered account.
///
/// Every account is tied to exactly one GitHub account. `subscription_id`
/// points at the subscription that grants access, which may be owned by a
/// teammate rather than by this user.
#[derive(Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub episode_credit_count: i32,
    pub github_user_id: GitHubUserId,
    #[serde(skip)]
    pub github_access_token: String,
    pub is_admin: bool,
    pub name: Option<String>,
    pub rss_salt: RssSalt,
    pub subscription_id: Option<SubscriptionId>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Name to greet the user with, falling back to their email.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.email.as_str())
    }

    /// Whether the user has episode credits left to spend.
    #[must_use]
    pub const fn has_credits(&self) -> bool {
        self.episode_credit_count > 0
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("episode_credit_count", &self.episode_credit_count)
            .field("github_user_id", &self.github_user_id)
            .field("github_access_token", &"[REDACTED]")
            .field("is_admin", &self.is_admin)
            .field("name", &self.name)
            .field("subscription_id", &self.subscription_id)
            .finish_non_exhaustive()
    }
}

/// A partial update to a user. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<Email>,
    /// Replaces the user's newsletter settings wholesale when present.
    pub newsletters: Option<Vec<Newsletter>>,
    pub episode_credit_count: Option<i32>,
}

impl UserUpdate {
    /// Whether applying this update would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.newsletters.is_none()
            && self.episode_credit_count.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use uuid::Uuid;

    use super::*;

    pub(crate) fn test_user() -> User {
        User {
            id: UserId::new(Uuid::from_u128(1)),
            email: Email::parse("blob@pointfree.co").unwrap(),
            episode_credit_count: 0,
            github_user_id: GitHubUserId::new(1),
            github_access_token: "gho_deadbeef".to_string(),
            is_admin: false,
            name: Some("Blob".to_string()),
            rss_salt: RssSalt::new(Uuid::from_u128(2)),
            subscription_id: None,
            created_at: DateTime::from_timestamp(1_517_206_175, 0).unwrap(),
        }
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let mut user = test_user();
        assert_eq!(user.display_name(), "Blob");
        user.name = Some("  ".to_string());
        assert_eq!(user.display_name(), "blob@pointfree.co");
        user.name = None;
        assert_eq!(user.display_name(), "blob@pointfree.co");
    }

    #[test]
    fn test_debug_redacts_token() {
        let debug = format!("{:?}", test_user());
        assert!(!debug.contains("gho_deadbeef"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_serialize_skips_token() {
        let json = serde_json::to_string(&test_user()).unwrap();
        assert!(!json.contains("gho_deadbeef"));
    }

    #[test]
    fn test_empty_update() {
        assert!(UserUpdate::default().is_empty());
        let update = UserUpdate {
            episode_credit_count: Some(3),
            ..UserUpdate::default()
        };
        assert!(!update.is_empty());
    }
}
