//! Per-user activity records: newsletter settings, episode credits and
//! feed requests.

use chrono::{DateTime, Utc};
use serde::Serialize;

use screencast_core::{FeedRequestEventId, FeedType, Newsletter, UserId};

/// A user's opt-in to one newsletter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmailSetting {
    pub newsletter: Newsletter,
    pub user_id: UserId,
}

/// A subscriber-only episode unlocked with a credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EpisodeCredit {
    pub episode_sequence: i32,
    pub user_id: UserId,
}

/// Aggregated count of feed fetches per (feed, user agent, user).
#[derive(Debug, Clone, Serialize)]
pub struct FeedRequestEvent {
    pub id: FeedRequestEventId,
    pub feed_type: FeedType,
    pub user_agent: String,
    pub user_id: UserId,
    pub count: i32,
    pub updated_at: DateTime<Utc>,
}
