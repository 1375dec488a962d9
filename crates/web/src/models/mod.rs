//! Domain models for the site.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`].

pub mod activity;
pub mod session;
pub mod subscription;
pub mod user;

pub use activity::{EmailSetting, EpisodeCredit, FeedRequestEvent};
pub use session::keys as session_keys;
pub use subscription::{Subscription, TeamInvite};
pub use user::{User, UserUpdate};
