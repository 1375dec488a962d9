//! Business logic services.
//!
//! - `email` - Transactional email over SMTP
//! - `feed` - Private podcast feed rendering

pub mod email;
pub mod feed;
