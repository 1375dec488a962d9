//! Screencast Core - Shared types library.
//!
//! This crate provides common types used across all Screencast components:
//! - `web` - The subscription site (accounts, billing, feeds)
//! - `cli` - Command-line tools for migrations and scheduled emails
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, emails, and statuses
//! - [`episode`] - The published episode catalogue

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod episode;
pub mod types;

pub use episode::{Episode, EpisodeStats, Permission};
pub use types::*;
