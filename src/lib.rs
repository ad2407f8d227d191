//! Elo Arena - pairwise image rating service
//!
//! This crate rates the images of a collection by pairwise human judgement:
//! it picks the next pair to compare, applies Elo updates to the images and
//! to the LoRA models that generated them, and serves leaderboards over HTTP.

pub mod collection;
pub mod config;
pub mod error;
pub mod matchmaking;
pub mod metrics;
pub mod rating;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{ArenaError, Result};
pub use types::*;

// Re-export key components
pub use collection::{CollectionManager, ItemSource, MetadataResolver, ResourceRemover};
pub use matchmaking::Matchmaker;
pub use rating::{Collection, RatingEngine, SnapshotStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
