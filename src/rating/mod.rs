//! Rating state, persistence and the Elo update
//!
//! This module provides the per-collection rating table, the snapshot
//! storage interface, and the Elo engine built on the skillratings crate.

pub mod elo;
pub mod snapshot;
pub mod store;

// Re-export commonly used types
pub use elo::RatingEngine;
pub use snapshot::{CollectionSnapshot, InMemorySnapshotStore, JsonFileSnapshotStore, SnapshotStore};
pub use store::Collection;
