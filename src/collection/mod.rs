//! Collections of items and their external collaborators
//!
//! This module provides the item source, tag resolution from image metadata,
//! reconciliation of rating state with the source, and the registry that
//! serves every request against a collection.

pub mod manager;
pub mod metadata;
pub mod source;
pub mod sync;

pub use manager::{CollectionManager, ManagerStats};
pub use metadata::{MetadataResolver, PngTextMetadataResolver, StaticMetadataResolver};
pub use source::{DirectoryItemSource, InMemoryItemSource, ItemSource, ResourceRemover};
pub use sync::{CollectionSync, SyncReport};
