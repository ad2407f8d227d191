//! Reconciling rating state with the item source
//!
//! New items found in the source are registered with default rating state and
//! the tag resolved from their metadata. Items without a resolvable tag are
//! skipped with a warning and retried on the next scan. Items that vanished
//! from the source keep their rating entries; only an explicit delete removes
//! them.

use crate::collection::metadata::MetadataResolver;
use crate::collection::source::ItemSource;
use crate::error::Result;
use crate::rating::store::Collection;
use crate::types::{ItemId, TagName};
use std::sync::Arc;
use tracing::{debug, warn};

/// What a scan changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Items registered by this scan
    pub added: Vec<ItemId>,
    /// Items left unrated because no tag could be resolved
    pub skipped: Vec<ItemId>,
}

impl SyncReport {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty()
    }
}

/// Keeps a [`Collection`] in step with its item source
#[derive(Clone)]
pub struct CollectionSync {
    source: Arc<dyn ItemSource>,
    resolver: Arc<dyn MetadataResolver>,
    initial_rating: f64,
}

impl CollectionSync {
    pub fn new(
        source: Arc<dyn ItemSource>,
        resolver: Arc<dyn MetadataResolver>,
        initial_rating: f64,
    ) -> Self {
        Self {
            source,
            resolver,
            initial_rating,
        }
    }

    /// Build a collection from scratch by scanning the item source
    pub fn build(&self, name: &str) -> Result<(Collection, SyncReport)> {
        let mut collection = Collection::new(name);
        let report = self.reconcile(&mut collection)?;
        Ok((collection, report))
    }

    /// Register every item present in the source but not yet rated
    ///
    /// Fails with `CollectionNotFound` if the source no longer has the
    /// collection; the collection is left untouched in that case.
    pub fn reconcile(&self, collection: &mut Collection) -> Result<SyncReport> {
        let listing = self.source.list_items(collection.name())?;
        let mut report = SyncReport::default();

        for item_id in &listing {
            if collection.is_rated(item_id) {
                continue;
            }

            match self.resolve_tag(collection.name(), item_id) {
                Some(tag) => {
                    collection.register_item(item_id, &tag, self.initial_rating);
                    report.added.push(item_id.clone());
                }
                None => {
                    warn!(
                        "No LoRA tag found in metadata for '{}' in '{}', leaving it unrated",
                        item_id,
                        collection.name()
                    );
                    report.skipped.push(item_id.clone());
                }
            }
        }

        collection.set_listing(listing);

        if !report.added.is_empty() {
            debug!(
                "Registered {} new item(s) in '{}'",
                report.added.len(),
                collection.name()
            );
        }

        Ok(report)
    }

    /// Resolve an item's tag from its metadata
    pub fn resolve_tag(&self, collection: &str, item_id: &str) -> Option<TagName> {
        let path = self.source.item_path(collection, item_id);
        self.resolver.extract_tag(&path)
    }
}
