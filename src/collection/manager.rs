//! Collection manager for handling the loaded collections
//!
//! This module provides the registry that owns every loaded [`Collection`],
//! loads them lazily on first access, and runs each request against a
//! collection as one read-modify-write sequence under that collection's lock.

use crate::collection::metadata::MetadataResolver;
use crate::collection::source::{ItemSource, ResourceRemover};
use crate::collection::sync::{CollectionSync, SyncReport};
use crate::error::{arena_error, ArenaError, Result};
use crate::matchmaking::Matchmaker;
use crate::metrics::MetricsCollector;
use crate::rating::elo::RatingEngine;
use crate::rating::snapshot::SnapshotStore;
use crate::rating::store::Collection;
use crate::types::{ItemId, ItemStanding, MatchPair, TagStanding, VoteOutcome};
use crate::utils::validate_identifier;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

type SharedCollection = Arc<Mutex<Collection>>;

/// Statistics about the loaded collections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManagerStats {
    /// Number of collections held in memory
    pub loaded_collections: usize,
    /// Rated items across all loaded collections
    pub rated_items: usize,
    /// Tag groups across all loaded collections
    pub tag_groups: usize,
}

/// Registry of loaded collections
pub struct CollectionManager {
    /// Loaded collections by name
    collections: RwLock<HashMap<String, SharedCollection>>,
    /// Source of collection names and items
    source: Arc<dyn ItemSource>,
    /// Deletes item files on request
    remover: Arc<dyn ResourceRemover>,
    /// Durable rating state
    snapshots: Arc<dyn SnapshotStore>,
    sync: CollectionSync,
    matchmaker: Matchmaker,
    engine: RatingEngine,
    /// Metrics collector for recording performance data
    metrics_collector: Arc<MetricsCollector>,
}

impl CollectionManager {
    /// Create a manager over the given collaborators
    pub fn new(
        source: Arc<dyn ItemSource>,
        remover: Arc<dyn ResourceRemover>,
        resolver: Arc<dyn MetadataResolver>,
        snapshots: Arc<dyn SnapshotStore>,
        engine: RatingEngine,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        let config = engine.config();
        let sync = CollectionSync::new(source.clone(), resolver, config.initial_rating);
        let matchmaker = Matchmaker::new(config.under_sampled_threshold);

        Self {
            collections: RwLock::new(HashMap::new()),
            source,
            remover,
            snapshots,
            sync,
            matchmaker,
            engine,
            metrics_collector,
        }
    }

    pub fn engine(&self) -> &RatingEngine {
        &self.engine
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    /// Names of every collection in the item source
    pub fn list_collections(&self) -> Result<Vec<String>> {
        self.source.list_collections()
    }

    /// Get a collection, loading it on first access
    ///
    /// A persisted snapshot is preferred; otherwise the collection is built
    /// by scanning the item source. Either way the result is reconciled with
    /// the source before it is registered.
    pub fn get_collection(&self, name: &str) -> Result<SharedCollection> {
        validate_identifier("collection", name)?;
        self.load(name).map(|(collection, _)| collection)
    }

    /// Item identifiers currently in the source, including untagged ones
    pub fn list_items(&self, name: &str) -> Result<Vec<ItemId>> {
        self.with_collection(name, |collection| Ok(collection.listing().to_vec()))
    }

    /// Choose the next pair to compare
    pub fn next_pair(&self, name: &str) -> Result<MatchPair> {
        let timer = self.metrics_collector.start_timer();

        let result = self.with_collection(name, |collection| {
            self.matchmaker.select_pair(collection)
        });
        self.metrics_collector
            .record_operation("select_pair", timer.stop());

        match &result {
            Ok(pair) => {
                debug!("Serving pair ({}, {}) from '{}'", pair.first, pair.second, name);
                self.metrics_collector.record_pair_served(name);
            }
            Err(e) => self.record_failure(e),
        }
        result
    }

    /// Items ranked by rating, highest first
    pub fn item_rankings(&self, name: &str) -> Result<Vec<ItemStanding>> {
        self.with_collection(name, |collection| Ok(collection.item_rankings()))
    }

    /// Tag groups ranked by rating, highest first
    pub fn tag_rankings(&self, name: &str) -> Result<Vec<TagStanding>> {
        self.with_collection(name, |collection| Ok(collection.tag_rankings()))
    }

    /// Record that `winner` beat `loser` and persist the result
    ///
    /// If the snapshot cannot be written the in-memory state is restored and
    /// the error is returned, so an unacknowledged vote leaves no trace.
    pub fn record_vote(&self, name: &str, winner: &str, loser: &str) -> Result<VoteOutcome> {
        validate_identifier("winner", winner)?;
        validate_identifier("loser", loser)?;
        if winner == loser {
            let error = ArenaError::InvalidRequest {
                reason: format!("'{}' cannot be compared against itself", winner),
            }
            .into();
            self.record_failure(&error);
            return Err(error);
        }

        let timer = self.metrics_collector.start_timer();
        let sync = &self.sync;

        let result = self.with_collection(name, |collection| {
            let before = collection.clone();
            let outcome = self.engine.record_outcome(
                collection,
                winner,
                loser,
                &mut |item_id: &str| sync.resolve_tag(name, item_id),
            )?;

            if let Err(e) = self.save(collection) {
                *collection = before;
                return Err(e);
            }
            Ok(outcome)
        });
        self.metrics_collector.record_operation("vote", timer.stop());

        match &result {
            Ok(outcome) => {
                info!(
                    "Vote in '{}': '{}' ({:.1} -> {:.1}) beat '{}' ({:.1} -> {:.1})",
                    name,
                    outcome.winner,
                    outcome.items.winner_before,
                    outcome.items.winner_after,
                    outcome.loser,
                    outcome.items.loser_before,
                    outcome.items.loser_after
                );
                self.metrics_collector.record_vote(name);
            }
            Err(e) => self.record_failure(e),
        }
        result
    }

    /// Delete an item and its files
    ///
    /// Idempotent: deleting an item that has no rating entry succeeds and
    /// leaves the ratings unchanged. Returns whether a rating entry was
    /// removed. Files are only touched once the snapshot without the item is
    /// written; removing them is best-effort and a failure is logged.
    pub fn delete_item(&self, name: &str, item_id: &str) -> Result<bool> {
        validate_identifier("item", item_id)?;

        self.with_collection(name, |collection| {
            let before = collection.clone();
            if collection.remove_item(item_id).is_none() {
                debug!("Delete of unrated '{}' in '{}' is a no-op", item_id, name);
                self.remove_resource(name, item_id);
                return Ok(false);
            }

            if let Err(e) = self.save(collection) {
                *collection = before;
                return Err(e);
            }
            self.remove_resource(name, item_id);

            info!("Deleted '{}' from '{}'", item_id, name);
            self.metrics_collector
                .record_deletion(name, collection.rated_count());
            Ok(true)
        })
    }

    /// Write the current state of a collection to the snapshot store
    pub fn persist(&self, name: &str) -> Result<()> {
        let collection = self.get_collection(name)?;
        let guard = lock(&collection)?;
        self.save(&guard)
    }

    /// Write every loaded collection, returning the number written
    pub fn persist_all(&self) -> Result<usize> {
        let loaded: Vec<SharedCollection> = self
            .collections
            .read()
            .map_err(|_| ArenaError::Internal {
                message: "Failed to acquire collections read lock".to_string(),
            })?
            .values()
            .cloned()
            .collect();

        for collection in &loaded {
            let guard = lock(collection)?;
            self.save(&guard)?;
        }
        Ok(loaded.len())
    }

    /// Get statistics about the loaded collections
    pub fn get_stats(&self) -> Result<ManagerStats> {
        let collections = self.collections.read().map_err(|_| ArenaError::Internal {
            message: "Failed to acquire collections read lock".to_string(),
        })?;

        let mut stats = ManagerStats {
            loaded_collections: collections.len(),
            ..ManagerStats::default()
        };
        for collection in collections.values() {
            let guard = lock(collection)?;
            stats.rated_items += guard.rated_count();
            stats.tag_groups += guard.tags().len();
        }
        Ok(stats)
    }

    /// Run `operation` on a collection while holding its lock
    ///
    /// The collection is reconciled with the item source first unless it was
    /// loaded by this very call.
    fn with_collection<T>(
        &self,
        name: &str,
        operation: impl FnOnce(&mut Collection) -> Result<T>,
    ) -> Result<T> {
        validate_identifier("collection", name)?;
        let (collection, fresh) = self.load(name)?;
        let mut guard = lock(&collection)?;

        if !fresh {
            let report = self.sync.reconcile(&mut *guard)?;
            self.record_sync(&guard, &report);
        }

        operation(&mut *guard)
    }

    /// Look up a loaded collection or load it; `true` when loaded now
    fn load(&self, name: &str) -> Result<(SharedCollection, bool)> {
        {
            let collections = self.collections.read().map_err(|_| ArenaError::Internal {
                message: "Failed to acquire collections read lock".to_string(),
            })?;
            if let Some(collection) = collections.get(name) {
                return Ok((collection.clone(), false));
            }
        }

        // Built outside the registry lock
        let timer = self.metrics_collector.start_timer();
        let (collection, report) = match self.snapshots.load(name)? {
            Some(snapshot) => {
                let mut collection = Collection::from_snapshot(
                    name,
                    snapshot,
                    self.engine.config().initial_rating,
                );
                let report = self.sync.reconcile(&mut collection)?;
                (collection, report)
            }
            None => self.sync.build(name)?,
        };
        self.metrics_collector.record_operation("load", timer.stop());

        let mut collections = self.collections.write().map_err(|_| ArenaError::Internal {
            message: "Failed to acquire collections write lock".to_string(),
        })?;

        // Another request may have loaded it in the meantime
        if let Some(existing) = collections.get(name) {
            debug!("Collection '{}' was loaded concurrently", name);
            return Ok((existing.clone(), false));
        }

        self.record_sync(&collection, &report);
        info!(
            "Loaded collection '{}' with {} rated item(s) and {} tag group(s)",
            name,
            collection.rated_count(),
            collection.tags().len()
        );

        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(collection)))
            .clone();
        Ok((collection, true))
    }

    fn remove_resource(&self, name: &str, item_id: &str) {
        if let Err(e) = self.remover.delete_item_resource(name, item_id) {
            warn!("Failed to remove files of '{}' in '{}': {:#}", item_id, name, e);
        }
    }

    fn save(&self, collection: &Collection) -> Result<()> {
        let timer = self.metrics_collector.start_timer();
        let result = self
            .snapshots
            .save(collection.name(), &collection.to_snapshot());
        self.metrics_collector
            .record_persist(result.is_ok(), timer.stop());
        result
    }

    fn record_sync(&self, collection: &Collection, report: &SyncReport) {
        self.metrics_collector.record_sync(
            collection.name(),
            report.added.len(),
            report.skipped.len(),
            collection.rated_count(),
        );
    }

    fn record_failure(&self, error: &anyhow::Error) {
        let reason = match arena_error(error) {
            Some(ArenaError::CollectionNotFound { .. }) => "collection_not_found",
            Some(ArenaError::ItemNotFound { .. }) => "item_not_found",
            Some(ArenaError::InsufficientItems { .. }) => "insufficient_items",
            Some(ArenaError::InvalidRequest { .. }) => "invalid_request",
            Some(ArenaError::Persistence { .. }) => "persistence",
            _ => "internal",
        };
        self.metrics_collector.record_rejection(reason);
    }
}

fn lock(collection: &SharedCollection) -> Result<MutexGuard<'_, Collection>> {
    collection.lock().map_err(|_| {
        ArenaError::Internal {
            message: "Collection lock poisoned".to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::metadata::StaticMetadataResolver;
    use crate::collection::source::InMemoryItemSource;
    use crate::config::RatingConfig;
    use crate::rating::snapshot::{CollectionSnapshot, InMemorySnapshotStore, MockSnapshotStore};
    use crate::types::TagRating;

    fn resolver() -> StaticMetadataResolver {
        StaticMetadataResolver::new()
            .with_tag("a.png", "alpha")
            .with_tag("b.png", "beta")
            .with_tag("c.png", "alpha")
            .with_tag("d.png", "delta")
    }

    fn create_test_manager(
        snapshots: Arc<dyn SnapshotStore>,
    ) -> (CollectionManager, Arc<InMemoryItemSource>) {
        let source = Arc::new(InMemoryItemSource::new());
        source.set_items("portraits", &["a.png", "b.png", "c.png", "plain.jpg"]);

        let manager = CollectionManager::new(
            source.clone(),
            source.clone(),
            Arc::new(resolver()),
            snapshots,
            RatingEngine::new(RatingConfig::default()).unwrap(),
            Arc::new(MetricsCollector::new().unwrap()),
        );
        (manager, source)
    }

    fn is_error(error: &anyhow::Error, check: impl Fn(&ArenaError) -> bool) -> bool {
        arena_error(error).map(check).unwrap_or(false)
    }

    #[test]
    fn test_get_collection_is_cached() {
        let (manager, _source) = create_test_manager(Arc::new(InMemorySnapshotStore::new()));

        let first = manager.get_collection("portraits").unwrap();
        let second = manager.get_collection("portraits").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.lock().unwrap().rated_count(), 3);
        assert_eq!(manager.get_stats().unwrap().loaded_collections, 1);
    }

    #[test]
    fn test_concurrent_first_loads_share_one_collection() {
        let (manager, source) = create_test_manager(Arc::new(InMemorySnapshotStore::new()));
        source.set_items("landscapes", &["x.png", "y.png"]);
        let manager = Arc::new(manager);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let manager = manager.clone();
                let name = if i % 2 == 0 { "portraits" } else { "landscapes" };
                std::thread::spawn(move || manager.get_collection(name).unwrap())
            })
            .collect();
        let loaded: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for (i, collection) in loaded.iter().enumerate() {
            assert!(Arc::ptr_eq(collection, &loaded[i % 2]));
        }
        assert_eq!(manager.get_stats().unwrap().loaded_collections, 2);
    }

    #[test]
    fn test_unknown_collection_is_not_found() {
        let (manager, _source) = create_test_manager(Arc::new(InMemorySnapshotStore::new()));

        let err = manager.next_pair("missing").unwrap_err();
        assert!(is_error(&err, |e| matches!(
            e,
            ArenaError::CollectionNotFound { .. }
        )));
        assert_eq!(manager.get_stats().unwrap().loaded_collections, 0);
    }

    #[test]
    fn test_load_prefers_snapshot() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let mut snapshot = CollectionSnapshot::default();
        snapshot.elo_ratings.insert("a.png".to_string(), 1100.0);
        snapshot.match_count.insert("a.png".to_string(), 12);
        snapshot.item_tags.insert("a.png".to_string(), "alpha".to_string());
        snapshot
            .lora_model_ratings
            .insert("alpha".to_string(), TagRating { rating: 1050.0, count: 12 });
        store.preset("portraits", snapshot).unwrap();

        let (manager, _source) = create_test_manager(store);
        let rankings = manager.item_rankings("portraits").unwrap();

        assert_eq!(rankings[0].item_id, "a.png");
        assert_eq!(rankings[0].rating, 1100.0);
        assert_eq!(rankings[0].matches, 12);
        // b.png and c.png are new in the source and get registered
        assert_eq!(rankings.len(), 3);
        assert_eq!(manager.tag_rankings("portraits").unwrap()[0].rating, 1050.0);
    }

    #[test]
    fn test_list_items_includes_untagged_and_new_items() {
        let (manager, source) = create_test_manager(Arc::new(InMemorySnapshotStore::new()));
        manager.get_collection("portraits").unwrap();

        source.add_item("portraits", "d.png");
        let items = manager.list_items("portraits").unwrap();

        assert_eq!(items, vec!["a.png", "b.png", "c.png", "d.png", "plain.jpg"]);
        let collection = manager.get_collection("portraits").unwrap();
        assert!(collection.lock().unwrap().is_rated("d.png"));
    }

    #[test]
    fn test_record_vote_persists() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let (manager, _source) = create_test_manager(store.clone());

        let outcome = manager.record_vote("portraits", "a.png", "b.png").unwrap();
        assert_eq!(outcome.k_factor, 32.0);
        assert!(outcome.tags.is_some());

        assert_eq!(store.get_save_calls(), vec!["portraits"]);
        let saved = store.get("portraits").unwrap();
        assert!((saved.elo_ratings["a.png"] - 1016.0).abs() < 1e-9);
        assert_eq!(saved.match_count["b.png"], 1);
        assert_eq!(saved.lora_model_ratings["beta"].count, 1);
    }

    #[test]
    fn test_self_vote_is_rejected() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let (manager, _source) = create_test_manager(store.clone());

        let err = manager.record_vote("portraits", "a.png", "a.png").unwrap_err();
        assert!(is_error(&err, |e| matches!(e, ArenaError::InvalidRequest { .. })));
        assert!(store.get_save_calls().is_empty());
    }

    #[test]
    fn test_vote_for_unrated_item_is_not_found() {
        let (manager, _source) = create_test_manager(Arc::new(InMemorySnapshotStore::new()));

        let err = manager
            .record_vote("portraits", "a.png", "plain.jpg")
            .unwrap_err();
        assert!(is_error(&err, |e| e.is_not_found()));
    }

    #[test]
    fn test_failed_persist_rolls_back_vote() {
        let mut store = MockSnapshotStore::new();
        store.expect_load().returning(|_| Ok(None));
        store.expect_save().returning(|collection, _| {
            Err(ArenaError::Persistence {
                message: format!("disk full while writing '{}'", collection),
            }
            .into())
        });
        let (manager, _source) = create_test_manager(Arc::new(store));

        let err = manager.record_vote("portraits", "a.png", "b.png").unwrap_err();
        assert!(is_error(&err, |e| matches!(e, ArenaError::Persistence { .. })));

        let collection = manager.get_collection("portraits").unwrap();
        let guard = collection.lock().unwrap();
        assert_eq!(guard.item("a.png").unwrap().rating, 1000.0);
        assert_eq!(guard.item("a.png").unwrap().matches, 0);
        assert_eq!(guard.tag("alpha").unwrap().count, 0);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let (manager, source) = create_test_manager(store.clone());

        assert!(manager.delete_item("portraits", "b.png").unwrap());
        let after_first = manager.item_rankings("portraits").unwrap();

        assert!(!manager.delete_item("portraits", "b.png").unwrap());
        assert!(!manager.delete_item("portraits", "never.png").unwrap());
        assert_eq!(manager.item_rankings("portraits").unwrap(), after_first);

        assert_eq!(after_first.len(), 2);
        assert_eq!(store.get_save_calls().len(), 1);
        // Tag group survives its last item
        assert!(manager
            .tag_rankings("portraits")
            .unwrap()
            .iter()
            .any(|standing| standing.tag == "beta"));
        assert_eq!(source.get_removed().len(), 3);
    }

    #[test]
    fn test_failed_persist_keeps_deleted_item_files() {
        let mut store = MockSnapshotStore::new();
        store.expect_load().returning(|_| Ok(None));
        store.expect_save().returning(|_, _| {
            Err(ArenaError::Persistence {
                message: "disk full".to_string(),
            }
            .into())
        });
        let (manager, source) = create_test_manager(Arc::new(store));

        let err = manager.delete_item("portraits", "b.png").unwrap_err();
        assert!(is_error(&err, |e| matches!(e, ArenaError::Persistence { .. })));

        assert!(source.get_removed().is_empty());
        let rankings = manager.item_rankings("portraits").unwrap();
        assert!(rankings.iter().any(|standing| standing.item_id == "b.png"));
        assert!(manager
            .list_items("portraits")
            .unwrap()
            .contains(&"b.png".to_string()));
    }

    #[test]
    fn test_invalid_identifiers_are_rejected() {
        let (manager, _source) = create_test_manager(Arc::new(InMemorySnapshotStore::new()));

        for result in [
            manager.list_items("../etc").map(|_| ()),
            manager.delete_item("portraits", "../a.png").map(|_| ()),
            manager.record_vote("portraits", "a/b.png", "c.png").map(|_| ()),
        ] {
            let err = result.unwrap_err();
            assert!(is_error(&err, |e| matches!(e, ArenaError::InvalidRequest { .. })));
        }
    }

    #[test]
    fn test_next_pair_needs_two_items() {
        let (manager, source) = create_test_manager(Arc::new(InMemorySnapshotStore::new()));
        source.set_items("tiny", &["a.png", "plain.jpg"]);

        let err = manager.next_pair("tiny").unwrap_err();
        assert!(is_error(&err, |e| matches!(
            e,
            ArenaError::InsufficientItems { rated: 1, .. }
        )));

        let pair = manager.next_pair("portraits").unwrap();
        assert_ne!(pair.first, pair.second);
        assert!(!pair.contains("plain.jpg"));
    }

    #[test]
    fn test_persist_all_writes_loaded_collections() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let (manager, source) = create_test_manager(store.clone());
        source.set_items("landscapes", &["d.png"]);

        manager.get_collection("portraits").unwrap();
        manager.get_collection("landscapes").unwrap();

        assert_eq!(manager.persist_all().unwrap(), 2);
        let mut calls = store.get_save_calls();
        calls.sort();
        assert_eq!(calls, vec!["landscapes", "portraits"]);
    }
}
