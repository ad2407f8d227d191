//! Rating snapshot storage interface and implementations
//!
//! A snapshot is the durable form of a [`Collection`](crate::rating::Collection).
//! The JSON layout keeps the key names of the legacy `eloRatings-<subset>.json`
//! files so existing rating files load unchanged.

use crate::error::{ArenaError, Result};
use crate::types::{ItemId, TagName, TagRating};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Persisted rating state of one collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSnapshot {
    #[serde(default)]
    pub elo_ratings: BTreeMap<ItemId, f64>,
    #[serde(default)]
    pub match_count: BTreeMap<ItemId, u32>,
    #[serde(default)]
    pub lora_model_ratings: BTreeMap<TagName, TagRating>,
    /// Tag cached for each item at registration time
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub item_tags: BTreeMap<ItemId, TagName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

/// Trait for snapshot persistence, keyed by collection name
#[cfg_attr(test, mockall::automock)]
pub trait SnapshotStore: Send + Sync {
    /// Load the snapshot for a collection, `None` if it was never saved
    fn load(&self, collection: &str) -> Result<Option<CollectionSnapshot>>;

    /// Overwrite the snapshot for a collection
    fn save(&self, collection: &str, snapshot: &CollectionSnapshot) -> Result<()>;
}

/// Snapshot store writing one JSON file per collection
#[derive(Debug, Clone)]
pub struct JsonFileSnapshotStore {
    dir: PathBuf,
}

impl JsonFileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the snapshot file for a collection
    pub fn path_for(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("eloRatings-{}.json", collection))
    }

    fn write_atomically(&self, path: &Path, contents: &[u8]) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let tmp_path = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(contents)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)
    }
}

impl SnapshotStore for JsonFileSnapshotStore {
    fn load(&self, collection: &str) -> Result<Option<CollectionSnapshot>> {
        let path = self.path_for(collection);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        let snapshot: CollectionSnapshot = serde_json::from_slice(&raw)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;

        debug!(
            "Loaded snapshot for '{}' with {} items and {} tags",
            collection,
            snapshot.elo_ratings.len(),
            snapshot.lora_model_ratings.len()
        );
        Ok(Some(snapshot))
    }

    fn save(&self, collection: &str, snapshot: &CollectionSnapshot) -> Result<()> {
        let path = self.path_for(collection);
        let contents = serde_json::to_vec(snapshot).map_err(|e| ArenaError::Persistence {
            message: format!("Failed to serialize snapshot for '{}': {}", collection, e),
        })?;

        self.write_atomically(&path, &contents)
            .map_err(|e| ArenaError::Persistence {
                message: format!("Failed to write {}: {}", path.display(), e),
            })?;

        debug!("Saved snapshot for '{}' to {}", collection, path.display());
        Ok(())
    }
}

/// In-memory snapshot store, used by tests and ephemeral setups
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<String, CollectionSnapshot>>,
    save_calls: RwLock<Vec<String>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset a snapshot, as if it had been saved earlier
    pub fn preset(&self, collection: &str, snapshot: CollectionSnapshot) -> Result<()> {
        let mut snapshots = self.snapshots.write().map_err(|_| ArenaError::Internal {
            message: "Failed to acquire snapshots write lock".to_string(),
        })?;
        snapshots.insert(collection.to_string(), snapshot);
        Ok(())
    }

    /// Collection names passed to `save`, in call order
    pub fn get_save_calls(&self) -> Vec<String> {
        self.save_calls
            .read()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Last saved snapshot for a collection
    pub fn get(&self, collection: &str) -> Option<CollectionSnapshot> {
        self.snapshots
            .read()
            .ok()
            .and_then(|snapshots| snapshots.get(collection).cloned())
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&self, collection: &str) -> Result<Option<CollectionSnapshot>> {
        let snapshots = self.snapshots.read().map_err(|_| ArenaError::Internal {
            message: "Failed to acquire snapshots read lock".to_string(),
        })?;
        Ok(snapshots.get(collection).cloned())
    }

    fn save(&self, collection: &str, snapshot: &CollectionSnapshot) -> Result<()> {
        if let Ok(mut calls) = self.save_calls.write() {
            calls.push(collection.to_string());
        }

        let mut snapshots = self.snapshots.write().map_err(|_| ArenaError::Internal {
            message: "Failed to acquire snapshots write lock".to_string(),
        })?;
        snapshots.insert(collection.to_string(), snapshot.clone());
        Ok(())
    }
}
