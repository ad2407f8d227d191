//! Item source and resource removal
//!
//! The item source lists the media files of a collection; the remover deletes
//! an item's file and its caption sidecar. Both are backed by a directory per
//! collection in production and by an in-memory map in tests.

use crate::error::{ArenaError, Result};
use crate::types::ItemId;
use anyhow::Context;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

/// File extensions recognised as media items
pub const MEDIA_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// Whether a file name carries a recognised media extension
pub fn is_media_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            MEDIA_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Source of collection names and item identifiers
pub trait ItemSource: Send + Sync {
    /// Names of all collections, ascending
    fn list_collections(&self) -> Result<Vec<String>>;

    /// Media item identifiers of a collection, ascending
    ///
    /// Fails with `CollectionNotFound` when the collection does not exist.
    fn list_items(&self, collection: &str) -> Result<Vec<ItemId>>;

    /// Location of an item, handed to the metadata resolver
    fn item_path(&self, collection: &str, item_id: &str) -> PathBuf;
}

/// Deletes the resources behind an item
pub trait ResourceRemover: Send + Sync {
    /// Remove the item and its sidecar files. Missing files are not errors.
    fn delete_item_resource(&self, collection: &str, item_id: &str) -> Result<()>;
}

/// Item source reading `<root>/<collection>/<item>`
#[derive(Debug, Clone)]
pub struct DirectoryItemSource {
    root: PathBuf,
}

impl DirectoryItemSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(collection)
    }
}

impl ItemSource for DirectoryItemSource {
    fn list_collections(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read images directory {}", self.root.display()))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn list_items(&self, collection: &str) -> Result<Vec<ItemId>> {
        let dir = self.collection_dir(collection);
        if !dir.is_dir() {
            return Err(ArenaError::CollectionNotFound {
                collection: collection.to_string(),
            }
            .into());
        }
        let entries =
            fs::read_dir(&dir).with_context(|| format!("Failed to read {}", dir.display()))?;

        let mut items = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            match entry.file_name().to_str() {
                Some(name) if is_media_file(name) => items.push(name.to_string()),
                Some(_) => {}
                None => warn!(
                    "Skipping non UTF-8 file name in {}: {:?}",
                    dir.display(),
                    entry.file_name()
                ),
            }
        }
        items.sort();
        Ok(items)
    }

    fn item_path(&self, collection: &str, item_id: &str) -> PathBuf {
        self.collection_dir(collection).join(item_id)
    }
}

impl ResourceRemover for DirectoryItemSource {
    fn delete_item_resource(&self, collection: &str, item_id: &str) -> Result<()> {
        let item_path = self.item_path(collection, item_id);
        let caption_path = item_path.with_extension("txt");

        for path in [item_path, caption_path] {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to remove {}", path.display()));
                }
            }
        }

        Ok(())
    }
}

/// In-memory item source, used by tests and benchmarks
#[derive(Debug, Default)]
pub struct InMemoryItemSource {
    collections: RwLock<BTreeMap<String, Vec<ItemId>>>,
    removed: RwLock<Vec<(String, ItemId)>>,
}

impl InMemoryItemSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a collection with the given items
    pub fn set_items(&self, collection: &str, items: &[&str]) {
        if let Ok(mut collections) = self.collections.write() {
            let mut items: Vec<ItemId> = items.iter().map(|item| item.to_string()).collect();
            items.sort();
            collections.insert(collection.to_string(), items);
        }
    }

    /// Add one item to an existing or new collection
    pub fn add_item(&self, collection: &str, item_id: &str) {
        if let Ok(mut collections) = self.collections.write() {
            let items = collections.entry(collection.to_string()).or_default();
            if !items.iter().any(|id| id == item_id) {
                items.push(item_id.to_string());
                items.sort();
            }
        }
    }

    /// Remove one item without going through the remover
    pub fn remove_item(&self, collection: &str, item_id: &str) {
        if let Ok(mut collections) = self.collections.write() {
            if let Some(items) = collections.get_mut(collection) {
                items.retain(|id| id != item_id);
            }
        }
    }

    /// Items passed to `delete_item_resource`, in call order
    pub fn get_removed(&self) -> Vec<(String, ItemId)> {
        self.removed
            .read()
            .map(|removed| removed.clone())
            .unwrap_or_default()
    }
}

impl ItemSource for InMemoryItemSource {
    fn list_collections(&self) -> Result<Vec<String>> {
        let collections = self.collections.read().map_err(|_| ArenaError::Internal {
            message: "Failed to acquire item source read lock".to_string(),
        })?;
        Ok(collections.keys().cloned().collect())
    }

    fn list_items(&self, collection: &str) -> Result<Vec<ItemId>> {
        let collections = self.collections.read().map_err(|_| ArenaError::Internal {
            message: "Failed to acquire item source read lock".to_string(),
        })?;
        collections.get(collection).cloned().ok_or_else(|| {
            ArenaError::CollectionNotFound {
                collection: collection.to_string(),
            }
            .into()
        })
    }

    fn item_path(&self, collection: &str, item_id: &str) -> PathBuf {
        PathBuf::from(collection).join(item_id)
    }
}

impl ResourceRemover for InMemoryItemSource {
    fn delete_item_resource(&self, collection: &str, item_id: &str) -> Result<()> {
        if let Ok(mut removed) = self.removed.write() {
            removed.push((collection.to_string(), item_id.to_string()));
        }
        self.remove_item(collection, item_id);
        Ok(())
    }
}
