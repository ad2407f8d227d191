//! In-memory rating table for one collection
//!
//! A [`Collection`] holds the rating and match count of every rated item, the
//! aggregate rating of every tag group, and the list of item identifiers last
//! observed in the item source. It mirrors the persisted snapshot: see
//! [`Collection::from_snapshot`] and [`Collection::to_snapshot`].

use crate::rating::snapshot::CollectionSnapshot;
use crate::types::{ItemId, ItemRating, ItemStanding, TagName, TagRating, TagStanding};
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Rating state for a named collection of items
#[derive(Debug, Clone)]
pub struct Collection {
    name: String,
    /// Identifiers present in the item source at the last scan, in source order
    listing: Vec<ItemId>,
    items: BTreeMap<ItemId, ItemRating>,
    tags: BTreeMap<TagName, TagRating>,
}

impl Collection {
    /// Create an empty collection
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            listing: Vec::new(),
            items: BTreeMap::new(),
            tags: BTreeMap::new(),
        }
    }

    /// Rebuild a collection from its persisted form
    ///
    /// Every snapshot item is assumed live until the next scan replaces the
    /// listing. Tags cached on items that have no tag group get one.
    pub fn from_snapshot(
        name: impl Into<String>,
        snapshot: CollectionSnapshot,
        initial_rating: f64,
    ) -> Self {
        let mut collection = Self::new(name);
        let CollectionSnapshot {
            elo_ratings,
            match_count,
            lora_model_ratings,
            item_tags,
            ..
        } = snapshot;

        collection.tags = lora_model_ratings;

        for (item_id, rating) in elo_ratings {
            let matches = match_count.get(&item_id).copied().unwrap_or(0);
            let tag = item_tags.get(&item_id).cloned();
            if let Some(tag) = &tag {
                collection.ensure_tag(tag, initial_rating);
            }
            collection.listing.push(item_id.clone());
            collection.items.insert(
                item_id,
                ItemRating {
                    rating,
                    matches,
                    tag,
                },
            );
        }

        collection
    }

    /// Capture the full rating state in its persisted form
    pub fn to_snapshot(&self) -> CollectionSnapshot {
        let mut snapshot = CollectionSnapshot::default();

        for (item_id, item) in &self.items {
            snapshot.elo_ratings.insert(item_id.clone(), item.rating);
            snapshot.match_count.insert(item_id.clone(), item.matches);
            if let Some(tag) = &item.tag {
                snapshot.item_tags.insert(item_id.clone(), tag.clone());
            }
        }
        snapshot.lora_model_ratings = self.tags.clone();
        snapshot.saved_at = Some(Utc::now());

        snapshot
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifiers observed in the item source, including untagged ones
    pub fn listing(&self) -> &[ItemId] {
        &self.listing
    }

    /// Replace the listing with the result of a fresh scan
    pub fn set_listing(&mut self, listing: Vec<ItemId>) {
        self.listing = listing;
    }

    pub fn items(&self) -> &BTreeMap<ItemId, ItemRating> {
        &self.items
    }

    pub fn tags(&self) -> &BTreeMap<TagName, TagRating> {
        &self.tags
    }

    pub fn item(&self, item_id: &str) -> Option<&ItemRating> {
        self.items.get(item_id)
    }

    pub fn item_mut(&mut self, item_id: &str) -> Option<&mut ItemRating> {
        self.items.get_mut(item_id)
    }

    pub fn tag(&self, tag: &str) -> Option<&TagRating> {
        self.tags.get(tag)
    }

    pub fn tag_mut(&mut self, tag: &str) -> Option<&mut TagRating> {
        self.tags.get_mut(tag)
    }

    pub fn is_rated(&self, item_id: &str) -> bool {
        self.items.contains_key(item_id)
    }

    pub fn rated_count(&self) -> usize {
        self.items.len()
    }

    /// Register a new rated item with default state
    ///
    /// Creates the tag group the first time a tag is seen. Returns `false`
    /// and leaves the existing entry untouched when the item is already rated.
    pub fn register_item(&mut self, item_id: &str, tag: &str, initial_rating: f64) -> bool {
        if self.items.contains_key(item_id) {
            return false;
        }

        self.ensure_tag(tag, initial_rating);
        self.items.insert(
            item_id.to_string(),
            ItemRating::new(initial_rating, Some(tag.to_string())),
        );
        if !self.listing.iter().any(|id| id == item_id) {
            self.listing.push(item_id.to_string());
        }

        true
    }

    /// Get the tag group for `tag`, creating it with default state if needed
    pub fn ensure_tag(&mut self, tag: &str, initial_rating: f64) -> &mut TagRating {
        self.tags
            .entry(tag.to_string())
            .or_insert_with(|| TagRating::new(initial_rating))
    }

    /// Remove an item's rating state and drop it from the listing
    ///
    /// The item's tag group is kept even when no other item refers to it.
    pub fn remove_item(&mut self, item_id: &str) -> Option<ItemRating> {
        self.listing.retain(|id| id != item_id);
        self.items.remove(item_id)
    }

    /// Rated items that are still present in the item source, ascending by id
    pub fn candidates(&self) -> Vec<(&ItemId, &ItemRating)> {
        let live: BTreeSet<&str> = self.listing.iter().map(String::as_str).collect();
        self.items
            .iter()
            .filter(|(item_id, _)| live.contains(item_id.as_str()))
            .collect()
    }

    /// Item leaderboard, highest rating first, ties by identifier
    pub fn item_rankings(&self) -> Vec<ItemStanding> {
        let mut standings: Vec<ItemStanding> = self
            .items
            .iter()
            .map(|(item_id, item)| ItemStanding {
                item_id: item_id.clone(),
                rating: item.rating,
                matches: item.matches,
            })
            .collect();

        // BTreeMap order already breaks ties by identifier; the sort is stable
        standings.sort_by(|a, b| descending(a.rating, b.rating));
        standings
    }

    /// Tag leaderboard, highest rating first, ties by tag name
    pub fn tag_rankings(&self) -> Vec<TagStanding> {
        let mut standings: Vec<TagStanding> = self
            .tags
            .iter()
            .map(|(tag, group)| TagStanding {
                tag: tag.clone(),
                rating: group.rating,
                matches: group.count,
            })
            .collect();

        standings.sort_by(|a, b| descending(a.rating, b.rating));
        standings
    }
}

fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
