//! Common types used throughout the rating service

use serde::{Deserialize, Serialize};

/// Identifier of an item within a collection (the image file name)
pub type ItemId = String;

/// Tag extracted from an item's embedded metadata (the LoRA model name)
pub type TagName = String;

/// Rating state for a single item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRating {
    pub rating: f64,
    pub matches: u32,
    /// Tag recorded when the item was registered. `None` only for items
    /// restored from a snapshot that predates tag caching.
    pub tag: Option<TagName>,
}

impl ItemRating {
    pub fn new(initial_rating: f64, tag: Option<TagName>) -> Self {
        Self {
            rating: initial_rating,
            matches: 0,
            tag,
        }
    }
}

/// Aggregate rating state for every item sharing a tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRating {
    pub rating: f64,
    pub count: u32,
}

impl TagRating {
    pub fn new(initial_rating: f64) -> Self {
        Self {
            rating: initial_rating,
            count: 0,
        }
    }
}

/// Two items selected for the next comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPair {
    #[serde(rename = "image1")]
    pub first: ItemId,
    #[serde(rename = "image2")]
    pub second: ItemId,
}

impl MatchPair {
    pub fn new(first: impl Into<ItemId>, second: impl Into<ItemId>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }

    /// Whether the pair contains the given item, in either position
    pub fn contains(&self, item_id: &str) -> bool {
        self.first == item_id || self.second == item_id
    }
}

/// One row of the item leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStanding {
    #[serde(rename = "image")]
    pub item_id: ItemId,
    #[serde(rename = "elo")]
    pub rating: f64,
    pub matches: u32,
}

/// One row of the tag leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagStanding {
    #[serde(rename = "lora")]
    pub tag: TagName,
    #[serde(rename = "elo")]
    pub rating: f64,
    pub matches: u32,
}

/// Vote submitted by the request layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub winner: ItemId,
    pub loser: ItemId,
}

/// Before/after values of one Elo update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingDelta {
    pub winner_before: f64,
    pub winner_after: f64,
    pub loser_before: f64,
    pub loser_after: f64,
}

impl RatingDelta {
    pub fn winner_gain(&self) -> f64 {
        self.winner_after - self.winner_before
    }

    pub fn loser_loss(&self) -> f64 {
        self.loser_before - self.loser_after
    }
}

/// Tag-group update applied alongside an item update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagUpdate {
    pub winner_tag: TagName,
    pub loser_tag: TagName,
    pub delta: RatingDelta,
}

/// Everything that changed when a vote was recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub winner: ItemId,
    pub loser: ItemId,
    pub k_factor: f64,
    pub items: RatingDelta,
    /// `None` when either tag is unknown or both items share a tag
    pub tags: Option<TagUpdate>,
}
