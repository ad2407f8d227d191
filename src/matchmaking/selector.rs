//! Matchmaker choosing which two items to compare next
//!
//! Selection runs in two phases:
//! - Bootstrap: while at least two candidates are under-sampled, pick two of
//!   them uniformly at random, so every item collects a baseline of matches.
//! - Proximity: otherwise scan every candidate pair and return the one with
//!   the smallest rating difference, first found in ascending identifier order.
//!
//! The proximity scan is O(n²) in the number of candidates. That is fine for
//! collections small enough to judge by hand (hundreds of items).

use crate::error::{ArenaError, Result};
use crate::rating::store::Collection;
use crate::types::{ItemId, ItemRating, MatchPair};
use crate::utils::rating_difference;
use rand::seq::index::sample;
use rand::Rng;
use tracing::debug;

/// Selects the next pair of items to compare
#[derive(Debug, Clone)]
pub struct Matchmaker {
    under_sampled_threshold: u32,
}

impl Matchmaker {
    pub fn new(under_sampled_threshold: u32) -> Self {
        Self {
            under_sampled_threshold,
        }
    }

    /// Select the next pair using the thread-local RNG
    pub fn select_pair(&self, collection: &Collection) -> Result<MatchPair> {
        self.select_pair_with(collection, &mut rand::thread_rng())
    }

    /// Select the next pair with a caller-supplied RNG
    ///
    /// Only rated items still present in the item source are candidates.
    /// Fails with `InsufficientItems` when fewer than two exist.
    pub fn select_pair_with<R: Rng + ?Sized>(
        &self,
        collection: &Collection,
        rng: &mut R,
    ) -> Result<MatchPair> {
        let candidates = collection.candidates();
        if candidates.len() < 2 {
            return Err(ArenaError::InsufficientItems {
                collection: collection.name().to_string(),
                rated: candidates.len(),
            }
            .into());
        }

        let under_sampled: Vec<&ItemId> = candidates
            .iter()
            .filter(|(_, item)| item.matches < self.under_sampled_threshold)
            .map(|(item_id, _)| *item_id)
            .collect();

        if under_sampled.len() >= 2 {
            let picks = sample(rng, under_sampled.len(), 2);
            let pair = MatchPair::new(
                under_sampled[picks.index(0)].clone(),
                under_sampled[picks.index(1)].clone(),
            );
            debug!(
                "Bootstrap pair for '{}': {} vs {} ({} under-sampled)",
                collection.name(),
                pair.first,
                pair.second,
                under_sampled.len()
            );
            return Ok(pair);
        }

        let pair = closest_pair(&candidates).ok_or_else(|| ArenaError::Internal {
            message: format!(
                "No comparable pair among {} candidates in '{}'",
                candidates.len(),
                collection.name()
            ),
        })?;
        debug!(
            "Closest-rating pair for '{}': {} vs {}",
            collection.name(),
            pair.first,
            pair.second
        );
        Ok(pair)
    }
}

/// Pair with the smallest rating difference, first found in slice order
///
/// Pairs whose difference is not a number are never selected.
pub fn closest_pair(candidates: &[(&ItemId, &ItemRating)]) -> Option<MatchPair> {
    let mut best: Option<(f64, usize, usize)> = None;

    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            let diff = rating_difference(candidates[i].1.rating, candidates[j].1.rating);
            let closer = match best {
                Some((best_diff, _, _)) => diff < best_diff,
                None => !diff.is_nan(),
            };
            if closer {
                best = Some((diff, i, j));
            }
        }
    }

    best.map(|(_, i, j)| MatchPair::new(candidates[i].0.clone(), candidates[j].0.clone()))
}
