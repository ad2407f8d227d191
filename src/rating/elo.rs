//! Elo rating engine
//!
//! Applies the logistic Elo update to both items of a decided comparison
//! and, when the items carry different tags, to their tag groups. The
//! per-pair arithmetic is delegated to the skillratings crate; this module
//! owns the K-factor schedule and the bookkeeping on a [`Collection`].

use crate::config::RatingConfig;
use crate::error::{ArenaError, Result};
use crate::rating::store::Collection;
use crate::types::{RatingDelta, TagName, TagUpdate, VoteOutcome};
use skillratings::elo::{elo, expected_score, EloConfig, EloRating};
use skillratings::Outcomes;
use tracing::debug;

/// Elo rating engine with a match-count damped K-factor
#[derive(Debug, Clone)]
pub struct RatingEngine {
    config: RatingConfig,
}

impl RatingEngine {
    pub fn new(config: RatingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RatingConfig {
        &self.config
    }

    /// K-factor for a pair given both items' match counts
    ///
    /// Full base K while both items are provisional, half when exactly one is
    /// established, a quarter once both are.
    pub fn k_factor(&self, first_matches: u32, second_matches: u32) -> f64 {
        let threshold = self.config.established_match_threshold;
        let base = self.config.base_k_factor;

        match (first_matches < threshold, second_matches < threshold) {
            (true, true) => base,
            (true, false) | (false, true) => base / 2.0,
            (false, false) => base / 4.0,
        }
    }

    /// Expected score of the winner against the loser
    pub fn expected_score(&self, winner_rating: f64, loser_rating: f64) -> f64 {
        let (expected_winner, _) = expected_score(
            &EloRating {
                rating: winner_rating,
            },
            &EloRating {
                rating: loser_rating,
            },
        );
        expected_winner
    }

    /// Apply one decided comparison to a pair of ratings
    pub fn update_pair(&self, winner_rating: f64, loser_rating: f64, k: f64) -> RatingDelta {
        let (winner, loser) = elo(
            &EloRating {
                rating: winner_rating,
            },
            &EloRating {
                rating: loser_rating,
            },
            &Outcomes::WIN,
            &EloConfig { k },
        );

        RatingDelta {
            winner_before: winner_rating,
            winner_after: winner.rating,
            loser_before: loser_rating,
            loser_after: loser.rating,
        }
    }

    /// Record that `winner_id` beat `loser_id`
    ///
    /// Both items must be rated in `collection`. `winner_id == loser_id` is a
    /// caller error and is not checked here.
    ///
    /// Items keep the tag cached at registration. `resolve_tag` is consulted
    /// only for items restored without a cached tag; a resolved tag is cached
    /// on the item. Tag groups are updated with the K derived from the item
    /// match counts, and only when both tags are known and differ.
    pub fn record_outcome(
        &self,
        collection: &mut Collection,
        winner_id: &str,
        loser_id: &str,
        resolve_tag: &mut dyn FnMut(&str) -> Option<TagName>,
    ) -> Result<VoteOutcome> {
        let (winner_rating, winner_matches) = rated_entry(collection, winner_id)?;
        let (loser_rating, loser_matches) = rated_entry(collection, loser_id)?;

        let k = self.k_factor(winner_matches, loser_matches);
        let items = self.update_pair(winner_rating, loser_rating, k);

        if let Some(winner) = collection.item_mut(winner_id) {
            winner.rating = items.winner_after;
            winner.matches += 1;
        }
        if let Some(loser) = collection.item_mut(loser_id) {
            loser.rating = items.loser_after;
            loser.matches += 1;
        }

        let winner_tag = self.tag_of(collection, winner_id, resolve_tag);
        let loser_tag = self.tag_of(collection, loser_id, resolve_tag);

        let tags = match (winner_tag, loser_tag) {
            (Some(winner_tag), Some(loser_tag)) if winner_tag != loser_tag => {
                Some(self.update_tags(collection, winner_tag, loser_tag, k))
            }
            _ => None,
        };

        debug!(
            "Recorded '{}' over '{}' in '{}' (k={}, {:+.2}/{:+.2})",
            winner_id,
            loser_id,
            collection.name(),
            k,
            items.winner_gain(),
            -items.loser_loss()
        );

        Ok(VoteOutcome {
            winner: winner_id.to_string(),
            loser: loser_id.to_string(),
            k_factor: k,
            items,
            tags,
        })
    }

    fn tag_of(
        &self,
        collection: &mut Collection,
        item_id: &str,
        resolve_tag: &mut dyn FnMut(&str) -> Option<TagName>,
    ) -> Option<TagName> {
        if let Some(tag) = collection.item(item_id).and_then(|item| item.tag.clone()) {
            return Some(tag);
        }

        let tag = resolve_tag(item_id)?;
        if let Some(item) = collection.item_mut(item_id) {
            item.tag = Some(tag.clone());
        }
        Some(tag)
    }

    fn update_tags(
        &self,
        collection: &mut Collection,
        winner_tag: TagName,
        loser_tag: TagName,
        k: f64,
    ) -> TagUpdate {
        let initial = self.config.initial_rating;
        let winner_rating = collection.ensure_tag(&winner_tag, initial).rating;
        let loser_rating = collection.ensure_tag(&loser_tag, initial).rating;

        let delta = self.update_pair(winner_rating, loser_rating, k);

        let winner_group = collection.ensure_tag(&winner_tag, initial);
        winner_group.rating = delta.winner_after;
        winner_group.count += 1;

        let loser_group = collection.ensure_tag(&loser_tag, initial);
        loser_group.rating = delta.loser_after;
        loser_group.count += 1;

        TagUpdate {
            winner_tag,
            loser_tag,
            delta,
        }
    }
}

fn rated_entry(collection: &Collection, item_id: &str) -> Result<(f64, u32)> {
    collection
        .item(item_id)
        .map(|item| (item.rating, item.matches))
        .ok_or_else(|| {
            ArenaError::ItemNotFound {
                collection: collection.name().to_string(),
                item_id: item_id.to_string(),
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPSILON: f64 = 1e-9;

    fn engine() -> RatingEngine {
        RatingEngine::new(RatingConfig::default()).unwrap()
    }

    fn no_resolver() -> impl FnMut(&str) -> Option<TagName> {
        |_| None
    }

    fn collection_with(items: &[(&str, &str, f64, u32)]) -> Collection {
        let mut collection = Collection::new("portraits");
        for (id, tag, rating, matches) in items {
            collection.register_item(id, tag, 1000.0);
            let item = collection.item_mut(id).unwrap();
            item.rating = *rating;
            item.matches = *matches;
        }
        collection
    }

    fn closed_form(winner: f64, loser: f64, k: f64) -> (f64, f64) {
        let expected_winner = 1.0 / (1.0 + 10f64.powf((loser - winner) / 400.0));
        let expected_loser = 1.0 - expected_winner;
        (
            winner + k * (1.0 - expected_winner),
            loser + k * (0.0 - expected_loser),
        )
    }

    #[test]
    fn test_k_factor_schedule() {
        let engine = engine();
        assert_eq!(engine.k_factor(0, 0), 32.0);
        assert_eq!(engine.k_factor(29, 29), 32.0);
        assert_eq!(engine.k_factor(30, 29), 16.0);
        assert_eq!(engine.k_factor(29, 30), 16.0);
        assert_eq!(engine.k_factor(30, 30), 8.0);
        assert_eq!(engine.k_factor(500, 31), 8.0);
    }

    #[test]
    fn test_equal_ratings_move_by_half_k() {
        let engine = engine();
        let delta = engine.update_pair(1000.0, 1000.0, 32.0);

        assert!((delta.winner_after - 1016.0).abs() < EPSILON);
        assert!((delta.loser_after - 984.0).abs() < EPSILON);
        assert!((engine.expected_score(1000.0, 1000.0) - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_update_matches_logistic_formula() {
        let engine = engine();
        for (winner, loser, k) in [(1000.0, 1200.0, 32.0), (1350.0, 990.0, 16.0), (875.5, 910.25, 8.0)] {
            let delta = engine.update_pair(winner, loser, k);
            let (expected_winner, expected_loser) = closed_form(winner, loser, k);
            assert!((delta.winner_after - expected_winner).abs() < EPSILON);
            assert!((delta.loser_after - expected_loser).abs() < EPSILON);
        }
    }

    #[test]
    fn test_record_outcome_updates_items_and_tags() {
        let engine = engine();
        let mut collection = collection_with(&[
            ("a.png", "alpha", 1000.0, 0),
            ("b.png", "beta", 1000.0, 0),
        ]);

        let outcome = engine
            .record_outcome(&mut collection, "a.png", "b.png", &mut no_resolver())
            .unwrap();

        assert_eq!(outcome.k_factor, 32.0);
        assert!((collection.item("a.png").unwrap().rating - 1016.0).abs() < EPSILON);
        assert!((collection.item("b.png").unwrap().rating - 984.0).abs() < EPSILON);
        assert_eq!(collection.item("a.png").unwrap().matches, 1);
        assert_eq!(collection.item("b.png").unwrap().matches, 1);

        let tags = outcome.tags.expect("distinct tags should be updated");
        assert_eq!(tags.winner_tag, "alpha");
        assert!((collection.tag("alpha").unwrap().rating - 1016.0).abs() < EPSILON);
        assert!((collection.tag("beta").unwrap().rating - 984.0).abs() < EPSILON);
        assert_eq!(collection.tag("alpha").unwrap().count, 1);
        assert_eq!(collection.tag("beta").unwrap().count, 1);
    }

    #[test]
    fn test_shared_tag_is_left_unchanged() {
        let engine = engine();
        let mut collection = collection_with(&[
            ("a.png", "alpha", 1000.0, 0),
            ("b.png", "alpha", 1000.0, 0),
        ]);

        let outcome = engine
            .record_outcome(&mut collection, "a.png", "b.png", &mut no_resolver())
            .unwrap();

        assert!(outcome.tags.is_none());
        assert_eq!(collection.tag("alpha").unwrap().rating, 1000.0);
        assert_eq!(collection.tag("alpha").unwrap().count, 0);
        assert_eq!(collection.item("a.png").unwrap().matches, 1);
    }

    #[test]
    fn test_tag_update_uses_item_k_factor() {
        let engine = engine();
        let mut collection = collection_with(&[
            ("a.png", "alpha", 1000.0, 40),
            ("b.png", "beta", 1000.0, 45),
        ]);

        let outcome = engine
            .record_outcome(&mut collection, "a.png", "b.png", &mut no_resolver())
            .unwrap();

        // Tag groups have no matches yet, but the items are established
        assert_eq!(outcome.k_factor, 8.0);
        assert!((collection.tag("alpha").unwrap().rating - 1004.0).abs() < EPSILON);
    }

    #[test]
    fn test_unknown_item_is_not_found() {
        let engine = engine();
        let mut collection = collection_with(&[("a.png", "alpha", 1000.0, 0)]);

        let err = engine
            .record_outcome(&mut collection, "a.png", "ghost.png", &mut no_resolver())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ArenaError>(),
            Some(ArenaError::ItemNotFound { item_id, .. }) if item_id == "ghost.png"
        ));
        // Nothing changed
        assert_eq!(collection.item("a.png").unwrap().matches, 0);
    }

    #[test]
    fn test_legacy_item_resolves_and_caches_tag() {
        let engine = engine();
        let mut collection = collection_with(&[("a.png", "alpha", 1000.0, 0)]);
        let mut snapshot = collection.to_snapshot();
        snapshot.elo_ratings.insert("old.png".to_string(), 1000.0);
        let mut collection = Collection::from_snapshot("portraits", snapshot, 1000.0);

        let mut lookups = Vec::new();
        let mut resolver = |item_id: &str| {
            lookups.push(item_id.to_string());
            Some("legacy".to_string())
        };
        let outcome = engine
            .record_outcome(&mut collection, "old.png", "a.png", &mut resolver)
            .unwrap();

        assert_eq!(lookups, vec!["old.png"]);
        assert_eq!(collection.item("old.png").unwrap().tag.as_deref(), Some("legacy"));
        assert_eq!(outcome.tags.unwrap().winner_tag, "legacy");
        assert_eq!(collection.tag("legacy").unwrap().count, 1);
    }

    #[test]
    fn test_unresolvable_tag_skips_tag_update() {
        let engine = engine();
        let mut snapshot = crate::rating::snapshot::CollectionSnapshot::default();
        snapshot.elo_ratings.insert("a.png".to_string(), 1000.0);
        snapshot.elo_ratings.insert("b.png".to_string(), 1000.0);
        let mut collection = Collection::from_snapshot("portraits", snapshot, 1000.0);

        let outcome = engine
            .record_outcome(&mut collection, "a.png", "b.png", &mut no_resolver())
            .unwrap();

        assert!(outcome.tags.is_none());
        assert!(collection.tags().is_empty());
        assert_eq!(collection.item("b.png").unwrap().matches, 1);
    }

    proptest! {
        #[test]
        fn prop_winner_gains_loser_loses_zero_sum(
            winner in 100.0f64..3000.0,
            loser in 100.0f64..3000.0,
            winner_matches in 0u32..100,
            loser_matches in 0u32..100,
        ) {
            let engine = engine();
            let k = engine.k_factor(winner_matches, loser_matches);
            let delta = engine.update_pair(winner, loser, k);

            prop_assert!(delta.winner_after > delta.winner_before);
            prop_assert!(delta.loser_after < delta.loser_before);
            prop_assert!((delta.winner_gain() - delta.loser_loss()).abs() < 1e-9);
            prop_assert!(delta.winner_gain() <= k + 1e-9);
        }
    }
}
