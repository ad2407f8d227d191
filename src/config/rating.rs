//! Rating system configuration

use crate::error::{ArenaError, Result};
use serde::{Deserialize, Serialize};

/// Tunables for the Elo engine and the matchmaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Rating given to newly registered items and tags
    pub initial_rating: f64,
    /// K-factor used while both items are still provisional
    pub base_k_factor: f64,
    /// Match count at which an item stops being provisional
    pub established_match_threshold: u32,
    /// Items with fewer matches than this are paired with each other first
    pub under_sampled_threshold: u32,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            initial_rating: 1000.0,
            base_k_factor: 32.0,
            established_match_threshold: 30,
            under_sampled_threshold: 10,
        }
    }
}

impl RatingConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.initial_rating.is_finite() {
            return Err(ArenaError::Configuration {
                message: "Initial rating must be finite".to_string(),
            }
            .into());
        }

        if !(self.base_k_factor.is_finite() && self.base_k_factor > 0.0) {
            return Err(ArenaError::Configuration {
                message: "Base K-factor must be positive".to_string(),
            }
            .into());
        }

        if self.established_match_threshold == 0 {
            return Err(ArenaError::Configuration {
                message: "Established match threshold must be at least 1".to_string(),
            }
            .into());
        }

        if self.under_sampled_threshold == 0 {
            return Err(ArenaError::Configuration {
                message: "Under-sampled threshold must be at least 1".to_string(),
            }
            .into());
        }

        Ok(())
    }
}
