//! Utility functions for the rating service

use crate::error::{ArenaError, Result};
use chrono::{DateTime, Utc};

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Calculate the absolute difference between two ratings
pub fn rating_difference(rating1: f64, rating2: f64) -> f64 {
    (rating1 - rating2).abs()
}

/// Reject collection names and item identifiers that could escape their directory
pub fn validate_identifier(kind: &str, value: &str) -> Result<()> {
    let invalid = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains('/')
        || value.contains('\\')
        || value.contains('\0');

    if invalid {
        return Err(ArenaError::InvalidRequest {
            reason: format!("Invalid {} identifier: {:?}", kind, value),
        }
        .into());
    }

    Ok(())
}
