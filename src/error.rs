//! Error types for the rating service
//!
//! Domain failures are described by [`ArenaError`] and travel through the
//! crate inside `anyhow::Error`, so callers that need to react to a specific
//! failure recover it with `downcast_ref::<ArenaError>()`.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific rating scenarios
#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("Collection not found: {collection}")]
    CollectionNotFound { collection: String },

    #[error("Item not found in collection '{collection}': {item_id}")]
    ItemNotFound { collection: String, item_id: String },

    #[error("Collection '{collection}' has {rated} rated item(s); at least two are required")]
    InsufficientItems { collection: String, rated: usize },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Persistence failed: {message}")]
    Persistence { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal service error: {message}")]
    Internal { message: String },
}

impl ArenaError {
    /// Whether the error means the requested collection or item does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ArenaError::CollectionNotFound { .. } | ArenaError::ItemNotFound { .. }
        )
    }
}

/// Find the domain error carried by an `anyhow::Error`, if any
pub fn arena_error(error: &anyhow::Error) -> Option<&ArenaError> {
    error.downcast_ref::<ArenaError>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let missing = ArenaError::CollectionNotFound {
            collection: "portraits".to_string(),
        };
        assert!(missing.is_not_found());

        let insufficient = ArenaError::InsufficientItems {
            collection: "portraits".to_string(),
            rated: 1,
        };
        assert!(!insufficient.is_not_found());
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let error: anyhow::Error = ArenaError::ItemNotFound {
            collection: "portraits".to_string(),
            item_id: "a.png".to_string(),
        }
        .into();

        let domain = arena_error(&error).expect("domain error should survive conversion");
        assert!(domain.is_not_found());
        assert_eq!(
            error.to_string(),
            "Item not found in collection 'portraits': a.png"
        );
    }
}
