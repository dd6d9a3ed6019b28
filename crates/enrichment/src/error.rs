//! Error types for storage and the batch pipeline.

use std::path::PathBuf;

use thiserror::Error;

use stash_llm::LlmError;

/// Storage collaborator failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Bookmark not found: {id}")]
    NotFound { id: String },

    #[error("Bookmark already exists: {id}")]
    Duplicate { id: String },

    #[error("Failed to read store {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to write store {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Other(String),
}

/// Result alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures that abort a whole batch.
///
/// Everything per-bookmark is folded into the batch result instead.
#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to load bookmarks: {0}")]
    Store(#[from] StoreError),

    #[error("Prompt template error: {reason}")]
    Template { reason: String },

    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl EnrichmentError {
    /// Whether this failure should stop a whole batch.
    pub fn is_fatal(&self) -> bool {
        match self {
            EnrichmentError::Configuration(_) | EnrichmentError::Store(_) => true,
            EnrichmentError::Llm(e) => matches!(e, LlmError::Configuration { .. }),
            EnrichmentError::Template { .. } => false,
        }
    }
}

/// Result alias for enrichment operations.
pub type EnrichmentResult<T> = Result<T, EnrichmentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StoreError::NotFound {
            id: "tw-1".to_string(),
        };
        assert_eq!(err.to_string(), "Bookmark not found: tw-1");

        let err = EnrichmentError::from(err);
        assert_eq!(err.to_string(), "Failed to load bookmarks: Bookmark not found: tw-1");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(EnrichmentError::from(LlmError::configuration("no provider")).is_fatal());
        assert!(EnrichmentError::Configuration("bad".to_string()).is_fatal());
        assert!(!EnrichmentError::Template {
            reason: "missing".to_string()
        }
        .is_fatal());
    }
}
