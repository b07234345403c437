//! Error types for lexsem-core.

use thiserror::Error;

/// Errors raised by the indexes, the manager and persistence.
#[derive(Error, Debug)]
pub enum IndexError {
    /// An embedding disagrees with the store's established dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A zero-length embedding was offered before any dimension was established.
    #[error("embedding has no components")]
    EmptyEmbedding,

    /// A fusion weight was negative or not a finite number.
    #[error("invalid {name} weight: {value}")]
    InvalidWeight { name: &'static str, value: f32 },

    /// A single document could not be read or prepared during ingestion.
    #[error("document source failure for {path}: {reason}")]
    DocumentSourceFailure { path: String, reason: String },

    /// A snapshot failed validation and was not loaded.
    #[error("index corruption: {0}")]
    IndexCorruption(String),

    /// The embedder failed to produce a vector.
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    /// Snapshot encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by [`Embedder`](crate::traits::Embedder) implementations.
#[derive(Error, Debug, Clone)]
pub enum EmbedError {
    /// The backing model or service failed.
    #[error("embedder backend failed: {0}")]
    Backend(String),
}

impl From<bincode::Error> for IndexError {
    fn from(err: bincode::Error) -> Self {
        IndexError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        IndexError::Serialization(err.to_string())
    }
}

/// Result type for lexsem-core operations.
pub type Result<T> = std::result::Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_display() {
        let err = IndexError::DimensionMismatch { expected: 384, got: 512 };
        assert_eq!(err.to_string(), "embedding dimension mismatch: expected 384, got 512");
    }

    #[test]
    fn empty_embedding_names_no_dimension() {
        assert_eq!(IndexError::EmptyEmbedding.to_string(), "embedding has no components");
    }

    #[test]
    fn embed_error_converts() {
        let err: IndexError = EmbedError::Backend("model offline".into()).into();
        assert!(matches!(err, IndexError::Embedding(_)));
        assert!(err.to_string().contains("model offline"));
    }
}
