//! Seams to the collaborators that feed the indexes.

use crate::error::EmbedError;
use crate::types::{RawDocument, SourceFailure};

/// Turns raw text into the ordered token stream stored in the inverted index.
pub trait TextNormalizer: Send + Sync {
    fn normalize(&self, text: &str) -> Vec<String>;
}

/// Turns text into a fixed-length vector.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Output dimension, if known before the first call.
    fn dimension(&self) -> Option<usize> { None }
}

/// Anything yielding documents for bulk ingestion. Individual items may fail
/// without ending the iteration.
pub trait DocumentSource: Iterator<Item = Result<RawDocument, SourceFailure>> {}

impl<T> DocumentSource for T where T: Iterator<Item = Result<RawDocument, SourceFailure>> {}

impl<F> TextNormalizer for F
where
    F: Fn(&str) -> Vec<String> + Send + Sync,
{
    fn normalize(&self, text: &str) -> Vec<String> { self(text) }
}
