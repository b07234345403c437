//! lexsem-core: hybrid lexical + semantic document retrieval.
//!
//! - [`index::InvertedIndex`]: term → posting list, smoothed TF-IDF scoring
//! - [`vector::VectorStore`]: exact cosine search over fixed-dimension embeddings
//! - [`hybrid`]: weighted-sum fusion of both rankings
//! - [`manager::IndexManager`]: atomic upsert/delete across both indexes, snapshots
//! - [`engine::Engine`]: the query API over raw text
//! - [`source::DirectorySource`]: documents read from a file or directory tree

pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod hybrid;
pub mod index;
pub mod manager;
pub mod persist;
pub mod source;
pub mod tokenizer;
pub mod traits;
pub mod types;
pub mod vector;

pub use config::SearchConfig;
pub use embedding::HashingEmbedder;
pub use engine::Engine;
pub use error::{EmbedError, IndexError, Result};
pub use hybrid::{fuse, min_max_normalize, FusionWeights, HybridRanker};
pub use index::{InvertedIndex, Posting};
pub use manager::{IndexManager, IndexSnapshot, IndexStats, IngestReport};
pub use source::DirectorySource;
pub use tokenizer::{Language, RegexNormalizer};
pub use traits::{DocumentSource, Embedder, TextNormalizer};
pub use types::{DocId, PreparedDocument, RawDocument, ScoredResult, SearchMode, SourceFailure};
pub use vector::VectorStore;
