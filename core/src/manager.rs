//! Owner of both indexes.
//!
//! The inverted index and the vector store sit behind a single
//! [`parking_lot::RwLock`]: queries share the read lock, every mutation holds
//! the write lock for the whole document, so a reader never sees a document
//! present in one index but not the other, nor a half-updated posting list.

use crate::error::{IndexError, Result};
use crate::hybrid::{FusionWeights, HybridRanker};
use crate::index::InvertedIndex;
use crate::types::{PreparedDocument, ScoredResult, SearchMode, SourceFailure};
use crate::vector::VectorStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::instrument;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Default)]
struct Indexes {
    lexical: InvertedIndex,
    vectors: VectorStore,
}

/// Full state of both indexes, detached from the lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub version: u32,
    pub lexical: InvertedIndex,
    pub vectors: VectorStore,
}

impl IndexSnapshot {
    /// Structural checks on each index plus agreement between them.
    pub fn validate(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(IndexError::IndexCorruption(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                self.version
            )));
        }
        self.lexical.validate()?;
        self.vectors.validate()?;

        let lexical: HashSet<&str> = self.lexical.paths().collect();
        let vectors: HashSet<&str> = self.vectors.paths().collect();
        if let Some(path) = lexical.symmetric_difference(&vectors).next() {
            return Err(IndexError::IndexCorruption(format!("{path} is present in only one index")));
        }
        for path in &lexical {
            let vector_title = self.vectors.get(path).map(|e| e.title.as_str());
            if self.lexical.title(path) != vector_title {
                return Err(IndexError::IndexCorruption(format!("{path} has diverging titles")));
            }
        }
        Ok(())
    }
}

/// Outcome of a bulk ingestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<SourceFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub documents: usize,
    pub terms: usize,
    pub dimension: Option<usize>,
}

#[derive(Debug, Default)]
pub struct IndexManager {
    inner: RwLock<Indexes>,
}

impl IndexManager {
    pub fn new() -> Self { Self::default() }

    /// A manager whose vector dimension is fixed before the first insert.
    pub fn with_dimension(dimension: usize) -> Self {
        Self { inner: RwLock::new(Indexes { lexical: InvertedIndex::new(), vectors: VectorStore::with_dimension(dimension) }) }
    }

    pub fn from_snapshot(snapshot: IndexSnapshot) -> Result<Self> {
        let manager = Self::new();
        manager.restore(snapshot)?;
        Ok(manager)
    }

    /// Adds or replaces `path` in both indexes as one unit.
    ///
    /// A dimension mismatch is detected before anything is touched, so the
    /// previous version of the document (if any) stays intact.
    #[instrument(skip_all, fields(path = path, tokens = tokens.len()))]
    pub fn upsert<S: AsRef<str>>(&self, path: &str, title: &str, tokens: &[S], embedding: Vec<f32>) -> Result<()> {
        let mut guard = self.inner.write();
        guard.vectors.check_dimension(embedding.len())?;

        let Indexes { lexical, vectors } = &mut *guard;
        lexical.add_document(path, title, tokens);
        if let Err(err) = vectors.add_document(path, title, embedding) {
            // leave no half-indexed document behind
            lexical.remove_document(path);
            vectors.remove_document(path);
            tracing::warn!(path, error = %err, "vector insert failed, lexical entry rolled back");
            return Err(err);
        }
        Ok(())
    }

    /// Removes `path` from both indexes. Returns whether it was indexed.
    pub fn delete(&self, path: &str) -> bool {
        let mut guard = self.inner.write();
        let lexical = guard.lexical.remove_document(path);
        let vectors = guard.vectors.remove_document(path);
        if lexical || vectors {
            tracing::debug!(path, "document deleted");
        }
        lexical || vectors
    }

    /// Upserts every prepared document, recording failures instead of stopping.
    ///
    /// The write lock is taken per document, so queries interleave with a long ingestion.
    pub fn bulk_upsert<I>(&self, items: I) -> IngestReport
    where
        I: IntoIterator<Item = std::result::Result<PreparedDocument, SourceFailure>>,
    {
        let mut report = IngestReport::default();
        for item in items {
            match item {
                Ok(doc) => match self.upsert(&doc.path, &doc.title, doc.tokens.as_slice(), doc.embedding) {
                    Ok(()) => report.succeeded.push(doc.path),
                    Err(err) => {
                        tracing::warn!(path = %doc.path, error = %err, "document rejected");
                        report.failed.push(SourceFailure::new(doc.path, err));
                    }
                },
                Err(failure) => {
                    tracing::warn!(path = %failure.path, reason = %failure.reason, "document source failure");
                    report.failed.push(failure);
                }
            }
        }
        tracing::info!(succeeded = report.succeeded.len(), failed = report.failed.len(), "bulk ingestion finished");
        report
    }

    /// Answers a query with one or both signals. `embedding` is ignored in
    /// lexical mode and `tokens` in semantic mode.
    pub fn search<S: AsRef<str>>(
        &self,
        tokens: &[S],
        embedding: &[f32],
        mode: SearchMode,
        limit: usize,
        weights: FusionWeights,
    ) -> Result<Vec<ScoredResult>> {
        weights.validate()?;
        let guard = self.inner.read();
        match mode {
            SearchMode::Lexical => Ok(guard.lexical.search(tokens, limit)),
            SearchMode::Semantic => guard.vectors.search(embedding, limit),
            SearchMode::Hybrid => HybridRanker::new(&guard.lexical, &guard.vectors).search(tokens, embedding, limit, weights),
        }
    }

    pub fn snapshot(&self) -> IndexSnapshot {
        let guard = self.inner.read();
        IndexSnapshot { version: SNAPSHOT_VERSION, lexical: guard.lexical.clone(), vectors: guard.vectors.clone() }
    }

    /// Replaces the whole state with `snapshot` after validating it. On error
    /// the current state is kept.
    pub fn restore(&self, snapshot: IndexSnapshot) -> Result<()> {
        snapshot.validate()?;
        let IndexSnapshot { lexical, vectors, .. } = snapshot;
        let documents = lexical.len();
        *self.inner.write() = Indexes { lexical, vectors };
        tracing::info!(documents, "index restored");
        Ok(())
    }

    pub fn len(&self) -> usize { self.inner.read().lexical.len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
    pub fn contains(&self, path: &str) -> bool { self.inner.read().lexical.contains(path) }
    pub fn dimension(&self) -> Option<usize> { self.inner.read().vectors.dimension() }

    pub fn title(&self, path: &str) -> Option<String> {
        self.inner.read().lexical.title(path).map(str::to_string)
    }

    pub fn stats(&self) -> IndexStats {
        let guard = self.inner.read();
        IndexStats { documents: guard.lexical.len(), terms: guard.lexical.term_count(), dimension: guard.vectors.dimension() }
    }
}
