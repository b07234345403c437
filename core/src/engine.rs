//! Query API: raw text in, ranked documents out.
//!
//! [`Engine`] pairs an [`IndexManager`] with the collaborators that turn text
//! into tokens and vectors. It is the single entry point wrapped by the HTTP
//! server and the indexer CLI.

use crate::config::SearchConfig;
use crate::embedding::HashingEmbedder;
use crate::error::{IndexError, Result};
use crate::hybrid::FusionWeights;
use crate::manager::{IndexManager, IngestReport};
use crate::tokenizer::RegexNormalizer;
use crate::traits::{DocumentSource, Embedder, TextNormalizer};
use crate::types::{PreparedDocument, RawDocument, ScoredResult, SearchMode, SourceFailure};
use std::sync::Arc;
use tracing::instrument;

pub struct Engine {
    manager: Arc<IndexManager>,
    normalizer: Box<dyn TextNormalizer>,
    embedder: Box<dyn Embedder>,
    config: SearchConfig,
}

impl Engine {
    pub fn new<N, E>(manager: Arc<IndexManager>, normalizer: N, embedder: E, config: SearchConfig) -> Self
    where
        N: TextNormalizer + 'static,
        E: Embedder + 'static,
    {
        Self { manager, normalizer: Box::new(normalizer), embedder: Box::new(embedder), config }
    }

    /// An engine on a fresh manager using the built-in normalizer and hashing embedder.
    pub fn from_config(config: SearchConfig) -> Self {
        let manager = Arc::new(IndexManager::with_dimension(config.embedding_dimension));
        Self::with_manager(manager, config)
    }

    /// Built-in collaborators around an existing (e.g. restored) manager.
    pub fn with_manager(manager: Arc<IndexManager>, config: SearchConfig) -> Self {
        let normalizer = RegexNormalizer::new(config.language);
        let embedder = HashingEmbedder::new(config.embedding_dimension, normalizer);
        Self::new(manager, normalizer, embedder, config)
    }

    pub fn manager(&self) -> &Arc<IndexManager> { &self.manager }
    pub fn config(&self) -> &SearchConfig { &self.config }

    /// Runs the collaborators over one raw document.
    pub fn prepare(&self, raw: RawDocument) -> std::result::Result<PreparedDocument, SourceFailure> {
        if raw.text.trim().is_empty() {
            return Err(SourceFailure::new(raw.path, "no text extracted"));
        }
        let tokens = self.normalizer.normalize(&raw.text);
        let embedding = match self.embedder.embed(&raw.text) {
            Ok(v) => v,
            Err(err) => return Err(SourceFailure::new(raw.path, err)),
        };
        Ok(PreparedDocument { path: raw.path, title: raw.title, tokens, embedding })
    }

    pub fn index_document(&self, raw: RawDocument) -> Result<()> {
        let doc = self
            .prepare(raw)
            .map_err(|f| IndexError::DocumentSourceFailure { path: f.path, reason: f.reason })?;
        self.manager.upsert(&doc.path, &doc.title, doc.tokens.as_slice(), doc.embedding)
    }

    /// Ingests every document of `source`; failures are reported, never fatal.
    pub fn index_source<S: DocumentSource>(&self, source: S) -> IngestReport {
        self.manager.bulk_upsert(source.map(|item| item.and_then(|raw| self.prepare(raw))))
    }

    pub fn delete(&self, path: &str) -> bool { self.manager.delete(path) }

    /// Searches with `mode`. `limit` and `weights` fall back to the configured
    /// defaults; the limit is clamped to `1..=max_limit`.
    #[instrument(skip_all, fields(mode = %mode))]
    pub fn search(
        &self,
        query_text: &str,
        mode: SearchMode,
        limit: Option<usize>,
        weights: Option<FusionWeights>,
    ) -> Result<Vec<ScoredResult>> {
        let limit = self.config.clamp_limit(limit);
        let weights = weights.unwrap_or(self.config.weights);
        weights.validate()?;

        let tokens = if mode.needs_tokens() { self.normalizer.normalize(query_text) } else { Vec::new() };
        let embedding = if mode.needs_embedding() { self.embedder.embed(query_text)? } else { Vec::new() };

        let results = self.manager.search(tokens.as_slice(), &embedding, mode, limit, weights)?;
        tracing::debug!(hits = results.len(), limit, "query answered");
        Ok(results)
    }
}
