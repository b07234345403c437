//! Search defaults shared by the indexer and the server.
//!
//! Every field has a default, so a config file only needs the keys it changes:
//!
//! ```json
//! { "language": "french", "weights": { "lexical": 0.7, "semantic": 0.3 } }
//! ```

use crate::embedding::DEFAULT_DIMENSION;
use crate::error::Result;
use crate::hybrid::FusionWeights;
use crate::tokenizer::Language;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Results returned when a query does not say.
    pub default_limit: usize,
    /// Upper bound applied to any requested limit.
    pub max_limit: usize,
    pub weights: FusionWeights,
    pub language: Language,
    /// Output dimension of the built-in hashing embedder.
    pub embedding_dimension: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
            weights: FusionWeights::default(),
            language: Language::default(),
            embedding_dimension: DEFAULT_DIMENSION,
        }
    }
}

impl SearchConfig {
    /// Loads a JSON config file and validates its weights.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: SearchConfig = serde_json::from_str(&raw)?;
        config.weights.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// `requested` (or the default when absent) clamped into `1..=max_limit`.
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_limit).clamp(1, self.max_limit.max(1))
    }
}
