use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dense internal document identifier, assigned in insertion order.
pub type DocId = u32;

/// One ranked hit returned by any of the searches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub path: String,
    pub title: String,
    pub score: f32,
}

/// Which signal(s) a query is answered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[serde(alias = "keyword")]
    Lexical,
    Semantic,
    #[default]
    Hybrid,
}

impl SearchMode {
    pub fn needs_tokens(self) -> bool { matches!(self, SearchMode::Lexical | SearchMode::Hybrid) }
    pub fn needs_embedding(self) -> bool { matches!(self, SearchMode::Semantic | SearchMode::Hybrid) }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchMode::Lexical => "lexical",
            SearchMode::Semantic => "semantic",
            SearchMode::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            // "keyword" is accepted for clients of the older API
            "lexical" | "keyword" => Ok(SearchMode::Lexical),
            "semantic" => Ok(SearchMode::Semantic),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(format!("unknown search mode: {other}")),
        }
    }
}

/// A document as supplied by a [`DocumentSource`](crate::traits::DocumentSource), before analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub path: String,
    pub title: String,
    pub text: String,
}

/// A document ready for both indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedDocument {
    pub path: String,
    pub title: String,
    pub tokens: Vec<String>,
    pub embedding: Vec<f32>,
}

/// A document that could not be read or prepared. Non-fatal during bulk ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub path: String,
    pub reason: String,
}

impl SourceFailure {
    pub fn new(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self { path: path.into(), reason: reason.to_string() }
    }
}
