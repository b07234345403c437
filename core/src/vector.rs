//! Exact cosine-similarity search over dense embeddings.
//!
//! Every query scans all stored vectors (O(N·d)), which is adequate at corpus
//! scale and keeps results exact. Vectors are kept as `f32` arrays with their
//! L2 norm precomputed at insertion time.

use crate::error::{IndexError, Result};
use crate::types::{DocId, ScoredResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    pub path: String,
    pub title: String,
    pub embedding: Vec<f32>,
    pub norm: f32,
}

/// Brute-force vector store. The first inserted vector fixes the dimension
/// unless one was given up front with [`VectorStore::with_dimension`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorStore {
    entries: BTreeMap<DocId, VectorEntry>,
    ids: HashMap<String, DocId>,
    dimension: Option<usize>,
    next_id: DocId,
}

impl VectorStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension: Some(dimension), ..Self::default() }
    }

    pub fn dimension(&self) -> Option<usize> { self.dimension }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn contains(&self, path: &str) -> bool { self.ids.contains_key(path) }

    /// Fails if a vector of `len` would be rejected: [`IndexError::DimensionMismatch`]
    /// against an established dimension, [`IndexError::EmptyEmbedding`] otherwise.
    pub fn check_dimension(&self, len: usize) -> Result<()> {
        match self.dimension {
            Some(expected) if expected != len => Err(IndexError::DimensionMismatch { expected, got: len }),
            None if len == 0 => Err(IndexError::EmptyEmbedding),
            _ => Ok(()),
        }
    }

    /// Inserts or replaces the vector for `path`. The store is untouched on error.
    #[instrument(skip_all, fields(store_size = self.entries.len()))]
    pub fn add_document(&mut self, path: &str, title: &str, embedding: Vec<f32>) -> Result<DocId> {
        self.check_dimension(embedding.len())?;
        if self.dimension.is_none() {
            tracing::debug!(dimension = embedding.len(), "vector dimension established");
            self.dimension = Some(embedding.len());
        }

        let id = match self.ids.get(path).copied() {
            Some(existing) => existing,
            None => {
                let id = self.next_id;
                self.next_id += 1;
                self.ids.insert(path.to_string(), id);
                id
            }
        };
        let norm = l2_norm(&embedding);
        self.entries.insert(id, VectorEntry { path: path.to_string(), title: title.to_string(), embedding, norm });
        Ok(id)
    }

    pub fn remove_document(&mut self, path: &str) -> bool {
        match self.ids.remove(path) {
            Some(id) => {
                self.entries.remove(&id);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, path: &str) -> Option<&VectorEntry> {
        self.ids.get(path).and_then(|id| self.entries.get(id))
    }

    /// Top `limit` stored vectors by cosine similarity to `query`, descending;
    /// ties by insertion order.
    #[instrument(skip_all, fields(store_size = self.entries.len(), limit = limit))]
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<ScoredResult>> {
        let Some(expected) = self.dimension else {
            return Ok(Vec::new());
        };
        if query.len() != expected {
            return Err(IndexError::DimensionMismatch { expected, got: query.len() });
        }
        if limit == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_norm = l2_norm(query);
        let mut scored: Vec<(DocId, f32)> = self
            .entries
            .iter()
            .map(|(&id, entry)| (id, cosine(query, query_norm, &entry.embedding, entry.norm)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .filter_map(|(id, score)| {
                self.entries.get(&id).map(|e| ScoredResult { path: e.path.clone(), title: e.title.clone(), score })
            })
            .collect())
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.ids.keys().map(String::as_str)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ids.len() != self.entries.len() {
            return Err(corrupt(format!("{} path mappings for {} vectors", self.ids.len(), self.entries.len())));
        }
        for (path, id) in &self.ids {
            match self.entries.get(id) {
                Some(entry) if &entry.path == path => {}
                _ => return Err(corrupt(format!("path {path} does not resolve to its vector"))),
            }
            if *id >= self.next_id {
                return Err(corrupt(format!("vector id {id} not below next id {}", self.next_id)));
            }
        }
        if !self.entries.is_empty() && self.dimension.is_none() {
            return Err(corrupt("vectors stored without an established dimension".to_string()));
        }
        if let Some(dim) = self.dimension {
            for entry in self.entries.values() {
                if entry.embedding.len() != dim {
                    return Err(corrupt(format!(
                        "{} has dimension {} but store dimension is {dim}",
                        entry.path,
                        entry.embedding.len()
                    )));
                }
                let norm = l2_norm(&entry.embedding);
                if !entry.norm.is_finite() || (entry.norm - norm).abs() > 1e-3 * norm.max(1.0) {
                    return Err(corrupt(format!("stale norm for {}", entry.path)));
                }
            }
        }
        Ok(())
    }
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity given precomputed norms. Zero-norm inputs score 0.
pub fn cosine(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum();
    let sim = dot / (a_norm * b_norm);
    if sim.is_finite() {
        sim.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

fn corrupt(msg: String) -> IndexError {
    IndexError::IndexCorruption(format!("vector store: {msg}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> VectorStore {
        let mut s = VectorStore::new();
        s.add_document("a", "A", vec![1.0, 0.0, 0.0]).unwrap();
        s.add_document("b", "B", vec![0.0, 1.0, 0.0]).unwrap();
        s.add_document("c", "C", vec![0.7, 0.7, 0.0]).unwrap();
        s
    }

    #[test]
    fn first_vector_fixes_dimension() {
        let s = store();
        assert_eq!(s.dimension(), Some(3));
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn stored_vector_is_its_own_nearest_neighbour() {
        let s = store();
        for (path, v) in [("a", [1.0, 0.0, 0.0]), ("b", [0.0, 1.0, 0.0]), ("c", [0.7, 0.7, 0.0])] {
            let hits = s.search(&v, 3).unwrap();
            assert_eq!(hits[0].path, path);
            assert!((hits[0].score - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn results_sorted_descending() {
        let hits = store().search(&[0.9, 0.1, 0.0], 3).unwrap();
        let paths: Vec<_> = hits.iter().map(|h| h.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "c", "b"]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn mismatched_insert_leaves_store_unchanged() {
        let mut s = store();
        let before = s.clone();
        let err = s.add_document("d", "D", vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { expected: 3, got: 2 }));
        assert_eq!(s, before);
    }

    #[test]
    fn mismatched_query_is_an_error() {
        let err = store().search(&[1.0], 5).unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { expected: 3, got: 1 }));
    }

    #[test]
    fn empty_vector_is_rejected_on_empty_store() {
        let mut s = VectorStore::new();
        let err = s.add_document("a", "A", Vec::new()).unwrap_err();
        assert!(matches!(err, IndexError::EmptyEmbedding));
        assert_eq!(s.dimension(), None);

        let mut fixed = VectorStore::with_dimension(4);
        let err = fixed.add_document("a", "A", Vec::new()).unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { expected: 4, got: 0 }));
    }

    #[test]
    fn zero_norm_scores_zero() {
        let mut s = store();
        s.add_document("zero", "Zero", vec![0.0, 0.0, 0.0]).unwrap();
        let hits = s.search(&[0.0, 1.0, 0.0], 4).unwrap();
        let zero = hits.iter().find(|h| h.path == "zero").unwrap();
        assert_eq!(zero.score, 0.0);

        let hits = s.search(&[0.0, 0.0, 0.0], 4).unwrap();
        assert!(hits.iter().all(|h| h.score == 0.0));
        // all tied: insertion order
        let paths: Vec<_> = hits.iter().map(|h| h.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "b", "c", "zero"]);
    }

    #[test]
    fn replace_and_remove() {
        let mut s = store();
        s.add_document("a", "A2", vec![0.0, 0.0, 1.0]).unwrap();
        assert_eq!(s.len(), 3);
        assert_eq!(s.get("a").unwrap().title, "A2");
        let hits = s.search(&[0.0, 0.0, 1.0], 1).unwrap();
        assert_eq!(hits[0].path, "a");

        assert!(s.remove_document("a"));
        assert!(!s.remove_document("a"));
        assert!(!s.contains("a"));
        assert!(s.search(&[0.0, 0.0, 1.0], 3).unwrap().iter().all(|h| h.path != "a"));
    }

    #[test]
    fn dimension_survives_emptying() {
        let mut s = store();
        for p in ["a", "b", "c"] {
            s.remove_document(p);
        }
        assert!(s.is_empty());
        assert!(s.add_document("d", "D", vec![1.0]).is_err());
        assert!(s.search(&[1.0, 0.0, 0.0], 3).unwrap().is_empty());
    }

    #[test]
    fn search_without_dimension_is_empty() {
        assert!(VectorStore::new().search(&[1.0, 2.0], 3).unwrap().is_empty());
    }

    #[test]
    fn validate_catches_wrong_length() {
        let mut s = store();
        s.validate().unwrap();
        s.entries.get_mut(&0).unwrap().embedding.push(1.0);
        assert!(matches!(s.validate(), Err(IndexError::IndexCorruption(_))));
    }
}
