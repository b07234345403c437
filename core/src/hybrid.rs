//! Weighted-sum fusion of lexical and semantic rankings.
//!
//! `fused(d) = w_lex * lexical(d) + w_sem * semantic(d)` over the union of both
//! candidate lists; a document absent from one list contributes 0 for that
//! signal. Raw scores are fused as-is. Lexical scores are unbounded while cosine
//! similarities live in [-1, 1], so callers that want comparable scales apply
//! [`min_max_normalize`] to each list and call [`fuse`] themselves.

use crate::error::{IndexError, Result};
use crate::index::InvertedIndex;
use crate::types::ScoredResult;
use crate::vector::VectorStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub lexical: f32,
    pub semantic: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { lexical: 0.5, semantic: 0.5 }
    }
}

impl FusionWeights {
    /// Validated constructor. Weights need not sum to 1.
    pub fn new(lexical: f32, semantic: f32) -> Result<Self> {
        let weights = Self { lexical, semantic };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<()> {
        check_weight("lexical", self.lexical)?;
        check_weight("semantic", self.semantic)
    }
}

fn check_weight(name: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(IndexError::InvalidWeight { name, value })
    }
}

/// Borrows both indexes for the duration of one query.
pub struct HybridRanker<'a> {
    lexical: &'a InvertedIndex,
    vectors: &'a VectorStore,
}

impl<'a> HybridRanker<'a> {
    pub fn new(lexical: &'a InvertedIndex, vectors: &'a VectorStore) -> Self {
        Self { lexical, vectors }
    }

    /// Queries both indexes for `limit` candidates each and fuses them.
    #[instrument(skip_all, fields(limit = limit))]
    pub fn search<S: AsRef<str>>(
        &self,
        query_tokens: &[S],
        query_embedding: &[f32],
        limit: usize,
        weights: FusionWeights,
    ) -> Result<Vec<ScoredResult>> {
        weights.validate()?;
        let lexical = self.lexical.search(query_tokens, limit);
        let semantic = self.vectors.search(query_embedding, limit)?;
        tracing::debug!(lexical = lexical.len(), semantic = semantic.len(), "fusing candidates");
        fuse(&lexical, &semantic, limit, weights)
    }
}

/// Fuses two ranked lists into the top `limit` documents by weighted score.
/// Ties are broken by path so the order is total.
pub fn fuse(
    lexical: &[ScoredResult],
    semantic: &[ScoredResult],
    limit: usize,
    weights: FusionWeights,
) -> Result<Vec<ScoredResult>> {
    weights.validate()?;

    // path -> (title, lexical score, semantic score)
    let mut combined: HashMap<&str, (&str, f32, f32)> = HashMap::new();
    for hit in lexical {
        combined.entry(hit.path.as_str()).or_insert((hit.title.as_str(), 0.0, 0.0)).1 = hit.score;
    }
    for hit in semantic {
        combined.entry(hit.path.as_str()).or_insert((hit.title.as_str(), 0.0, 0.0)).2 = hit.score;
    }

    let mut fused: Vec<ScoredResult> = combined
        .into_iter()
        .map(|(path, (title, lex, sem))| ScoredResult {
            path: path.to_string(),
            title: title.to_string(),
            score: weights.lexical * lex + weights.semantic * sem,
        })
        .collect();
    fused.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
    fused.truncate(limit);
    Ok(fused)
}

/// Rescales scores into [0, 1] in place. When every score is equal, positive
/// scores become 1 and the rest 0.
pub fn min_max_normalize(hits: &mut [ScoredResult]) {
    let Some(first) = hits.first() else {
        return;
    };
    let (min, max) = hits.iter().fold((first.score, first.score), |(lo, hi), h| (lo.min(h.score), hi.max(h.score)));
    let range = max - min;
    for hit in hits.iter_mut() {
        hit.score = if range > 0.0 {
            (hit.score - min) / range
        } else if hit.score > 0.0 {
            1.0
        } else {
            0.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(path: &str, score: f32) -> ScoredResult {
        ScoredResult { path: path.to_string(), title: path.to_uppercase(), score }
    }

    #[test]
    fn union_with_missing_signal_as_zero() {
        let lexical = vec![hit("a", 2.0), hit("b", 1.0)];
        let semantic = vec![hit("c", 0.9), hit("a", 0.5)];
        let fused = fuse(&lexical, &semantic, 10, FusionWeights::default()).unwrap();
        assert_eq!(fused.len(), 3);
        assert_eq!(fused[0].path, "a");
        assert!((fused[0].score - 1.25).abs() < 1e-6);
        let c = fused.iter().find(|h| h.path == "c").unwrap();
        assert!((c.score - 0.45).abs() < 1e-6);
        assert_eq!(c.title, "C");
    }

    #[test]
    fn ties_break_by_path() {
        let lexical = vec![hit("zeta", 1.0)];
        let semantic = vec![hit("alpha", 1.0)];
        let fused = fuse(&lexical, &semantic, 10, FusionWeights::default()).unwrap();
        assert_eq!(fused[0].path, "alpha");
        assert_eq!(fused[1].path, "zeta");
    }

    #[test]
    fn truncates_to_limit() {
        let lexical = vec![hit("a", 3.0), hit("b", 2.0)];
        let semantic = vec![hit("c", 1.0)];
        let fused = fuse(&lexical, &semantic, 2, FusionWeights::default()).unwrap();
        assert_eq!(fused.iter().map(|h| h.path.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn rejects_negative_and_nan_weights() {
        assert!(matches!(
            FusionWeights::new(-0.1, 0.5),
            Err(IndexError::InvalidWeight { name: "lexical", .. })
        ));
        assert!(matches!(
            FusionWeights::new(0.5, f32::NAN),
            Err(IndexError::InvalidWeight { name: "semantic", .. })
        ));
        let bad = FusionWeights { lexical: 1.0, semantic: -2.0 };
        assert!(fuse(&[], &[], 5, bad).is_err());
    }

    #[test]
    fn weights_need_not_sum_to_one() {
        let w = FusionWeights::new(2.0, 3.0).unwrap();
        let fused = fuse(&[hit("a", 1.0)], &[hit("a", 1.0)], 1, w).unwrap();
        assert!((fused[0].score - 5.0).abs() < 1e-6);
    }

    #[test]
    fn raising_lexical_weight_favours_lexical_matches() {
        let lexical = vec![hit("x", 0.8)];
        let semantic = vec![hit("x", 0.4), hit("y", 0.4)];
        let mut last_gap = f32::NEG_INFINITY;
        for w in [0.0f32, 0.25, 0.5, 1.0, 4.0] {
            let fused = fuse(&lexical, &semantic, 10, FusionWeights::new(w, 0.5).unwrap()).unwrap();
            let x = fused.iter().find(|h| h.path == "x").unwrap().score;
            let y = fused.iter().find(|h| h.path == "y").unwrap().score;
            assert!(x - y >= last_gap);
            last_gap = x - y;
        }
    }

    #[test]
    fn ranker_queries_both_indexes() {
        let mut lexical = InvertedIndex::new();
        let mut vectors = VectorStore::new();
        lexical.add_document("a", "A", &["contract", "breach"]);
        vectors.add_document("a", "A", vec![1.0, 0.0]).unwrap();
        lexical.add_document("b", "B", &["tort", "liability"]);
        vectors.add_document("b", "B", vec![0.0, 1.0]).unwrap();

        let ranker = HybridRanker::new(&lexical, &vectors);
        let hits = ranker.search(&["contract"], &[1.0, 0.0], 2, FusionWeights::default()).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].path, "a");
        assert!(hits[0].score > hits[1].score);
        assert_eq!(hits[1].score, 0.0);
    }

    #[test]
    fn ranker_surfaces_dimension_errors() {
        let mut vectors = VectorStore::new();
        vectors.add_document("a", "A", vec![1.0, 0.0]).unwrap();
        let lexical = InvertedIndex::new();
        let ranker = HybridRanker::new(&lexical, &vectors);
        let err = ranker.search(&["x"], &[1.0], 2, FusionWeights::default()).unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { .. }));
    }

    #[test]
    fn min_max_rescales() {
        let mut hits = vec![hit("a", 10.0), hit("b", 5.0), hit("c", 0.0)];
        min_max_normalize(&mut hits);
        assert_eq!(hits.iter().map(|h| h.score).collect::<Vec<_>>(), vec![1.0, 0.5, 0.0]);

        let mut flat = vec![hit("a", 3.0), hit("b", 3.0)];
        min_max_normalize(&mut flat);
        assert!(flat.iter().all(|h| h.score == 1.0));

        let mut empty: Vec<ScoredResult> = Vec::new();
        min_max_normalize(&mut empty);
    }
}
