//! Term-based inverted index with TF-IDF scoring.
//!
//! Each term maps to a posting list of `(doc_id, tf)` pairs sorted by `doc_id`.
//! Scores follow `score(d) = Σ tf(t, d) * ln(1 + N / df(t))` over the distinct
//! query terms, where `N` is the number of indexed documents.

use crate::error::{IndexError, Result};
use crate::types::{DocId, ScoredResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocMeta {
    pub path: String,
    pub title: String,
    /// Distinct terms of the document, sorted. Used to locate its postings on removal.
    pub terms: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermEntry {
    pub df: u32,
    pub postings: Vec<Posting>, // sorted by doc_id
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvertedIndex {
    terms: HashMap<String, TermEntry>,
    docs: HashMap<DocId, DocMeta>,
    doc_ids: HashMap<String, DocId>,
    next_doc_id: DocId,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Indexes `tokens` under `path`, replacing any previous version of the document.
    ///
    /// A replaced document keeps its original [`DocId`] and therefore its
    /// position in insertion-order tie breaking. An empty token list still
    /// registers the document and counts towards `N`.
    pub fn add_document<S: AsRef<str>>(&mut self, path: &str, title: &str, tokens: &[S]) -> DocId {
        let existing = self.doc_ids.get(path).copied();
        let doc_id = match existing {
            Some(existing) => {
                self.unlink_postings(existing);
                existing
            }
            None => {
                let id = self.next_doc_id;
                self.next_doc_id += 1;
                self.doc_ids.insert(path.to_string(), id);
                id
            }
        };

        let mut tf_counts: HashMap<&str, u32> = HashMap::new();
        for token in tokens {
            let term: &str = token.as_ref();
            *tf_counts.entry(term).or_insert(0) += 1;
        }

        let mut terms = Vec::with_capacity(tf_counts.len());
        for (term, tf) in tf_counts {
            let entry = self.terms.entry(term.to_string()).or_default();
            let pos = entry.postings.partition_point(|p| p.doc_id < doc_id);
            entry.postings.insert(pos, Posting { doc_id, tf });
            entry.df += 1;
            terms.push(term.to_string());
        }
        terms.sort_unstable();

        self.docs.insert(doc_id, DocMeta { path: path.to_string(), title: title.to_string(), terms });
        doc_id
    }

    /// Removes every posting of `path`. Returns `false` (and does nothing) if it was never indexed.
    pub fn remove_document(&mut self, path: &str) -> bool {
        let Some(doc_id) = self.doc_ids.remove(path) else {
            return false;
        };
        self.unlink_postings(doc_id);
        self.docs.remove(&doc_id);
        true
    }

    fn unlink_postings(&mut self, doc_id: DocId) {
        let Some(meta) = self.docs.get(&doc_id) else {
            return;
        };
        for term in &meta.terms {
            let Some(entry) = self.terms.get_mut(term) else {
                continue;
            };
            if let Ok(pos) = entry.postings.binary_search_by_key(&doc_id, |p| p.doc_id) {
                entry.postings.remove(pos);
                entry.df -= 1;
            }
            if entry.postings.is_empty() {
                self.terms.remove(term);
            }
        }
    }

    /// Top `limit` documents by TF-IDF score, descending; ties by insertion order.
    #[instrument(skip_all, fields(terms = query_tokens.len(), limit = limit))]
    pub fn search<S: AsRef<str>>(&self, query_tokens: &[S], limit: usize) -> Vec<ScoredResult> {
        if limit == 0 || self.docs.is_empty() {
            return Vec::new();
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let mut scores: HashMap<DocId, f32> = HashMap::new();
        for token in query_tokens {
            let term: &str = token.as_ref();
            if !seen.insert(term) {
                continue;
            }
            let Some(entry) = self.terms.get(term) else {
                continue;
            };
            let idf = self.idf_for_df(entry.df);
            for p in &entry.postings {
                *scores.entry(p.doc_id).or_insert(0.0) += p.tf as f32 * idf;
            }
        }

        let mut scored: Vec<(DocId, f32)> = scores.into_iter().collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(limit);

        scored
            .into_iter()
            .filter_map(|(doc_id, score)| {
                self.docs.get(&doc_id).map(|meta| ScoredResult { path: meta.path.clone(), title: meta.title.clone(), score })
            })
            .collect()
    }

    fn idf_for_df(&self, df: u32) -> f32 {
        let n = self.docs.len() as f32;
        (1.0 + n / df.max(1) as f32).ln()
    }

    /// Smoothed inverse document frequency of `term`, `None` if the term is unknown.
    pub fn idf(&self, term: &str) -> Option<f32> {
        self.terms.get(term).map(|e| self.idf_for_df(e.df))
    }

    pub fn document_frequency(&self, term: &str) -> u32 {
        self.terms.get(term).map(|e| e.df).unwrap_or(0)
    }

    /// Posting list of `term` resolved to `(path, tf)`, in insertion order.
    pub fn postings(&self, term: &str) -> Vec<(String, u32)> {
        self.terms
            .get(term)
            .map(|e| {
                e.postings
                    .iter()
                    .filter_map(|p| self.docs.get(&p.doc_id).map(|m| (m.path.clone(), p.tf)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize { self.docs.len() }
    pub fn is_empty(&self) -> bool { self.docs.is_empty() }
    pub fn term_count(&self) -> usize { self.terms.len() }
    pub fn contains(&self, path: &str) -> bool { self.doc_ids.contains_key(path) }

    pub fn title(&self, path: &str) -> Option<&str> {
        let doc_id = self.doc_ids.get(path)?;
        self.docs.get(doc_id).map(|m| m.title.as_str())
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.doc_ids.keys().map(String::as_str)
    }

    /// Checks every structural invariant. Used when loading a snapshot.
    pub fn validate(&self) -> Result<()> {
        if self.doc_ids.len() != self.docs.len() {
            return Err(corrupt(format!(
                "{} path mappings for {} documents",
                self.doc_ids.len(),
                self.docs.len()
            )));
        }
        for (path, doc_id) in &self.doc_ids {
            match self.docs.get(doc_id) {
                Some(meta) if &meta.path == path => {}
                Some(meta) => return Err(corrupt(format!("doc {doc_id} maps to {path} but stores {}", meta.path))),
                None => return Err(corrupt(format!("path {path} points at missing doc {doc_id}"))),
            }
            if *doc_id >= self.next_doc_id {
                return Err(corrupt(format!("doc id {doc_id} not below next id {}", self.next_doc_id)));
            }
        }

        let mut total_postings = 0usize;
        for (term, entry) in &self.terms {
            if entry.postings.is_empty() {
                return Err(corrupt(format!("term {term:?} has no postings")));
            }
            if entry.df as usize != entry.postings.len() {
                return Err(corrupt(format!(
                    "term {term:?} has df {} but {} postings",
                    entry.df,
                    entry.postings.len()
                )));
            }
            if entry.postings.windows(2).any(|w| w[0].doc_id >= w[1].doc_id) {
                return Err(corrupt(format!("postings of {term:?} are not strictly ordered")));
            }
            for p in &entry.postings {
                if p.tf == 0 {
                    return Err(corrupt(format!("zero term frequency for {term:?} in doc {}", p.doc_id)));
                }
                let meta = self
                    .docs
                    .get(&p.doc_id)
                    .ok_or_else(|| corrupt(format!("posting for {term:?} references missing doc {}", p.doc_id)))?;
                if meta.terms.binary_search(term).is_err() {
                    return Err(corrupt(format!("doc {} does not list term {term:?}", meta.path)));
                }
            }
            total_postings += entry.postings.len();
        }

        let listed: usize = self.docs.values().map(|m| m.terms.len()).sum();
        if listed != total_postings {
            return Err(corrupt(format!("documents list {listed} terms but index holds {total_postings} postings")));
        }
        Ok(())
    }
}

fn corrupt(msg: String) -> IndexError {
    IndexError::IndexCorruption(format!("inverted index: {msg}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InvertedIndex {
        let mut idx = InvertedIndex::new();
        idx.add_document("a.pdf", "A", &["contract", "breach", "contract"]);
        idx.add_document("b.pdf", "B", &["tort", "liability"]);
        idx.add_document("c.pdf", "C", &["contract", "tort"]);
        idx
    }

    #[test]
    fn counts_tf_and_df() {
        let idx = sample();
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.document_frequency("contract"), 2);
        assert_eq!(idx.document_frequency("breach"), 1);
        assert_eq!(idx.document_frequency("missing"), 0);
        assert_eq!(idx.postings("contract"), vec![("a.pdf".to_string(), 2), ("c.pdf".to_string(), 1)]);
        idx.validate().unwrap();
    }

    #[test]
    fn scores_follow_smoothed_tfidf() {
        let idx = sample();
        let hits = idx.search(&["contract"], 10);
        assert_eq!(hits.len(), 2);
        let idf = (1.0f32 + 3.0 / 2.0).ln();
        assert_eq!(hits[0].path, "a.pdf");
        assert!((hits[0].score - 2.0 * idf).abs() < 1e-6);
        assert!((hits[1].score - idf).abs() < 1e-6);
    }

    #[test]
    fn duplicate_query_terms_count_once() {
        let idx = sample();
        let once = idx.search(&["breach"], 10);
        let twice = idx.search(&["breach", "breach"], 10);
        assert_eq!(once, twice);
    }

    #[test]
    fn excludes_non_matching_documents() {
        let idx = sample();
        let hits = idx.search(&["liability"], 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "b.pdf");
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let mut idx = InvertedIndex::new();
        idx.add_document("z", "Z", &["law"]);
        idx.add_document("a", "A", &["law"]);
        idx.add_document("m", "M", &["law"]);
        let paths: Vec<_> = idx.search(&["law"], 10).into_iter().map(|h| h.path).collect();
        assert_eq!(paths, vec!["z", "a", "m"]);
    }

    #[test]
    fn limit_truncates() {
        let idx = sample();
        assert_eq!(idx.search(&["contract", "tort"], 1).len(), 1);
        assert!(idx.search(&["contract"], 0).is_empty());
    }

    #[test]
    fn empty_query_or_index_is_empty() {
        let idx = sample();
        let empty: [&str; 0] = [];
        assert!(idx.search(&empty, 10).is_empty());
        assert!(InvertedIndex::new().search(&["contract"], 10).is_empty());
    }

    #[test]
    fn empty_token_list_registers_document() {
        let mut idx = InvertedIndex::new();
        let empty: [&str; 0] = [];
        idx.add_document("blank", "Blank", &empty);
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.term_count(), 0);
        assert!(idx.contains("blank"));
        idx.validate().unwrap();
    }

    #[test]
    fn remove_drops_postings_and_decrements_df() {
        let mut idx = sample();
        let before_contract = idx.document_frequency("contract");
        assert!(idx.remove_document("a.pdf"));
        assert_eq!(idx.document_frequency("contract"), before_contract - 1);
        assert_eq!(idx.document_frequency("breach"), 0);
        assert!(idx.search(&["breach"], 10).is_empty());
        assert!(idx.search(&["contract"], 10).iter().all(|h| h.path != "a.pdf"));
        idx.validate().unwrap();
    }

    #[test]
    fn remove_is_idempotent() {
        let mut idx = sample();
        assert!(idx.remove_document("b.pdf"));
        let after_first = idx.clone();
        assert!(!idx.remove_document("b.pdf"));
        assert!(!idx.remove_document("never.pdf"));
        assert_eq!(idx, after_first);
    }

    #[test]
    fn re_adding_replaces_and_keeps_position() {
        let mut idx = sample();
        idx.add_document("a.pdf", "A v2", &["tort"]);
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.document_frequency("contract"), 1);
        assert_eq!(idx.document_frequency("breach"), 0);
        assert_eq!(idx.title("a.pdf"), Some("A v2"));
        let paths: Vec<_> = idx.search(&["tort"], 10).into_iter().map(|h| h.path).collect();
        assert_eq!(paths, vec!["a.pdf", "b.pdf", "c.pdf"]);
        idx.validate().unwrap();
    }

    #[test]
    fn re_adding_identical_document_is_a_fixed_point() {
        let mut idx = sample();
        let once = idx.clone();
        idx.add_document("a.pdf", "A", &["contract", "breach", "contract"]);
        assert_eq!(idx, once);
    }

    #[test]
    fn validate_detects_df_drift() {
        let mut idx = sample();
        idx.terms.get_mut("contract").unwrap().df = 7;
        assert!(matches!(idx.validate(), Err(IndexError::IndexCorruption(_))));
    }

    #[test]
    fn validate_detects_dangling_posting() {
        let mut idx = sample();
        idx.terms.get_mut("tort").unwrap().postings.push(Posting { doc_id: 99, tf: 1 });
        idx.terms.get_mut("tort").unwrap().df += 1;
        assert!(matches!(idx.validate(), Err(IndexError::IndexCorruption(_))));
    }
}
