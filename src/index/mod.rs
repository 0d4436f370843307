//! Local sparse indexing
//!
//! Computes sparse vectors (term ids plus BM25 weights) in memory, so points
//! carry keyword-relevance signals without a server-side sparse embedding
//! model. The index keeps corpus statistics incrementally: documents can be
//! added, re-indexed under the same id, and removed, and query vectors are
//! computed against the current statistics without mutating them.

mod bm25;
mod statistics;
mod vocabulary;

pub use bm25::Bm25Params;
pub use statistics::CorpusStatistics;
pub use vocabulary::{Vocabulary, DEFAULT_MAX_VOCAB};

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::SparseVector;

static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("valid regex"));

/// Lowercase a text and split it into word-character runs
fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    WORD_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Count term occurrences, keeping terms in first-occurrence order
fn count_terms(tokens: &[String]) -> Vec<(String, u32)> {
    let mut counts: Vec<(String, u32)> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for token in tokens {
        if let Some(&at) = positions.get(token.as_str()) {
            counts[at].1 += 1;
        } else {
            positions.insert(token.as_str(), counts.len());
            counts.push((token.clone(), 1));
        }
    }
    counts
}

/// In-memory BM25 index producing sparse vectors.
///
/// Term ids come from a capped first-seen vocabulary; document frequency and
/// length statistics are tracked for every term regardless of the cap. A
/// document's own vector reflects statistics that already include it.
#[derive(Debug, Clone)]
pub struct SparseIndex {
    vocabulary: Vocabulary,
    statistics: CorpusStatistics,
    params: Bm25Params,
}

impl Default for SparseIndex {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_VOCAB, Bm25Params::default())
    }
}

impl SparseIndex {
    pub fn new(max_vocab: usize, params: Bm25Params) -> Self {
        Self {
            vocabulary: Vocabulary::new(max_vocab),
            statistics: CorpusStatistics::new(),
            params,
        }
    }

    /// Index a document, replacing any previous content under the same id,
    /// and return its sparse vector.
    ///
    /// Re-indexing subtracts the old content's statistics first; the document
    /// count only grows for ids never seen before.
    pub fn index_document(&mut self, doc_id: &str, text: &str) -> SparseVector {
        let tokens = tokenize(text);
        let counts = count_terms(&tokens);

        for (term, _) in &counts {
            self.vocabulary.ensure(term);
        }
        self.statistics.upsert(doc_id, &counts, tokens.len());

        self.score_terms(&counts, tokens.len())
    }

    /// Compute a query's sparse vector against the current statistics.
    ///
    /// Read-only: no ids are assigned and no statistics change. The query's
    /// own token count plays the document-length role. An empty index yields
    /// an empty vector.
    pub fn transform_query(&self, text: &str) -> SparseVector {
        if self.statistics.doc_count() == 0 {
            return SparseVector::default();
        }
        let tokens = tokenize(text);
        let counts = count_terms(&tokens);
        self.score_terms(&counts, tokens.len())
    }

    /// Remove a document and subtract its statistics. Unknown ids are a
    /// no-op; vocabulary ids are kept either way.
    pub fn remove_document(&mut self, doc_id: &str) -> bool {
        self.statistics.remove(doc_id)
    }

    pub fn doc_count(&self) -> usize {
        self.statistics.doc_count()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Score counted terms against the current statistics. Terms without a
    /// vocabulary id are skipped.
    fn score_terms(&self, counts: &[(String, u32)], doc_len: usize) -> SparseVector {
        let doc_count = self.statistics.doc_count();
        let avgdl = self.statistics.avgdl();

        let mut ids = Vec::with_capacity(counts.len());
        let mut values = Vec::with_capacity(counts.len());
        for (term, freq) in counts {
            let Some(id) = self.vocabulary.get(term) else {
                continue;
            };
            let df = self.statistics.doc_frequency(term);
            let score = self.params.score(*freq, df, doc_count, doc_len, avgdl);
            ids.push(id);
            values.push(score as f32);
        }
        SparseVector { ids, values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_splits_on_non_word() {
        assert_eq!(tokenize("Hello, World!"), vec!["hello", "world"]);
        assert_eq!(tokenize("don't"), vec!["don", "t"]);
        assert_eq!(tokenize("foo_bar123 baz"), vec!["foo_bar123", "baz"]);
        assert!(tokenize("!!! ...").is_empty());
    }

    #[test]
    fn test_tokenize_keeps_unicode_words() {
        assert_eq!(tokenize("Café au lait"), vec!["café", "au", "lait"]);
    }

    #[test]
    fn test_count_terms_first_occurrence_order() {
        let tokens = tokenize("beta alpha beta");
        let counts = count_terms(&tokens);
        assert_eq!(
            counts,
            vec![("beta".to_string(), 2), ("alpha".to_string(), 1)]
        );
    }

    #[test]
    fn test_index_single_document_weights() {
        let mut index = SparseIndex::default();
        let vector = index.index_document("d1", "hello world");

        // both terms: freq 1, df 1, doc count 1, doc_len == avgdl == 2
        assert_eq!(vector.ids, vec![0, 1]);
        let expected = (1.0_f64 + 0.5 / 1.5).ln() as f32;
        for value in &vector.values {
            assert!((value - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_repeated_term_outweighs_single_occurrence() {
        let mut index = SparseIndex::default();
        let vector = index.index_document("d1", "alpha beta beta");

        assert_eq!(vector.ids, vec![0, 1]);
        let alpha = vector.values[0];
        let beta = vector.values[1];
        assert!(beta > alpha, "beta {} should outweigh alpha {}", beta, alpha);
    }

    #[test]
    fn test_reindexing_same_content_is_idempotent() {
        let mut index = SparseIndex::default();
        let first = index.index_document("d1", "alpha beta gamma");
        let second = index.index_document("d1", "alpha beta gamma");

        assert_eq!(first, second);
        assert_eq!(index.doc_count(), 1);
        assert_eq!(index.vocabulary_size(), 3);
    }

    #[test]
    fn test_update_replaces_old_term_contributions() {
        let mut index = SparseIndex::default();
        index.index_document("d1", "alpha");
        index.index_document("d2", "alpha beta");

        index.index_document("d1", "gamma");

        assert_eq!(index.doc_count(), 2);
        assert_eq!(index.statistics.doc_frequency("alpha"), 1);
        assert_eq!(index.statistics.doc_frequency("gamma"), 1);
        // the replaced term keeps its vocabulary id
        assert_eq!(index.vocabulary.get("alpha"), Some(0));
    }

    #[test]
    fn test_remove_then_readd_leaves_no_residue() {
        let mut index = SparseIndex::default();
        index.index_document("d1", "alpha beta");
        index.index_document("d2", "alpha");
        let before = index.transform_query("alpha beta");

        index.remove_document("d2");
        assert_eq!(index.doc_count(), 1);
        assert_eq!(index.statistics.doc_frequency("alpha"), 1);

        index.index_document("d2", "alpha");
        let after = index.transform_query("alpha beta");
        assert_eq!(before, after);
    }

    #[test]
    fn test_remove_unknown_id_is_a_noop() {
        let mut index = SparseIndex::default();
        index.index_document("d1", "alpha");
        assert!(!index.remove_document("missing"));
        assert_eq!(index.doc_count(), 1);
    }

    #[test]
    fn test_remove_ids_one_and_two() {
        let mut index = SparseIndex::default();
        index.index_document("1", "alpha");
        index.index_document("2", "beta");
        assert!(index.remove_document("1"));
        assert_eq!(index.doc_count(), 1);
        assert_eq!(index.statistics.doc_frequency("alpha"), 0);
        assert_eq!(index.statistics.doc_frequency("beta"), 1);
    }

    #[test]
    fn test_transform_on_empty_index_is_empty() {
        let index = SparseIndex::default();
        assert!(index.transform_query("anything at all").is_empty());
    }

    #[test]
    fn test_transform_is_read_only_and_deterministic() {
        let mut index = SparseIndex::default();
        index.index_document("d1", "alpha beta gamma");

        let first = index.transform_query("beta delta");
        let second = index.transform_query("beta delta");

        assert_eq!(first, second);
        assert_eq!(index.doc_count(), 1);
        // unknown query terms get no id assigned
        assert_eq!(index.vocabulary.get("delta"), None);
        assert_eq!(index.vocabulary_size(), 3);
    }

    #[test]
    fn test_transform_skips_unknown_terms() {
        let mut index = SparseIndex::default();
        index.index_document("d1", "alpha");
        let vector = index.transform_query("alpha unknown");
        assert_eq!(vector.ids, vec![0]);
        assert_eq!(vector.len(), 1);
    }

    #[test]
    fn test_fresh_document_vector_matches_transform() {
        let mut index = SparseIndex::default();
        index.index_document("d1", "alpha beta");
        let indexed = index.index_document("d2", "alpha gamma");
        // same statistics, same token count, so the snapshots agree
        assert_eq!(indexed, index.transform_query("alpha gamma"));
    }

    #[test]
    fn test_vocabulary_capacity_silently_drops_new_terms() {
        let mut index = SparseIndex::new(1, Bm25Params::default());
        let vector = index.index_document("d1", "alpha beta");

        assert_eq!(vector.ids, vec![0]);
        assert_eq!(index.vocabulary_size(), 1);
        // statistics still count the dropped term
        assert_eq!(index.statistics.doc_frequency("beta"), 1);

        let query = index.transform_query("beta");
        assert!(query.is_empty());
    }

    #[test]
    fn test_tokenless_document_still_counts() {
        let mut index = SparseIndex::default();
        let vector = index.index_document("d1", "!!!");
        assert!(vector.is_empty());
        assert_eq!(index.doc_count(), 1);
        assert!(index.transform_query("alpha").is_empty());
    }

    #[test]
    fn test_rare_term_scores_above_common_term() {
        let mut index = SparseIndex::default();
        index.index_document("d1", "rare common");
        index.index_document("d2", "common");
        index.index_document("d3", "common");
        index.index_document("d4", "common");

        let vector = index.transform_query("rare common");
        assert_eq!(vector.ids.len(), 2);
        let rare = vector.values[0];
        let common = vector.values[1];
        assert!(rare > common, "rare {} should beat common {}", rare, common);
    }
}
