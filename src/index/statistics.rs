//! Corpus statistics: document count, lengths, and per-term document frequency

use std::collections::HashMap;

/// Distinct terms and token count remembered for one indexed document, so its
/// contributions can be subtracted on update or removal
#[derive(Debug, Clone)]
struct DocRecord {
    terms: Vec<(String, u32)>,
    length: usize,
}

/// Mutable corpus-level statistics backing BM25 scoring.
///
/// Document frequency is keyed by term string and counts every distinct term
/// of every document, independent of vocabulary capacity.
#[derive(Debug, Clone, Default)]
pub struct CorpusStatistics {
    doc_count: usize,
    total_tokens: usize,
    doc_frequency: HashMap<String, usize>,
    docs: HashMap<String, DocRecord>,
}

impl CorpusStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a document's term counts and length. Replaces any previous
    /// record for the same id without changing the document count.
    pub fn upsert(&mut self, doc_id: &str, terms: &[(String, u32)], length: usize) {
        if let Some(old) = self.docs.remove(doc_id) {
            self.retract(&old);
        } else {
            self.doc_count += 1;
        }

        for (term, _) in terms {
            *self.doc_frequency.entry(term.clone()).or_insert(0) += 1;
        }
        self.total_tokens += length;
        self.docs.insert(
            doc_id.to_string(),
            DocRecord {
                terms: terms.to_vec(),
                length,
            },
        );
    }

    /// Forget a document and subtract its contributions. Returns false if the
    /// id was never indexed.
    pub fn remove(&mut self, doc_id: &str) -> bool {
        match self.docs.remove(doc_id) {
            Some(old) => {
                self.retract(&old);
                self.doc_count = self.doc_count.saturating_sub(1);
                true
            }
            None => false,
        }
    }

    fn retract(&mut self, record: &DocRecord) {
        for (term, _) in &record.terms {
            if let Some(df) = self.doc_frequency.get_mut(term.as_str()) {
                *df -= 1;
                if *df == 0 {
                    self.doc_frequency.remove(term.as_str());
                }
            }
        }
        self.total_tokens -= record.length;
    }

    /// Average document length; defined as 1.0 for an empty corpus
    pub fn avgdl(&self) -> f64 {
        if self.doc_count > 0 {
            self.total_tokens as f64 / self.doc_count as f64
        } else {
            1.0
        }
    }

    pub fn doc_count(&self) -> usize {
        self.doc_count
    }

    /// Document frequency for a term; 0 for unknown terms
    pub fn doc_frequency(&self, term: &str) -> usize {
        self.doc_frequency.get(term).copied().unwrap_or(0)
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.docs.contains_key(doc_id)
    }

    /// Number of terms currently carrying a non-zero document frequency
    pub fn tracked_terms(&self) -> usize {
        self.doc_frequency.len()
    }
}
