//! BM25 term weighting

/// BM25 tuning parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term-frequency saturation
    pub k1: f64,
    /// Length normalization strength
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

impl Bm25Params {
    /// BM25 weight of one term occurrence count within a document.
    ///
    /// The idf uses add-one smoothing, so it stays positive even when a term
    /// occurs in every document. The average document length is clamped to a
    /// minimum of 1.0 in the denominator.
    pub fn score(&self, freq: u32, df: usize, doc_count: usize, doc_len: usize, avgdl: f64) -> f64 {
        let freq = freq as f64;
        let df = df as f64;
        let n = doc_count as f64;

        let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
        let denom = freq + self.k1 * (1.0 - self.b + self.b * (doc_len as f64 / avgdl.max(1.0)));
        idf * (freq * (self.k1 + 1.0) / denom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_doc_single_term_weight() {
        let params = Bm25Params::default();
        // idf = ln(1 + 0.5/1.5), denom = 1 + k1, tf part cancels
        let score = params.score(1, 1, 1, 1, 1.0);
        let expected = (1.0_f64 + 0.5 / 1.5).ln();
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_known_weight() {
        let params = Bm25Params::default();
        // idf = ln(2), tf part = 5 / 4.625
        let score = params.score(2, 1, 2, 4, 2.0);
        assert!((score - 0.7493483033080490).abs() < 1e-9);
    }

    #[test]
    fn test_idf_stays_positive_for_ubiquitous_terms() {
        let params = Bm25Params::default();
        let score = params.score(1, 10, 10, 5, 5.0);
        assert!(score > 0.0);
    }

    #[test]
    fn test_rarer_terms_weigh_more() {
        let params = Bm25Params::default();
        let rare = params.score(1, 1, 10, 5, 5.0);
        let common = params.score(1, 5, 10, 5, 5.0);
        assert!(rare > common);
    }

    #[test]
    fn test_avgdl_below_one_is_clamped() {
        let params = Bm25Params::default();
        let clamped = params.score(1, 1, 1, 1, 0.5);
        let unit = params.score(1, 1, 1, 1, 1.0);
        assert_eq!(clamped, unit);
    }

    #[test]
    fn test_repeated_term_saturates() {
        let params = Bm25Params::default();
        let once = params.score(1, 1, 2, 10, 10.0);
        let five = params.score(5, 1, 2, 10, 10.0);
        let fifty = params.score(50, 1, 2, 10, 10.0);
        assert!(five > once);
        // growth flattens out as frequency climbs
        assert!(fifty - five < five - once);
    }
}
