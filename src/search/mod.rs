//! Search orchestration
//!
//! Hybrid retrieval over the entry store: a dense prefetch and a sparse BM25
//! prefetch fused server-side, with a dense-only fallback when the fused
//! query cannot run.

mod hybrid;

pub use hybrid::{hybrid_search, HybridOutcome};

use serde_json::Value;

use crate::types::FusionMethod;

/// Parameters for a hybrid search
#[derive(Debug, Clone)]
pub struct HybridRequest {
    /// Query text
    pub query: String,
    /// Server-side fusion method
    pub fusion: FusionMethod,
    /// Result limit for the dense prefetch branch
    pub dense_limit: usize,
    /// Result limit for the sparse prefetch branch
    pub sparse_limit: usize,
    /// Final result limit after fusion
    pub final_limit: usize,
    /// Optional payload filter applied to every branch
    pub filter: Option<Value>,
}

impl HybridRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            fusion: FusionMethod::Rrf,
            dense_limit: 20,
            sparse_limit: 20,
            final_limit: 10,
            filter: None,
        }
    }
}
