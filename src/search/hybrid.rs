//! Hybrid search with server-side fusion

use tracing::{error, info};

use crate::error::Result;
use crate::search::HybridRequest;
use crate::storage::{
    entry_from_parts, Prefetch, QdrantStore, QueryRequest, QueryVector, SPARSE_VECTOR_NAME,
};
use crate::types::Entry;

/// Outcome of a hybrid search: fused results, or the dense-only results the
/// fallback produced after the fused query failed
#[derive(Debug, Clone, PartialEq)]
pub enum HybridOutcome {
    /// Prefetch branches fused server-side
    Fused(Vec<Entry>),
    /// Dense-only fallback results
    DenseFallback(Vec<Entry>),
}

impl HybridOutcome {
    pub fn entries(&self) -> &[Entry] {
        match self {
            HybridOutcome::Fused(entries) | HybridOutcome::DenseFallback(entries) => entries,
        }
    }

    pub fn into_entries(self) -> Vec<Entry> {
        match self {
            HybridOutcome::Fused(entries) | HybridOutcome::DenseFallback(entries) => entries,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, HybridOutcome::DenseFallback(_))
    }
}

/// Run a hybrid search against the store's collection.
///
/// A dense prefetch always runs; a sparse prefetch joins it when the local
/// index produces a non-empty query vector, and the branches are fused
/// server-side. A missing collection yields empty results. When the fused
/// stage fails anywhere, the error is logged and a plain dense search at the
/// final limit answers instead, its own result passed through as the
/// fallback outcome.
pub async fn hybrid_search(store: &QdrantStore, request: HybridRequest) -> Result<HybridOutcome> {
    if !store.collection_exists().await? {
        return Ok(HybridOutcome::Fused(Vec::new()));
    }

    match fused_query(store, &request).await {
        Ok(entries) => Ok(HybridOutcome::Fused(entries)),
        Err(e) => {
            error!("Hybrid search failed: {}", e);
            info!(
                "Falling back to dense vector search for query: {}",
                request.query
            );
            let entries = store
                .search(&request.query, request.final_limit, request.filter)
                .await?;
            Ok(HybridOutcome::DenseFallback(entries))
        }
    }
}

async fn fused_query(store: &QdrantStore, request: &HybridRequest) -> Result<Vec<Entry>> {
    let query_vector = store.embedder().embed_query(&request.query).await?;
    let mut prefetch = vec![Prefetch {
        query: QueryVector::Dense {
            name: store.embedder().vector_name(),
            vector: query_vector,
        },
        limit: request.dense_limit,
    }];

    let sparse = store.transform_query(&request.query);
    if !sparse.is_empty() {
        prefetch.push(Prefetch {
            query: QueryVector::Sparse {
                name: SPARSE_VECTOR_NAME.to_string(),
                vector: sparse,
            },
            limit: request.sparse_limit,
        });
    }

    let fused = QueryRequest {
        prefetch,
        query: QueryVector::Fusion(request.fusion),
        filter: request.filter.clone(),
        limit: request.final_limit,
    };
    let points = store
        .backend()
        .query_points(store.collection_name(), &fused)
        .await?;
    Ok(points
        .into_iter()
        .map(|p| entry_from_parts(p.id, p.payload))
        .collect())
}
