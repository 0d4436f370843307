//! Integration tests for the entry store and hybrid search
//!
//! These run against an in-memory backend double that records every request,
//! so collection bootstrap, payload mapping, sparse index upkeep, fused
//! queries, and the dense fallback are all observable without a running
//! Qdrant.
//!
//! Run with: cargo test --test store_tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;

use recall::embedding::Embedder;
use recall::error::{RecallError, Result};
use recall::search::{HybridOutcome, HybridRequest};
use recall::storage::{
    CollectionSchema, PointRecord, QdrantStore, QueryRequest, QueryVector, RetrievedPoint,
    ScoredPoint, VectorBackend,
};
use recall::types::{Entry, FusionMethod};

// ============================================================================
// TEST DOUBLES
// ============================================================================

/// In-memory vector backend that records every call it receives
#[derive(Default)]
struct MockBackend {
    created: AtomicBool,
    fail_fused: AtomicBool,
    schemas: Mutex<Vec<CollectionSchema>>,
    payload_indexes: Mutex<Vec<(String, String)>>,
    points: Mutex<Vec<PointRecord>>,
    queries: Mutex<Vec<QueryRequest>>,
}

impl MockBackend {
    fn fail_fused_queries(&self) {
        self.fail_fused.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl VectorBackend for MockBackend {
    async fn collection_exists(&self, _collection: &str) -> Result<bool> {
        Ok(self.created.load(Ordering::SeqCst))
    }

    async fn create_collection(&self, _collection: &str, schema: &CollectionSchema) -> Result<()> {
        self.created.store(true, Ordering::SeqCst);
        self.schemas.lock().push(schema.clone());
        Ok(())
    }

    async fn create_payload_index(
        &self,
        _collection: &str,
        field_name: &str,
        field_schema: &str,
    ) -> Result<()> {
        self.payload_indexes
            .lock()
            .push((field_name.to_string(), field_schema.to_string()));
        Ok(())
    }

    async fn upsert_points(&self, _collection: &str, points: Vec<PointRecord>) -> Result<()> {
        let mut stored = self.points.lock();
        for point in points {
            stored.retain(|p| p.id != point.id);
            stored.push(point);
        }
        Ok(())
    }

    async fn retrieve_points(
        &self,
        _collection: &str,
        ids: &[String],
    ) -> Result<Vec<RetrievedPoint>> {
        Ok(self
            .points
            .lock()
            .iter()
            .filter(|p| ids.contains(&p.id))
            .map(|p| RetrievedPoint {
                id: p.id.clone(),
                payload: Some(p.payload.clone()),
            })
            .collect())
    }

    async fn delete_points(&self, _collection: &str, ids: &[String]) -> Result<()> {
        self.points.lock().retain(|p| !ids.contains(&p.id));
        Ok(())
    }

    async fn query_points(
        &self,
        _collection: &str,
        request: &QueryRequest,
    ) -> Result<Vec<ScoredPoint>> {
        self.queries.lock().push(request.clone());
        if self.fail_fused.load(Ordering::SeqCst)
            && matches!(request.query, QueryVector::Fusion(_))
        {
            return Err(RecallError::Backend("fusion stage unavailable".to_string()));
        }
        Ok(self
            .points
            .lock()
            .iter()
            .take(request.limit)
            .map(|p| ScoredPoint {
                id: p.id.clone(),
                score: 1.0,
                payload: Some(p.payload.clone()),
            })
            .collect())
    }
}

/// Deterministic embedder: the vector depends only on the text length
struct DummyEmbedder;

fn vectorize(text: &str) -> Vec<f32> {
    vec![text.len() as f32, 1.0, 0.0, 0.0]
}

#[async_trait]
impl Embedder for DummyEmbedder {
    async fn embed_documents(&self, documents: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(documents.iter().map(|d| vectorize(d)).collect())
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        Ok(vectorize(query))
    }

    fn vector_name(&self) -> String {
        "test-vector".to_string()
    }

    fn vector_size(&self) -> usize {
        4
    }
}

fn test_store(backend: Arc<MockBackend>) -> QdrantStore {
    QdrantStore::new(
        backend,
        Arc::new(DummyEmbedder),
        "test-entries",
        vec![("metadata.type".to_string(), "keyword".to_string())],
    )
}

// ============================================================================
// COLLECTION BOOTSTRAP TESTS
// ============================================================================

#[tokio::test]
async fn test_first_store_creates_collection_with_field_indexes() {
    let backend = Arc::new(MockBackend::default());
    let store = test_store(backend.clone());

    store.store(Entry::new("alpha", None)).await.unwrap();
    store.store(Entry::new("beta", None)).await.unwrap();

    let schemas = backend.schemas.lock();
    assert_eq!(schemas.len(), 1, "collection should be created exactly once");
    assert_eq!(schemas[0].dense_name, "test-vector");
    assert_eq!(schemas[0].dense_size, 4);
    assert_eq!(schemas[0].sparse_name, "sparse");

    let indexes = backend.payload_indexes.lock();
    assert_eq!(
        *indexes,
        vec![("metadata.type".to_string(), "keyword".to_string())]
    );
}

#[tokio::test]
async fn test_search_on_missing_collection_returns_empty() {
    let backend = Arc::new(MockBackend::default());
    let store = test_store(backend.clone());

    let results = store.search("anything", 10, None).await.unwrap();

    assert!(results.is_empty());
    assert!(backend.queries.lock().is_empty(), "no query should be sent");
}

// ============================================================================
// STORE / UPDATE / DELETE TESTS
// ============================================================================

#[tokio::test]
async fn test_store_and_search_round_trip() {
    let backend = Arc::new(MockBackend::default());
    let store = test_store(backend);

    let created_at = Utc::now().to_rfc3339();
    let id = store
        .store(Entry::new(
            "cargo tree shows duplicate dependencies",
            Some(json!({ "type": "learning", "created_at": created_at })),
        ))
        .await
        .unwrap();
    assert_eq!(id.len(), 32, "point ids are simple-format uuids");

    let results = store.search("cargo tree", 10, None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content, "cargo tree shows duplicate dependencies");
    assert_eq!(
        results[0].metadata,
        Some(json!({ "type": "learning", "created_at": created_at }))
    );
    assert_eq!(results[0].id.as_deref(), Some(id.as_str()));
}

#[tokio::test]
async fn test_stored_point_carries_both_vector_kinds() {
    let backend = Arc::new(MockBackend::default());
    let store = test_store(backend.clone());

    store.store(Entry::new("alpha beta", None)).await.unwrap();

    let points = backend.points.lock();
    assert_eq!(points.len(), 1);
    let point = &points[0];
    assert_eq!(point.vectors.dense_name, "test-vector");
    assert_eq!(point.vectors.dense, vectorize("alpha beta"));

    let sparse = point.vectors.sparse.as_ref().unwrap();
    assert_eq!(sparse.len(), 2);

    assert_eq!(point.payload["document"], json!("alpha beta"));
    assert!(point.payload["metadata"].is_null());
}

#[tokio::test]
async fn test_symbol_only_content_omits_sparse_vector() {
    let backend = Arc::new(MockBackend::default());
    let store = test_store(backend.clone());

    store.store(Entry::new("!!! ...", None)).await.unwrap();

    let points = backend.points.lock();
    assert!(points[0].vectors.sparse.is_none());
}

#[tokio::test]
async fn test_update_rewrites_point_under_same_id() {
    let backend = Arc::new(MockBackend::default());
    let store = test_store(backend.clone());

    let id = store.store(Entry::new("alpha", None)).await.unwrap();
    store
        .update(&id, Entry::new("gamma", Some(json!({ "type": "note" }))))
        .await
        .unwrap();

    let points = backend.points.lock();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].id, id);
    assert_eq!(points[0].payload["document"], json!("gamma"));
    drop(points);

    // the replacement content is searchable through the sparse index
    assert!(!store.transform_query("gamma").is_empty());
}

#[tokio::test]
async fn test_update_missing_id_fails_with_not_found() {
    let backend = Arc::new(MockBackend::default());
    let store = test_store(backend);

    store.store(Entry::new("alpha", None)).await.unwrap();
    let err = store
        .update("missing-id", Entry::new("beta", None))
        .await
        .unwrap_err();

    assert!(matches!(err, RecallError::NotFound(_)));
    assert_eq!(err.to_string(), "Point with ID missing-id not found");
}

#[tokio::test]
async fn test_delete_removes_point_and_sparse_contribution() {
    let backend = Arc::new(MockBackend::default());
    let store = test_store(backend.clone());

    let id = store.store(Entry::new("alpha beta", None)).await.unwrap();
    assert!(!store.transform_query("alpha").is_empty());

    store.delete(&id).await.unwrap();

    assert!(backend.points.lock().is_empty());
    assert!(store.transform_query("alpha").is_empty());

    let err = store.delete(&id).await.unwrap_err();
    assert!(matches!(err, RecallError::NotFound(_)));
}

// ============================================================================
// HYBRID SEARCH TESTS
// ============================================================================

#[tokio::test]
async fn test_hybrid_builds_dense_and_sparse_prefetch_branches() {
    let backend = Arc::new(MockBackend::default());
    let store = test_store(backend.clone());
    store.store(Entry::new("alpha beta", None)).await.unwrap();

    let mut request = HybridRequest::new("alpha");
    request.dense_limit = 7;
    request.sparse_limit = 3;
    request.final_limit = 2;
    let outcome = store.find_hybrid_tagged(request).await.unwrap();
    assert!(!outcome.is_fallback());

    let queries = backend.queries.lock();
    assert_eq!(queries.len(), 1);
    let fused = &queries[0];
    assert_eq!(fused.limit, 2);
    assert!(matches!(
        fused.query,
        QueryVector::Fusion(FusionMethod::Rrf)
    ));

    assert_eq!(fused.prefetch.len(), 2);
    match &fused.prefetch[0].query {
        QueryVector::Dense { name, vector } => {
            assert_eq!(name, "test-vector");
            assert_eq!(*vector, vectorize("alpha"));
        }
        other => panic!("expected dense prefetch, got {:?}", other),
    }
    assert_eq!(fused.prefetch[0].limit, 7);
    match &fused.prefetch[1].query {
        QueryVector::Sparse { name, vector } => {
            assert_eq!(name, "sparse");
            assert!(!vector.is_empty());
        }
        other => panic!("expected sparse prefetch, got {:?}", other),
    }
    assert_eq!(fused.prefetch[1].limit, 3);
}

#[tokio::test]
async fn test_hybrid_skips_sparse_prefetch_for_unindexed_terms() {
    let backend = Arc::new(MockBackend::default());
    let store = test_store(backend.clone());
    store.store(Entry::new("alpha beta", None)).await.unwrap();

    store
        .find_hybrid_tagged(HybridRequest::new("zzz"))
        .await
        .unwrap();

    let queries = backend.queries.lock();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].prefetch.len(), 1, "sparse branch should be absent");
    assert!(matches!(
        queries[0].prefetch[0].query,
        QueryVector::Dense { .. }
    ));
}

#[tokio::test]
async fn test_hybrid_on_missing_collection_is_empty() {
    let backend = Arc::new(MockBackend::default());
    let store = test_store(backend.clone());

    let outcome = store
        .find_hybrid_tagged(HybridRequest::new("anything"))
        .await
        .unwrap();

    assert_eq!(outcome, HybridOutcome::Fused(Vec::new()));
    assert!(backend.queries.lock().is_empty());
}

#[tokio::test]
async fn test_hybrid_falls_back_to_dense_when_fusion_fails() {
    let backend = Arc::new(MockBackend::default());
    let store = test_store(backend.clone());
    store.store(Entry::new("alpha beta", None)).await.unwrap();
    backend.fail_fused_queries();

    let mut request = HybridRequest::new("alpha");
    request.final_limit = 5;
    let outcome = store.find_hybrid_tagged(request).await.unwrap();

    assert!(outcome.is_fallback());
    assert_eq!(outcome.entries().len(), 1);
    assert_eq!(outcome.entries()[0].content, "alpha beta");

    let queries = backend.queries.lock();
    assert_eq!(queries.len(), 2, "fused attempt then dense fallback");
    assert!(queries[1].prefetch.is_empty());
    assert!(matches!(queries[1].query, QueryVector::Dense { .. }));
    assert_eq!(queries[1].limit, 5);
}

#[tokio::test]
async fn test_filters_pass_through_to_backend() {
    let backend = Arc::new(MockBackend::default());
    let store = test_store(backend.clone());
    store.store(Entry::new("alpha", None)).await.unwrap();

    let filter = json!({ "must": [{ "key": "metadata.type", "match": { "value": "note" } }] });

    store
        .search("alpha", 10, Some(filter.clone()))
        .await
        .unwrap();
    let mut request = HybridRequest::new("alpha");
    request.filter = Some(filter.clone());
    store.find_hybrid_tagged(request).await.unwrap();

    let queries = backend.queries.lock();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0].filter, Some(filter.clone()));
    assert_eq!(queries[1].filter, Some(filter));
}
