//! Qdrant-backed entry store
//!
//! `QdrantStore` combines three parts: an embedding provider for dense
//! vectors, a local BM25 index for sparse vectors, and a `VectorBackend` for
//! the collection itself. Entries are stored as points carrying a
//! `document` / `metadata` payload and both vector kinds.

pub mod backend;
mod filter;
mod qdrant;

pub use backend::{
    CollectionSchema, NamedVectors, PointRecord, Prefetch, QueryRequest, QueryVector,
    RetrievedPoint, ScoredPoint, VectorBackend, SPARSE_VECTOR_NAME,
};
pub use filter::build_filter;
pub use qdrant::QdrantClient;

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::embedding::Embedder;
use crate::error::{RecallError, Result};
use crate::index::SparseIndex;
use crate::search::{hybrid_search, HybridOutcome, HybridRequest};
use crate::types::{Entry, QdrantConfig, SparseVector, METADATA_PATH};

/// Entry store on top of a Qdrant collection
pub struct QdrantStore {
    backend: Arc<dyn VectorBackend>,
    embedder: Arc<dyn Embedder>,
    collection: String,
    field_indexes: Vec<(String, String)>,
    index: Mutex<SparseIndex>,
}

impl QdrantStore {
    pub fn new(
        backend: Arc<dyn VectorBackend>,
        embedder: Arc<dyn Embedder>,
        collection_name: impl Into<String>,
        field_indexes: Vec<(String, String)>,
    ) -> Self {
        Self {
            backend,
            embedder,
            collection: collection_name.into(),
            field_indexes,
            index: Mutex::new(SparseIndex::default()),
        }
    }

    /// Build a store from configuration, connecting a REST client
    pub fn from_config(config: &QdrantConfig, embedder: Arc<dyn Embedder>) -> Self {
        let backend = Arc::new(QdrantClient::new(&config.url, config.api_key.clone()));
        let field_indexes = config
            .filterable_fields
            .iter()
            .map(|f| (f.name.clone(), f.field_type.payload_schema().to_string()))
            .collect();
        Self::new(
            backend,
            embedder,
            config.collection_name.clone(),
            field_indexes,
        )
    }

    /// Use a specific sparse index configuration instead of the default
    pub fn with_sparse_index(mut self, index: SparseIndex) -> Self {
        self.index = Mutex::new(index);
        self
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub(crate) fn backend(&self) -> &dyn VectorBackend {
        self.backend.as_ref()
    }

    /// Sparse query vector against the current index state
    pub fn transform_query(&self, text: &str) -> SparseVector {
        self.index.lock().transform_query(text)
    }

    pub async fn collection_exists(&self) -> Result<bool> {
        self.backend.collection_exists(&self.collection).await
    }

    async fn ensure_collection_exists(&self) -> Result<()> {
        if self.collection_exists().await? {
            return Ok(());
        }

        let schema = CollectionSchema {
            dense_name: self.embedder.vector_name(),
            dense_size: self.embedder.vector_size(),
            sparse_name: SPARSE_VECTOR_NAME.to_string(),
        };
        self.backend
            .create_collection(&self.collection, &schema)
            .await?;
        for (field_name, field_schema) in &self.field_indexes {
            self.backend
                .create_payload_index(&self.collection, field_name, field_schema)
                .await?;
        }
        info!("Created collection {}", self.collection);
        Ok(())
    }

    /// Embed and index an entry's content, producing the point to upsert
    async fn build_point(&self, point_id: &str, entry: &Entry) -> Result<PointRecord> {
        let embeddings = self
            .embedder
            .embed_documents(std::slice::from_ref(&entry.content))
            .await?;
        let dense = embeddings.into_iter().next().ok_or_else(|| {
            RecallError::Embedding("Embedding provider returned no vectors".to_string())
        })?;

        let sparse = self.index.lock().index_document(point_id, &entry.content);

        let mut payload = Map::new();
        payload.insert("document".to_string(), json!(entry.content));
        payload.insert(METADATA_PATH.to_string(), json!(entry.metadata));

        Ok(PointRecord {
            id: point_id.to_string(),
            vectors: NamedVectors {
                dense_name: self.embedder.vector_name(),
                dense,
                sparse: if sparse.is_empty() { None } else { Some(sparse) },
            },
            payload: Value::Object(payload),
        })
    }

    /// Store a new entry, returning its generated point id
    pub async fn store(&self, entry: Entry) -> Result<String> {
        self.ensure_collection_exists().await?;

        let point_id = Uuid::new_v4().simple().to_string();
        let point = self.build_point(&point_id, &entry).await?;
        self.backend
            .upsert_points(&self.collection, vec![point])
            .await?;
        debug!("Stored entry {}", point_id);
        Ok(point_id)
    }

    /// Update an existing entry in place. Fails with NotFound when the id
    /// does not resolve to a stored point.
    pub async fn update(&self, point_id: &str, entry: Entry) -> Result<()> {
        let existing = self
            .backend
            .retrieve_points(&self.collection, &[point_id.to_string()])
            .await?;
        if existing.is_empty() {
            return Err(RecallError::NotFound(point_id.to_string()));
        }

        let point = self.build_point(point_id, &entry).await?;
        self.backend
            .upsert_points(&self.collection, vec![point])
            .await?;
        debug!("Updated entry {}", point_id);
        Ok(())
    }

    /// Delete an entry and drop it from the sparse index. Fails with
    /// NotFound when the id does not resolve to a stored point.
    pub async fn delete(&self, point_id: &str) -> Result<()> {
        let existing = self
            .backend
            .retrieve_points(&self.collection, &[point_id.to_string()])
            .await?;
        if existing.is_empty() {
            return Err(RecallError::NotFound(point_id.to_string()));
        }

        self.backend
            .delete_points(&self.collection, &[point_id.to_string()])
            .await?;
        self.index.lock().remove_document(point_id);
        debug!("Deleted entry {}", point_id);
        Ok(())
    }

    /// Dense-only search. Returns an empty list when the collection does not
    /// exist yet.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        filter: Option<Value>,
    ) -> Result<Vec<Entry>> {
        if !self.collection_exists().await? {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_query(query).await?;
        let request = QueryRequest {
            prefetch: Vec::new(),
            query: QueryVector::Dense {
                name: self.embedder.vector_name(),
                vector: query_vector,
            },
            filter,
            limit,
        };
        let points = self.backend.query_points(&self.collection, &request).await?;
        Ok(points
            .into_iter()
            .map(|p| entry_from_parts(p.id, p.payload))
            .collect())
    }

    /// Hybrid search returning the merged entry list
    pub async fn find_hybrid(&self, request: HybridRequest) -> Result<Vec<Entry>> {
        Ok(self.find_hybrid_tagged(request).await?.into_entries())
    }

    /// Hybrid search keeping the fused / dense-fallback distinction
    pub async fn find_hybrid_tagged(&self, request: HybridRequest) -> Result<HybridOutcome> {
        hybrid_search(self, request).await
    }
}

/// Map a point's payload back to an entry
pub(crate) fn entry_from_parts(id: String, payload: Option<Value>) -> Entry {
    let payload = payload.unwrap_or(Value::Null);
    let content = payload
        .get("document")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let metadata = payload
        .get(METADATA_PATH)
        .filter(|v| !v.is_null())
        .cloned();
    Entry {
        content,
        metadata,
        id: Some(id),
    }
}
