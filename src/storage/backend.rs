//! Vector store backend trait
//!
//! Defines the `VectorBackend` trait the entry store talks through, plus the
//! neutral point and query structures that cross it. The REST client is the
//! production implementation; tests swap in an in-memory double.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::{FusionMethod, SparseVector};

/// Name of the sparse vector slot every collection carries
pub const SPARSE_VECTOR_NAME: &str = "sparse";

/// Vector layout for a new collection: one named dense vector plus one named
/// sparse slot
#[derive(Debug, Clone)]
pub struct CollectionSchema {
    /// Dense vector name, provider-specific
    pub dense_name: String,
    /// Dense vector dimensions
    pub dense_size: usize,
    /// Sparse vector name
    pub sparse_name: String,
}

/// Named vectors attached to one point
#[derive(Debug, Clone)]
pub struct NamedVectors {
    /// Dense vector under the provider's name
    pub dense_name: String,
    pub dense: Vec<f32>,
    /// Sparse vector; None means the slot is omitted from the stored point
    pub sparse: Option<SparseVector>,
}

/// A point to upsert
#[derive(Debug, Clone)]
pub struct PointRecord {
    pub id: String,
    pub vectors: NamedVectors,
    pub payload: Value,
}

/// A point fetched by id
#[derive(Debug, Clone)]
pub struct RetrievedPoint {
    pub id: String,
    pub payload: Option<Value>,
}

/// A scored search hit
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: Option<Value>,
}

/// Query input for the backend's query API
#[derive(Debug, Clone)]
pub enum QueryVector {
    /// Nearest-neighbor search against a named dense vector
    Dense { name: String, vector: Vec<f32> },
    /// Similarity against a named sparse vector
    Sparse { name: String, vector: SparseVector },
    /// Server-side fusion over the prefetch branches
    Fusion(FusionMethod),
}

/// One prefetch branch of a fused query
#[derive(Debug, Clone)]
pub struct Prefetch {
    pub query: QueryVector,
    pub limit: usize,
}

/// A query with optional prefetch branches and payload filter
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub prefetch: Vec<Prefetch>,
    pub query: QueryVector,
    pub filter: Option<Value>,
    pub limit: usize,
}

/// Operations the entry store needs from a vector database
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Check whether a collection exists
    async fn collection_exists(&self, collection: &str) -> Result<bool>;

    /// Create a collection with the given vector layout
    async fn create_collection(&self, collection: &str, schema: &CollectionSchema) -> Result<()>;

    /// Create a payload field index
    async fn create_payload_index(
        &self,
        collection: &str,
        field_name: &str,
        field_schema: &str,
    ) -> Result<()>;

    /// Upsert points, waiting for the operation to complete
    async fn upsert_points(&self, collection: &str, points: Vec<PointRecord>) -> Result<()>;

    /// Fetch points by id, payloads included
    async fn retrieve_points(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<Vec<RetrievedPoint>>;

    /// Delete points by id, waiting for the operation to complete
    async fn delete_points(&self, collection: &str, ids: &[String]) -> Result<()>;

    /// Run a query (dense, sparse, or fused) and return scored hits with
    /// payloads
    async fn query_points(
        &self,
        collection: &str,
        request: &QueryRequest,
    ) -> Result<Vec<ScoredPoint>>;
}
