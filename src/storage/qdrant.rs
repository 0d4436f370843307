//! Qdrant REST client
//!
//! Minimal async client for the endpoints the store uses. Named vectors go
//! on the wire as an object keyed by vector name; sparse vectors serialize
//! as parallel `ids` / `values` arrays. All reads request payloads
//! explicitly, since the REST API omits them by default.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::{RecallError, Result};
use crate::storage::backend::{
    CollectionSchema, PointRecord, Prefetch, QueryRequest, QueryVector, RetrievedPoint,
    ScoredPoint, VectorBackend, SPARSE_VECTOR_NAME,
};

/// REST client for a Qdrant server
pub struct QdrantClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl QdrantClient {
    pub fn new(url: &str, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }
        builder
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RecallError::Backend(format!(
                "Qdrant API error {}: {}",
                status, body
            )));
        }
        Ok(response.json().await?)
    }
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct ExistsResult {
    exists: bool,
}

#[derive(Deserialize)]
struct RawPoint {
    id: Value,
    #[serde(default)]
    payload: Option<Value>,
}

#[derive(Deserialize)]
struct RawQueryResult {
    points: Vec<RawScoredPoint>,
}

#[derive(Deserialize)]
struct RawScoredPoint {
    id: Value,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    payload: Option<Value>,
}

/// Point ids come back as strings for UUIDs and numbers for integer ids
fn point_id_string(id: &Value) -> String {
    match id.as_str() {
        Some(s) => s.to_string(),
        None => id.to_string(),
    }
}

fn query_value(query: &QueryVector) -> (Value, Option<&str>) {
    match query {
        QueryVector::Dense { name, vector } => (json!(vector), Some(name)),
        QueryVector::Sparse { name, vector } => (json!(vector), Some(name)),
        QueryVector::Fusion(method) => (json!({ "fusion": method }), None),
    }
}

fn prefetch_value(prefetch: &Prefetch) -> Value {
    let (query, using) = query_value(&prefetch.query);
    let mut object = Map::new();
    object.insert("query".to_string(), query);
    if let Some(name) = using {
        object.insert("using".to_string(), json!(name));
    }
    object.insert("limit".to_string(), json!(prefetch.limit));
    Value::Object(object)
}

fn point_value(point: &PointRecord) -> Value {
    let mut vector = Map::new();
    vector.insert(point.vectors.dense_name.clone(), json!(point.vectors.dense));
    if let Some(sparse) = &point.vectors.sparse {
        vector.insert(SPARSE_VECTOR_NAME.to_string(), json!(sparse));
    }
    json!({
        "id": point.id,
        "vector": vector,
        "payload": point.payload,
    })
}

fn query_body(request: &QueryRequest) -> Value {
    let (query, using) = query_value(&request.query);
    let mut body = Map::new();
    if !request.prefetch.is_empty() {
        body.insert(
            "prefetch".to_string(),
            Value::Array(request.prefetch.iter().map(prefetch_value).collect()),
        );
    }
    body.insert("query".to_string(), query);
    if let Some(name) = using {
        body.insert("using".to_string(), json!(name));
    }
    if let Some(filter) = &request.filter {
        body.insert("filter".to_string(), filter.clone());
    }
    body.insert("limit".to_string(), json!(request.limit));
    body.insert("with_payload".to_string(), json!(true));
    Value::Object(body)
}

#[async_trait]
impl VectorBackend for QdrantClient {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/collections/{}/exists", collection),
            )
            .send()
            .await?;
        let value = Self::read_json(response).await?;
        let parsed: ApiResponse<ExistsResult> = serde_json::from_value(value)?;
        Ok(parsed.result.exists)
    }

    async fn create_collection(&self, collection: &str, schema: &CollectionSchema) -> Result<()> {
        let mut vectors = Map::new();
        vectors.insert(
            schema.dense_name.clone(),
            json!({ "size": schema.dense_size, "distance": "Cosine" }),
        );
        let mut sparse_vectors = Map::new();
        sparse_vectors.insert(schema.sparse_name.clone(), json!({}));
        let body = json!({
            "vectors": vectors,
            "sparse_vectors": sparse_vectors,
        });

        let response = self
            .request(reqwest::Method::PUT, &format!("/collections/{}", collection))
            .json(&body)
            .send()
            .await?;
        Self::read_json(response).await?;
        Ok(())
    }

    async fn create_payload_index(
        &self,
        collection: &str,
        field_name: &str,
        field_schema: &str,
    ) -> Result<()> {
        let body = json!({
            "field_name": field_name,
            "field_schema": field_schema,
        });
        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/collections/{}/index", collection),
            )
            .json(&body)
            .send()
            .await?;
        Self::read_json(response).await?;
        Ok(())
    }

    async fn upsert_points(&self, collection: &str, points: Vec<PointRecord>) -> Result<()> {
        let body = json!({
            "points": points.iter().map(point_value).collect::<Vec<_>>(),
        });
        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/collections/{}/points?wait=true", collection),
            )
            .json(&body)
            .send()
            .await?;
        Self::read_json(response).await?;
        Ok(())
    }

    async fn retrieve_points(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<Vec<RetrievedPoint>> {
        let body = json!({ "ids": ids, "with_payload": true });
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/points", collection),
            )
            .json(&body)
            .send()
            .await?;
        let value = Self::read_json(response).await?;
        let parsed: ApiResponse<Vec<RawPoint>> = serde_json::from_value(value)?;
        Ok(parsed
            .result
            .into_iter()
            .map(|p| RetrievedPoint {
                id: point_id_string(&p.id),
                payload: p.payload,
            })
            .collect())
    }

    async fn delete_points(&self, collection: &str, ids: &[String]) -> Result<()> {
        let body = json!({ "points": ids });
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/delete?wait=true", collection),
            )
            .json(&body)
            .send()
            .await?;
        Self::read_json(response).await?;
        Ok(())
    }

    async fn query_points(
        &self,
        collection: &str,
        request: &QueryRequest,
    ) -> Result<Vec<ScoredPoint>> {
        let body = query_body(request);
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/query", collection),
            )
            .json(&body)
            .send()
            .await?;
        let value = Self::read_json(response).await?;
        let parsed: ApiResponse<RawQueryResult> = serde_json::from_value(value)?;
        Ok(parsed
            .result
            .points
            .into_iter()
            .map(|p| ScoredPoint {
                id: point_id_string(&p.id),
                score: p.score,
                payload: p.payload,
            })
            .collect())
    }
}
