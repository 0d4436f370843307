//! Embedding providers
//!
//! Dense vectors for stored entries and queries come from a provider behind
//! the [`Embedder`] trait:
//! - TF-IDF hashing (default; deterministic, no external services)
//! - OpenAI-compatible APIs (OpenAI, OpenRouter, Azure)
//!
//! Each provider names the dense vector it fills. The collection schema uses
//! that name, so points written with one provider are queried with the same
//! provider.

mod tfidf;

pub use tfidf::TfIdfEmbedder;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{RecallError, Result};
use crate::types::EmbeddingConfig;

/// Async embedding provider
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed document texts for storage
    async fn embed_documents(&self, documents: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a search query
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>>;

    /// Name of the dense vector this provider fills
    fn vector_name(&self) -> String;

    /// Embedding dimensions
    fn vector_size(&self) -> usize;
}

/// OpenAI embedding client
///
/// Works against OpenAI, OpenRouter, Azure OpenAI, and other
/// OpenAI-compatible APIs.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    /// Create an embedder with custom settings
    ///
    /// # Arguments
    /// * `api_key` - API key for authentication
    /// * `base_url` - API base URL (e.g., "https://openrouter.ai/api/v1" for OpenRouter)
    /// * `model` - Model name (e.g., "openai/text-embedding-3-small" for OpenRouter)
    /// * `dimensions` - Expected embedding dimensions (must match model output)
    pub fn with_config(
        api_key: String,
        base_url: Option<String>,
        model: Option<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: model.unwrap_or_else(|| "text-embedding-3-small".to_string()),
            dimensions,
        }
    }

    async fn request_embeddings(&self, input: serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            // OpenRouter requires HTTP-Referer header
            .header("HTTP-Referer", "https://github.com/recall")
            .header("X-Title", "Recall Memory")
            .json(&serde_json::json!({
                "input": input,
                "model": self.model,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RecallError::Embedding(format!(
                "Embedding API error {}: {}",
                status, text
            )));
        }

        Ok(response.json().await?)
    }

    fn parse_embedding(&self, item: &serde_json::Value) -> Result<Vec<f32>> {
        let embedding: Vec<f32> = item["embedding"]
            .as_array()
            .ok_or_else(|| RecallError::Embedding("Invalid response format".to_string()))?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();

        if embedding.len() != self.dimensions {
            return Err(RecallError::Embedding(format!(
                "Embedding dimensions mismatch: expected {}, got {}. Set EMBEDDING_DIMENSIONS={} to match your model.",
                self.dimensions,
                embedding.len(),
                embedding.len()
            )));
        }

        Ok(embedding)
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed_documents(&self, documents: &[String]) -> Result<Vec<Vec<f32>>> {
        if documents.is_empty() {
            return Ok(vec![]);
        }

        // OpenAI allows up to 2048 inputs per call
        let mut all_embeddings = Vec::with_capacity(documents.len());
        for chunk in documents.chunks(2048) {
            let data = self
                .request_embeddings(serde_json::json!(chunk))
                .await?;
            let items = data["data"]
                .as_array()
                .ok_or_else(|| RecallError::Embedding("Invalid response format".to_string()))?;
            for item in items {
                all_embeddings.push(self.parse_embedding(item)?);
            }
        }
        Ok(all_embeddings)
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let data = self
            .request_embeddings(serde_json::json!(query))
            .await?;
        self.parse_embedding(&data["data"][0])
    }

    fn vector_name(&self) -> String {
        let tail = self.model.split('/').last().unwrap_or_default();
        format!("openai-{}", tail.to_lowercase())
    }

    fn vector_size(&self) -> usize {
        self.dimensions
    }
}

/// Create an embedder from configuration
///
/// Providers:
/// - `"tfidf"`: always available, no external dependencies
/// - `"openai"`: OpenAI-compatible API, requires an API key
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    if config.dimensions == 0 {
        return Err(RecallError::Config(
            "EMBEDDING_DIMENSIONS must be positive".to_string(),
        ));
    }
    match config.provider.as_str() {
        "tfidf" => Ok(Arc::new(TfIdfEmbedder::new(config.dimensions))),
        "openai" => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                RecallError::Config(
                    "OPENAI_API_KEY required when EMBEDDING_PROVIDER=openai".to_string(),
                )
            })?;
            Ok(Arc::new(OpenAIEmbedder::with_config(
                api_key,
                config.base_url.clone(),
                Some(config.model.clone()),
                config.dimensions,
            )))
        }
        _ => Err(RecallError::Config(format!(
            "Unknown embedding provider: '{}'. Use 'tfidf' or 'openai'",
            config.provider
        ))),
    }
}

/// Cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
