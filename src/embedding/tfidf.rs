//! TF-IDF based embedding fallback
//!
//! Deterministic hashing-trick vectors, usable wherever an embedding API is
//! unavailable. Quality is well below a learned model; retrieval leans on
//! the sparse side when this provider is active.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::embedding::Embedder;
use crate::error::Result;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hashing-trick TF-IDF embedder
pub struct TfIdfEmbedder {
    dimensions: usize,
}

impl TfIdfEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Lowercased alphanumeric tokens, single characters dropped
    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.len() > 1)
            .map(String::from)
            .collect()
    }

    /// FNV-1a; stable across builds and processes, since vectors written to
    /// the store must stay comparable after restarts
    fn fnv1a(bytes: &[u8]) -> u64 {
        let mut hash = FNV_OFFSET;
        for byte in bytes {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }

    /// Hash a token to a dimension index
    fn hash_token(token: &str, dimensions: usize) -> usize {
        (Self::fnv1a(token.as_bytes()) as usize) % dimensions
    }

    /// Sign for feature hashing (reduces collision impact)
    fn hash_sign(token: &str) -> f32 {
        let mut bytes = token.as_bytes().to_vec();
        bytes.extend_from_slice(b"_sign");
        if Self::fnv1a(&bytes) % 2 == 0 {
            1.0
        } else {
            -1.0
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let tokens = Self::tokenize(text);
        let mut embedding = vec![0.0_f32; self.dimensions];

        if tokens.is_empty() {
            return embedding;
        }

        let mut counts: HashMap<&str, f32> = HashMap::new();
        for token in &tokens {
            *counts.entry(token.as_str()).or_insert(0.0) += 1.0;
        }

        // Weights accumulate in first-occurrence order, so equal texts embed
        // to equal bits even when hashed indexes collide.
        let doc_len = tokens.len() as f32;
        for token in &tokens {
            let Some(count) = counts.remove(token.as_str()) else {
                continue;
            };
            // tf = ln(1 + count/len); token length stands in for idf,
            // longer tokens being rarer
            let weight = (1.0 + count / doc_len).ln() * (1.0 + token.len() as f32 * 0.1);
            let idx = Self::hash_token(token, self.dimensions);
            embedding[idx] += weight * Self::hash_sign(token);
        }

        // Bigrams catch adjacency that unigrams lose, at half weight
        for pair in tokens.windows(2) {
            let bigram = format!("{}_{}", pair[0], pair[1]);
            let idx = Self::hash_token(&bigram, self.dimensions);
            embedding[idx] += 0.5 * Self::hash_sign(&bigram);
        }

        // L2 normalize
        let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl Embedder for TfIdfEmbedder {
    async fn embed_documents(&self, documents: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(documents.iter().map(|d| self.embed_one(d)).collect())
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        Ok(self.embed_one(query))
    }

    fn vector_name(&self) -> String {
        format!("tfidf-{}", self.dimensions)
    }

    fn vector_size(&self) -> usize {
        self.dimensions
    }
}
