//! Recall - Qdrant-backed memory for AI agents
//!
//! Stores knowledge entries in a Qdrant collection with dense embeddings and
//! locally computed BM25 sparse vectors, and retrieves them with hybrid
//! (semantic + keyword) search over MCP.

pub mod embedding;
pub mod error;
pub mod index;
pub mod mcp;
pub mod search;
pub mod storage;
pub mod types;

pub use error::{RecallError, Result};
pub use storage::QdrantStore;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
