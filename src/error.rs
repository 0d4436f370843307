//! Error types for Recall

use thiserror::Error;

/// Result type alias for Recall operations
pub type Result<T> = std::result::Result<T, RecallError>;

/// Main error type for Recall
#[derive(Error, Debug)]
pub enum RecallError {
    #[error("Point with ID {0} not found")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RecallError {
    /// Get error code for MCP protocol
    pub fn code(&self) -> i64 {
        match self {
            RecallError::NotFound(_) => -32001,
            RecallError::InvalidInput(_) => -32602,
            _ => -32000,
        }
    }
}
