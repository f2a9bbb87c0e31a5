//! Error types for the vIndexer system

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Contract method {method} failed with exit code {exit_code}")]
    Contract { method: String, exit_code: i32 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Errors the poll loop should simply retry after its backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Rpc(_) | Error::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
