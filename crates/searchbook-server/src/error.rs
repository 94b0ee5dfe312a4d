//! Error types for Searchbook server.

use searchbook_core::BlockId;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Searchbook core error.
    #[error("Core error: {0}")]
    Core(#[from] searchbook_core::Error),

    /// Block not found.
    #[error("Block not found: {0}")]
    BlockNotFound(BlockId),

    /// The session does not accept edits.
    #[error("Notebook is read-only")]
    ReadOnly,

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
