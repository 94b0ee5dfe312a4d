//! Error types for searchbook-core.

use thiserror::Error;

use crate::block::{BlockId, BlockKind};

/// Result type for searchbook-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in searchbook-core.
#[derive(Debug, Error)]
pub enum Error {
    /// A block id is present in the display order but has no block.
    ///
    /// Every mutation keeps the order and the block map in step, so this
    /// indicates a defect rather than a recoverable condition.
    #[error("Block with id:{0} does not exist.")]
    MissingBlock(BlockId),

    /// An input update did not match the kind of the existing block.
    #[error("Input block type {found} does not match existing block type {expected}.")]
    BlockTypeMismatch { expected: BlockKind, found: BlockKind },
}

/// Errors reported by the external services a notebook runs against.
///
/// These never escape a block run: they are folded into the block's output.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The requested repository, revision or file does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was malformed or rejected.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The backing service could not be reached or failed.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
