//! Error types for nbqueue-core.

use thiserror::Error;

use crate::types::ChunkId;

/// Result type for nbqueue-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in nbqueue-core.
#[derive(Debug, Error)]
pub enum Error {
    /// A queue is already executing for this document.
    #[error("execution already in progress")]
    ExecutionInProgress,

    /// Chunk could not be resolved by the editor.
    #[error("chunk not found: {0}")]
    ChunkNotFound(ChunkId),
}

/// Failure reported by an engine RPC completion callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// The engine is no longer reachable.
    #[error("engine disconnected")]
    Disconnected,

    /// The engine refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),
}
