//! Error types for nbqueue sessions.

use std::path::PathBuf;

use nbqueue_core::DocId;

/// Session error type.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// IO error.
    #[error("IO error at {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// Scheduler error.
    #[error("Core error: {0}")]
    Core(#[from] nbqueue_core::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Notebook source could not be split into chunks.
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// No session is open for the document.
    #[error("Document not open: {0}")]
    DocumentNotFound(DocId),

    /// A session is already open for the document.
    #[error("Document already open: {0}")]
    DocumentAlreadyOpen(DocId),

    /// The engine stopped emitting events while queues were still executing.
    #[error("Engine stopped while execution was in progress")]
    EngineStopped,
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            message: e.to_string(),
        }
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
