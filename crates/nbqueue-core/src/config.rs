//! Scheduler configuration.

use std::path::PathBuf;

use crate::types::CommitMode;

/// Job label used when a single chunk starts a new queue.
pub const DEFAULT_CHUNK_JOB_DESC: &str = "Run Chunk";

/// Per-document scheduler settings.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Job description for queues started by a single chunk.
    pub chunk_job_desc: String,
    /// Working directory the engine runs chunks in.
    pub working_dir: Option<PathBuf>,
    /// Cache the engine writes outputs into.
    pub commit_mode: CommitMode,
    /// Append executed code to the command history.
    pub record_history: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            chunk_job_desc: DEFAULT_CHUNK_JOB_DESC.to_string(),
            working_dir: None,
            commit_mode: CommitMode::default(),
            record_history: true,
        }
    }
}
