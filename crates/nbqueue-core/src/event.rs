//! Events pushed asynchronously by the execution engine.

use serde::{Deserialize, Serialize};

use crate::range::ExecRange;
use crate::types::{ChunkId, DocId};

/// Whether an executed range begins a new expression or continues one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprMode {
    New,
    Continuation,
}

/// Lifecycle transition of a chunk on the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkExecState {
    Started,
    Finished,
    Cancelled,
}

/// Inbound engine event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A range of a chunk finished executing.
    RangeExecuted {
        doc_id: DocId,
        chunk_id: ChunkId,
        range: ExecRange,
        expr_mode: ExprMode,
        /// Source text of the range, recorded in the command history.
        code: String,
    },

    /// A chunk started, finished or was cancelled.
    ChunkStateChanged {
        doc_id: DocId,
        chunk_id: ChunkId,
        state: ChunkExecState,
        /// Chunk options resolved by the engine, applied on start.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<serde_json::Value>,
    },
}

impl EngineEvent {
    pub fn doc_id(&self) -> &DocId {
        match self {
            Self::RangeExecuted { doc_id, .. } | Self::ChunkStateChanged { doc_id, .. } => doc_id,
        }
    }

    pub fn chunk_id(&self) -> &ChunkId {
        match self {
            Self::RangeExecuted { chunk_id, .. } | Self::ChunkStateChanged { chunk_id, .. } => {
                chunk_id
            }
        }
    }

    /// Shorthand for a state change without options.
    pub fn state(doc_id: DocId, chunk_id: ChunkId, state: ChunkExecState) -> Self {
        Self::ChunkStateChanged {
            doc_id,
            chunk_id,
            state,
            options: None,
        }
    }
}
