//! Wire records exchanged with the execution engine.
//!
//! Requests and events are JSON objects tagged by a snake_case `type` field.

use serde::{Deserialize, Serialize};

use nbqueue_core::{ChunkId, DocId, DocQueue, QueueOp, QueueUnit};

pub use nbqueue_core::EngineEvent;

/// Messages sent from the scheduler to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineRequest {
    /// Run a whole queue.
    ExecuteQueue {
        /// Queue to run, head first.
        queue: DocQueue,
    },

    /// Change one unit of a running queue.
    UpdateUnit {
        /// Unit as the scheduler now sees it.
        unit: QueueUnit,
        /// Add, update or delete.
        op: QueueOp,
        /// Chunk to insert ahead of. None = append.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        before: Option<ChunkId>,
    },
}

impl EngineRequest {
    /// Document the request targets.
    pub fn doc_id(&self) -> &DocId {
        match self {
            Self::ExecuteQueue { queue } => &queue.doc_id,
            Self::UpdateUnit { unit, .. } => &unit.doc_id,
        }
    }
}
