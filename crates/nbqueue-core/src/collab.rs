//! Interfaces to the collaborators the scheduler drives but does not own.

use std::ops::RangeInclusive;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::doc_queue::DocQueue;
use crate::error::RpcError;
use crate::exec_unit::ChunkScope;
use crate::types::{ChunkId, QueueOp};
use crate::unit::QueueUnit;

/// Completion callback of a fire-and-forget engine RPC.
pub type RpcCallback = Box<dyn FnOnce(Result<(), RpcError>) + Send + 'static>;

/// Client side of the remote execution engine.
///
/// Calls return immediately; the outcome is delivered through `done`, which
/// may run on another thread. Execution progress arrives separately as
/// [`EngineEvent`](crate::event::EngineEvent)s.
pub trait ExecutionEngine: Send + Sync {
    /// Submit a whole queue in one call.
    fn execute_queue(&self, queue: DocQueue, done: RpcCallback);

    /// Add, update or delete a single unit of the running queue.
    ///
    /// `before` names the chunk the unit should be inserted ahead of; `None`
    /// appends.
    fn update_queue_unit(
        &self,
        unit: QueueUnit,
        op: QueueOp,
        before: Option<ChunkId>,
        done: RpcCallback,
    );
}

/// Read access to the document being edited.
pub trait NotebookEditor: Send + Sync {
    /// Chunk whose body or fences contain `row`.
    fn chunk_id_at_row(&self, row: usize) -> Option<ChunkId>;

    /// Current scope of a chunk, if it still exists.
    fn chunk_scope(&self, chunk_id: &ChunkId) -> Option<ChunkScope>;

    /// Unfold the chunk's source region if it is folded.
    fn unfold(&self, scope: &ChunkScope);

    fn pixel_width(&self) -> u32;

    fn char_width(&self) -> u32;
}

/// Gutter marker for a line of chunk code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineState {
    Queued,
    Executed,
    Resting,
}

/// Toolbar state of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkState {
    Queued,
    Executing,
    Resting,
}

/// Gutter and chunk toolbar rendering.
pub trait ChunkRenderer: Send + Sync {
    /// Mark editor rows `rows` (inclusive) of a chunk.
    fn set_line_state(&self, chunk_id: &ChunkId, rows: RangeInclusive<usize>, state: LineState);

    fn set_chunk_state(&self, chunk_id: &ChunkId, state: ChunkState);

    /// Remove any error decoration left by a previous run.
    fn clear_error(&self, chunk_id: &ChunkId);

    /// Apply chunk options resolved by the engine when the chunk starts.
    fn apply_chunk_options(&self, _chunk_id: &ChunkId, _options: &serde_json::Value) {}
}

/// Progress indicator and user-facing error reporting.
pub trait StatusReporter: Send + Sync {
    fn show_progress(&self, job_desc: &str);

    fn update_progress(&self, percent: u32);

    fn hide_progress(&self, immediate: bool);

    /// Show an error to the user, captioned with the job description.
    fn show_error(&self, caption: &str, message: &str);
}

/// Log of executed code.
pub trait CommandHistory: Send + Sync {
    fn append(&self, code: &str);
}

/// Bundle of collaborators handed to each scheduler.
#[derive(Clone)]
pub struct Collaborators {
    pub engine: Arc<dyn ExecutionEngine>,
    pub editor: Arc<dyn NotebookEditor>,
    pub renderer: Arc<dyn ChunkRenderer>,
    pub status: Arc<dyn StatusReporter>,
    pub history: Arc<dyn CommandHistory>,
}
