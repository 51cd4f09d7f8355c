//! Chunk execution queue for interactive code notebooks.
//!
//! This crate provides:
//! - Character ranges and per-chunk execution records ([`ExecRange`], [`QueueUnit`])
//! - The per-document queue ([`DocQueue`]) with progress bookkeeping
//! - The scheduler ([`QueueState`]) that submits work to a remote engine and
//!   reconciles its asynchronous events
//! - Collaborator traits for the engine, editor, renderer, status and history
//! - A process-wide [`ExecutionTracker`] behind the global busy indicator

pub mod collab;
pub mod config;
pub mod doc_queue;
pub mod error;
pub mod event;
pub mod exec_unit;
pub mod range;
pub mod state;
pub mod tracker;
pub mod types;
pub mod unit;

pub use collab::{
    ChunkRenderer, ChunkState, Collaborators, CommandHistory, ExecutionEngine, LineState,
    NotebookEditor, RpcCallback, StatusReporter,
};
pub use config::QueueConfig;
pub use doc_queue::DocQueue;
pub use error::{Error, Result, RpcError};
pub use event::{ChunkExecState, EngineEvent, ExprMode};
pub use exec_unit::{ChunkScope, ExecUnit, Position, Span};
pub use range::ExecRange;
pub use state::QueueState;
pub use tracker::{ExecutionLease, ExecutionTracker};
pub use types::{ChunkId, CommitMode, DocId, ExecMode, ExecScope, QueueOp};
pub use unit::QueueUnit;
