//! Engine bridge and document sessions for nbqueue.
//!
//! This crate connects [`nbqueue_core::QueueState`] schedulers to an engine:
//! - [`ChannelEngine`]: fire-and-forget engine client over a tokio channel
//! - [`LoopbackEngine`]: in-process engine that reports chunks as executed
//! - [`SessionRouter`]: one scheduler per open document, event routing
//! - [`FencedNotebook`]: markdown notebooks with `{lang label}` chunks

pub mod engine;
pub mod error;
pub mod loopback;
pub mod notebook;
pub mod protocol;
pub mod router;

pub use engine::{ChannelEngine, EngineCall};
pub use error::{SessionError, SessionResult};
pub use loopback::{LoopbackConfig, LoopbackEngine};
pub use notebook::{FencedChunk, FencedNotebook};
pub use protocol::{EngineEvent, EngineRequest};
pub use router::SessionRouter;
