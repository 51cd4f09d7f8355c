//! Process-wide "any queue executing" bookkeeping.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared count of documents whose queue is currently executing.
///
/// One tracker is shared by every [`QueueState`](crate::state::QueueState)
/// and drives a single global busy indicator.
#[derive(Debug, Clone, Default)]
pub struct ExecutionTracker {
    active: Arc<AtomicUsize>,
}

impl ExecutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any document's queue is executing.
    pub fn any_executing(&self) -> bool {
        self.active_count() > 0
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Begin one execution lifecycle. The count drops when the lease is dropped.
    pub fn begin(&self) -> ExecutionLease {
        self.active.fetch_add(1, Ordering::SeqCst);
        ExecutionLease {
            active: Arc::clone(&self.active),
        }
    }
}

/// Proof that one execution lifecycle is in progress.
///
/// Dropping the lease ends the lifecycle; since the lease is consumed, a
/// lifecycle can end only once.
#[derive(Debug)]
pub struct ExecutionLease {
    active: Arc<AtomicUsize>,
}

impl Drop for ExecutionLease {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
