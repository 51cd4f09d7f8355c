//! Channel-backed execution engine client.

use tokio::sync::mpsc;

use nbqueue_core::{
    ChunkId, DocQueue, ExecutionEngine, QueueOp, QueueUnit, RpcCallback, RpcError,
};

use crate::protocol::EngineRequest;

/// A request in flight together with its completion callback.
pub struct EngineCall {
    pub request: EngineRequest,
    pub reply: RpcCallback,
}

impl EngineCall {
    /// Report success to the caller.
    pub fn ack(self) {
        (self.reply)(Ok(()));
    }

    /// Report that the engine refused the request.
    pub fn reject(self, message: impl Into<String>) {
        (self.reply)(Err(RpcError::Rejected(message.into())));
    }
}

/// [`ExecutionEngine`] that forwards requests over an unbounded channel.
///
/// Sending never blocks. If the receiving side is gone, the callback is
/// invoked immediately with [`RpcError::Disconnected`].
#[derive(Clone)]
pub struct ChannelEngine {
    tx: mpsc::UnboundedSender<EngineCall>,
}

impl ChannelEngine {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EngineCall>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, request: EngineRequest, reply: RpcCallback) {
        if let Err(mpsc::error::SendError(call)) = self.tx.send(EngineCall { request, reply }) {
            tracing::warn!(doc = %call.request.doc_id(), "engine channel closed");
            (call.reply)(Err(RpcError::Disconnected));
        }
    }
}

impl ExecutionEngine for ChannelEngine {
    fn execute_queue(&self, queue: DocQueue, done: RpcCallback) {
        self.send(EngineRequest::ExecuteQueue { queue }, done);
    }

    fn update_queue_unit(
        &self,
        unit: QueueUnit,
        op: QueueOp,
        before: Option<ChunkId>,
        done: RpcCallback,
    ) {
        self.send(EngineRequest::UpdateUnit { unit, op, before }, done);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use nbqueue_core::{CommitMode, DocId};

    fn queue() -> DocQueue {
        DocQueue::new(DocId::new("d1"), "Run All", None, CommitMode::Uncommitted, 0, 0)
    }

    #[test]
    fn test_requests_are_forwarded() {
        let (engine, mut rx) = ChannelEngine::new();
        let outcome = Arc::new(Mutex::new(None));
        let slot = outcome.clone();

        engine.execute_queue(queue(), Box::new(move |r| *slot.lock().unwrap() = Some(r)));

        let call = rx.try_recv().unwrap();
        assert!(matches!(call.request, EngineRequest::ExecuteQueue { .. }));
        assert!(outcome.lock().unwrap().is_none());

        call.ack();
        assert_eq!(*outcome.lock().unwrap(), Some(Ok(())));
    }

    #[test]
    fn test_closed_channel_reports_disconnected() {
        let (engine, rx) = ChannelEngine::new();
        drop(rx);

        let outcome = Arc::new(Mutex::new(None));
        let slot = outcome.clone();
        engine.execute_queue(queue(), Box::new(move |r| *slot.lock().unwrap() = Some(r)));

        assert_eq!(*outcome.lock().unwrap(), Some(Err(RpcError::Disconnected)));
    }

    #[test]
    fn test_reject() {
        let (engine, mut rx) = ChannelEngine::new();
        let outcome = Arc::new(Mutex::new(None));
        let slot = outcome.clone();
        engine.execute_queue(queue(), Box::new(move |r| *slot.lock().unwrap() = Some(r)));

        rx.try_recv().unwrap().reject("busy");
        assert_eq!(
            *outcome.lock().unwrap(),
            Some(Err(RpcError::Rejected("busy".to_string())))
        );
    }
}
