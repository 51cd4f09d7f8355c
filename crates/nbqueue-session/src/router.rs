//! Per-document scheduler registry.

use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

use nbqueue_core::{Collaborators, DocId, EngineEvent, ExecutionTracker, QueueConfig, QueueState};

use crate::error::{SessionError, SessionResult};

/// Owns one [`QueueState`] per open document and routes engine events to it.
///
/// All documents share one [`ExecutionTracker`], so [`any_executing`]
/// reflects every open queue.
///
/// [`any_executing`]: SessionRouter::any_executing
pub struct SessionRouter {
    tracker: ExecutionTracker,
    sessions: FxHashMap<DocId, QueueState>,
}

impl SessionRouter {
    pub fn new() -> Self {
        Self {
            tracker: ExecutionTracker::new(),
            sessions: FxHashMap::default(),
        }
    }

    /// Open a scheduler for a document.
    pub fn open(
        &mut self,
        doc_id: DocId,
        config: QueueConfig,
        collab: Collaborators,
    ) -> SessionResult<&mut QueueState> {
        if self.sessions.contains_key(&doc_id) {
            return Err(SessionError::DocumentAlreadyOpen(doc_id));
        }
        tracing::info!(doc = %doc_id, "opening document session");
        let state = QueueState::new(doc_id.clone(), config, collab, self.tracker.clone());
        Ok(self.sessions.entry(doc_id).or_insert(state))
    }

    /// Close a document, clearing anything it still has queued.
    pub fn close(&mut self, doc_id: &DocId) -> SessionResult<()> {
        let mut state = self
            .sessions
            .remove(doc_id)
            .ok_or_else(|| SessionError::DocumentNotFound(doc_id.clone()))?;
        if state.is_executing() {
            state.clear();
        }
        tracing::info!(doc = %doc_id, "closed document session");
        Ok(())
    }

    pub fn get(&self, doc_id: &DocId) -> Option<&QueueState> {
        self.sessions.get(doc_id)
    }

    pub fn get_mut(&mut self, doc_id: &DocId) -> Option<&mut QueueState> {
        self.sessions.get_mut(doc_id)
    }

    pub fn is_open(&self, doc_id: &DocId) -> bool {
        self.sessions.contains_key(doc_id)
    }

    /// Route an event to its document. Returns false if the document is
    /// not open.
    pub fn dispatch(&mut self, event: &EngineEvent) -> bool {
        match self.sessions.get_mut(event.doc_id()) {
            Some(state) => {
                state.handle_event(event);
                true
            }
            None => {
                tracing::debug!(doc = %event.doc_id(), "event for unknown document ignored");
                false
            }
        }
    }

    pub fn any_executing(&self) -> bool {
        self.tracker.any_executing()
    }

    pub fn tracker(&self) -> &ExecutionTracker {
        &self.tracker
    }

    /// Pump events until no queue is executing.
    ///
    /// Fails with [`SessionError::EngineStopped`] if the event stream ends
    /// first.
    pub async fn run_until_idle(
        &mut self,
        events: &mut mpsc::UnboundedReceiver<EngineEvent>,
    ) -> SessionResult<()> {
        while self.any_executing() {
            let Some(event) = events.recv().await else {
                return Err(SessionError::EngineStopped);
            };
            self.dispatch(&event);
        }
        Ok(())
    }
}

impl Default for SessionRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::RangeInclusive;
    use std::sync::{Arc, Mutex};

    use nbqueue_core::{
        ChunkExecState, ChunkId, ChunkRenderer, ChunkScope, ChunkState, CommandHistory, DocQueue,
        ExecMode, ExecUnit, ExecutionEngine, LineState, NotebookEditor, QueueOp, QueueUnit,
        RpcCallback, StatusReporter,
    };

    #[derive(Default)]
    struct Quiet {
        submitted: Mutex<usize>,
    }

    impl ExecutionEngine for Quiet {
        fn execute_queue(&self, _queue: DocQueue, done: RpcCallback) {
            *self.submitted.lock().unwrap() += 1;
            done(Ok(()));
        }

        fn update_queue_unit(
            &self,
            _unit: QueueUnit,
            _op: QueueOp,
            _before: Option<ChunkId>,
            done: RpcCallback,
        ) {
            done(Ok(()));
        }
    }

    impl NotebookEditor for Quiet {
        fn chunk_id_at_row(&self, _row: usize) -> Option<ChunkId> {
            None
        }

        fn chunk_scope(&self, chunk_id: &ChunkId) -> Option<ChunkScope> {
            Some(ChunkScope::new(chunk_id.clone(), 1, "x\n"))
        }

        fn unfold(&self, _scope: &ChunkScope) {}

        fn pixel_width(&self) -> u32 {
            0
        }

        fn char_width(&self) -> u32 {
            0
        }
    }

    impl ChunkRenderer for Quiet {
        fn set_line_state(&self, _: &ChunkId, _: RangeInclusive<usize>, _: LineState) {}
        fn set_chunk_state(&self, _: &ChunkId, _: ChunkState) {}
        fn clear_error(&self, _: &ChunkId) {}
    }

    impl StatusReporter for Quiet {
        fn show_progress(&self, _: &str) {}
        fn update_progress(&self, _: u32) {}
        fn hide_progress(&self, _: bool) {}
        fn show_error(&self, _: &str, _: &str) {}
    }

    impl CommandHistory for Quiet {
        fn append(&self, _: &str) {}
    }

    fn collab() -> Collaborators {
        let quiet = Arc::new(Quiet::default());
        Collaborators {
            engine: quiet.clone(),
            editor: quiet.clone(),
            renderer: quiet.clone(),
            status: quiet.clone(),
            history: quiet,
        }
    }

    fn run_chunk(router: &mut SessionRouter, doc: &DocId, chunk: &str) {
        let state = router.get_mut(doc).unwrap();
        let scope = ChunkScope::new(ChunkId::new(chunk), 1, "x\n");
        state.execute_chunk(ExecUnit::whole_chunk(scope, ExecMode::Batch));
    }

    #[test]
    fn test_open_twice_is_error() {
        let mut router = SessionRouter::new();
        let doc = DocId::new("d1");
        router.open(doc.clone(), QueueConfig::default(), collab()).unwrap();
        assert!(matches!(
            router.open(doc.clone(), QueueConfig::default(), collab()),
            Err(SessionError::DocumentAlreadyOpen(_))
        ));
        assert!(router.is_open(&doc));
    }

    #[test]
    fn test_close_unknown_is_error() {
        let mut router = SessionRouter::new();
        assert!(matches!(
            router.close(&DocId::new("nope")),
            Err(SessionError::DocumentNotFound(_))
        ));
    }

    #[test]
    fn test_dispatch_routes_by_document() {
        let mut router = SessionRouter::new();
        let d1 = DocId::new("d1");
        let d2 = DocId::new("d2");
        router.open(d1.clone(), QueueConfig::default(), collab()).unwrap();
        router.open(d2.clone(), QueueConfig::default(), collab()).unwrap();

        run_chunk(&mut router, &d1, "c1");
        run_chunk(&mut router, &d2, "c1");
        assert_eq!(router.tracker().active_count(), 2);

        let started = EngineEvent::state(d1.clone(), ChunkId::new("c1"), ChunkExecState::Started);
        assert!(router.dispatch(&started));
        assert!(router.get(&d1).unwrap().is_chunk_executing(&ChunkId::new("c1")));
        assert!(!router.get(&d2).unwrap().is_chunk_executing(&ChunkId::new("c1")));

        let finished = EngineEvent::state(d1.clone(), ChunkId::new("c1"), ChunkExecState::Finished);
        router.dispatch(&finished);
        assert_eq!(router.tracker().active_count(), 1);
        assert!(router.any_executing());

        let stray = EngineEvent::state(DocId::new("d3"), ChunkId::new("c1"), ChunkExecState::Finished);
        assert!(!router.dispatch(&stray));
    }

    #[test]
    fn test_close_releases_execution() {
        let mut router = SessionRouter::new();
        let doc = DocId::new("d1");
        router.open(doc.clone(), QueueConfig::default(), collab()).unwrap();
        run_chunk(&mut router, &doc, "c1");
        assert!(router.any_executing());

        router.close(&doc).unwrap();
        assert!(!router.any_executing());
        assert!(router.get(&doc).is_none());
    }

    #[tokio::test]
    async fn test_run_until_idle_reports_stopped_engine() {
        let mut router = SessionRouter::new();
        let doc = DocId::new("d1");
        router.open(doc.clone(), QueueConfig::default(), collab()).unwrap();
        run_chunk(&mut router, &doc, "c1");

        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(EngineEvent::state(doc.clone(), ChunkId::new("c1"), ChunkExecState::Started))
            .unwrap();
        drop(tx);

        let result = router.run_until_idle(&mut rx).await;
        assert!(matches!(result, Err(SessionError::EngineStopped)));
    }

    #[tokio::test]
    async fn test_run_until_idle_returns_when_queues_drain() {
        let mut router = SessionRouter::new();
        let doc = DocId::new("d1");
        router.open(doc.clone(), QueueConfig::default(), collab()).unwrap();
        run_chunk(&mut router, &doc, "c1");

        let (tx, mut rx) = mpsc::unbounded_channel();
        for state in [ChunkExecState::Started, ChunkExecState::Finished] {
            tx.send(EngineEvent::state(doc.clone(), ChunkId::new("c1"), state))
                .unwrap();
        }

        router.run_until_idle(&mut rx).await.unwrap();
        assert!(!router.any_executing());
    }
}
