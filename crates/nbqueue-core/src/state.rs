//! Per-document chunk execution scheduler.
//!
//! [`QueueState`] decides what runs and in which order, submits work to the
//! engine, and reconciles the engine's asynchronous events with the local
//! queue. The local queue is a client-side projection of the engine's queue:
//! RPCs are fire-and-forget and a transport failure is reported but never
//! rolled back, so the two can diverge until the next queue is built.

use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::collab::{ChunkState, Collaborators, LineState, RpcCallback};
use crate::config::QueueConfig;
use crate::doc_queue::DocQueue;
use crate::error::{Error, Result};
use crate::event::{ChunkExecState, EngineEvent, ExprMode};
use crate::exec_unit::ExecUnit;
use crate::range::ExecRange;
use crate::tracker::{ExecutionLease, ExecutionTracker};
use crate::types::{ChunkId, DocId, ExecMode, QueueOp};
use crate::unit::QueueUnit;

/// Execution queue scheduler for one open document.
pub struct QueueState {
    doc_id: DocId,
    config: QueueConfig,
    collab: Collaborators,
    tracker: ExecutionTracker,
    /// Most recent queue. Kept after completion so finished units can still
    /// answer exec-mode lookups until the next queue replaces it.
    queue: Option<DocQueue>,
    /// Chunk the engine reported as started.
    executing_chunk: Option<ChunkId>,
    /// Held while the queue is active.
    lease: Option<ExecutionLease>,
}

impl QueueState {
    pub fn new(
        doc_id: DocId,
        config: QueueConfig,
        collab: Collaborators,
        tracker: ExecutionTracker,
    ) -> Self {
        Self {
            doc_id,
            config,
            collab,
            tracker,
            queue: None,
            executing_chunk: None,
            lease: None,
        }
    }

    pub fn doc_id(&self) -> &DocId {
        &self.doc_id
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// The current (or most recently completed) queue.
    pub fn queue(&self) -> Option<&DocQueue> {
        self.queue.as_ref()
    }

    /// Whether this document has a queue with units left to run.
    pub fn is_executing(&self) -> bool {
        self.active_queue().is_some()
    }

    /// Whether any document sharing this scheduler's tracker is executing.
    pub fn any_queues_executing(&self) -> bool {
        self.tracker.any_executing()
    }

    pub fn is_chunk_queued(&self, chunk_id: &ChunkId) -> bool {
        self.active_queue()
            .is_some_and(|q| q.unit(chunk_id).is_some())
    }

    pub fn is_chunk_executing(&self, chunk_id: &ChunkId) -> bool {
        self.executing_chunk_id() == Some(chunk_id)
    }

    /// Chunk the engine has reported as started, if still queued.
    pub fn executing_chunk_id(&self) -> Option<&ChunkId> {
        let queue = self.active_queue()?;
        self.executing_chunk
            .as_ref()
            .filter(|id| queue.unit(id).is_some())
    }

    /// Exec mode a chunk was (or is being) run with; `Batch` if unknown.
    pub fn chunk_exec_mode(&self, chunk_id: &ChunkId) -> ExecMode {
        let Some(queue) = self.queue.as_ref() else {
            return ExecMode::Batch;
        };
        queue
            .unit(chunk_id)
            .or_else(|| queue.completed_unit(chunk_id))
            .map(|u| u.exec_mode)
            .unwrap_or_default()
    }

    /// Run one chunk, or part of one.
    ///
    /// While a queue is executing the request is appended behind it: a chunk
    /// not yet queued becomes a new unit, and a sub-range of a queued chunk
    /// becomes an extra pending range unless an existing one already covers
    /// it. Otherwise the chunk becomes the only member of a new queue.
    pub fn execute_chunk(&mut self, exec_unit: ExecUnit) {
        if !self.is_executing() {
            let mut queue = self.new_queue(self.config.chunk_job_desc.clone());
            queue.add_unit(exec_unit.into_queue_unit(self.doc_id.clone()));
            self.start_queue(queue);
            return;
        }

        let chunk_id = exec_unit.chunk_id().clone();
        let doc_id = self.doc_id.clone();
        let Some(queue) = self.active_queue_mut() else {
            return;
        };
        let job_desc = queue.job_desc.clone();

        match queue.unit_mut(&chunk_id) {
            None => {
                let unit = exec_unit.into_queue_unit(doc_id);
                queue.add_unit(unit.clone());
                tracing::debug!(doc = %self.doc_id, chunk = %chunk_id, "queued behind running chunks");

                self.render_unit(&unit);
                let done = self.rpc_callback(&job_desc, "add chunk to the execution queue");
                self.collab
                    .engine
                    .update_queue_unit(unit, QueueOp::Add, None, done);
            }
            Some(unit) => {
                if exec_unit.range.is_none() {
                    tracing::debug!(chunk = %chunk_id, "chunk already queued");
                    return;
                }
                let range = exec_unit.exec_range();
                if unit.has_pending_range(&range) {
                    tracing::debug!(chunk = %chunk_id, ?range, "range already pending");
                    return;
                }
                unit.add_pending_range(range);
                let lines = unit.lines_from_ranges(&[range]);
                let unit = unit.clone();

                self.render_lines(&chunk_id, &lines, LineState::Queued);
                let done = self.rpc_callback(&job_desc, "update the execution queue");
                self.collab
                    .engine
                    .update_queue_unit(unit, QueueOp::Update, None, done);
            }
        }
    }

    /// Run a whole chunk looked up by id.
    ///
    /// Fails with [`Error::ChunkNotFound`] if the editor has no such chunk.
    pub fn execute_chunk_id(&mut self, chunk_id: &ChunkId, exec_mode: ExecMode) -> Result<()> {
        let scope = self
            .collab
            .editor
            .chunk_scope(chunk_id)
            .ok_or_else(|| Error::ChunkNotFound(chunk_id.clone()))?;
        self.execute_chunk(ExecUnit::whole_chunk(scope, exec_mode));
        Ok(())
    }

    /// Run a batch of chunks as one freshly built queue.
    ///
    /// The batch is submitted to the engine in a single call. Only one queue
    /// may be active per document; while one is running, use
    /// [`execute_chunk`](Self::execute_chunk) to append to it.
    pub fn execute_chunks(
        &mut self,
        job_desc: impl Into<String>,
        exec_units: Vec<ExecUnit>,
    ) -> Result<()> {
        if self.is_executing() {
            return Err(Error::ExecutionInProgress);
        }
        if exec_units.is_empty() {
            tracing::debug!(doc = %self.doc_id, "nothing to execute");
            return Ok(());
        }

        let mut queue = self.new_queue(job_desc.into());
        for exec_unit in exec_units {
            queue.add_unit(exec_unit.into_queue_unit(self.doc_id.clone()));
        }
        self.start_queue(queue);
        Ok(())
    }

    /// Remove the chunk at `row` from the active queue.
    ///
    /// Does nothing if the row has no chunk or the chunk is not queued.
    pub fn dequeue_chunk(&mut self, row: usize) {
        let Some(chunk_id) = self.collab.editor.chunk_id_at_row(row) else {
            return;
        };
        let Some(queue) = self.active_queue_mut() else {
            return;
        };
        let Some(unit) = queue.remove_unit(&chunk_id) else {
            return;
        };
        let complete = queue.is_complete();
        let job_desc = queue.job_desc.clone();

        if self.executing_chunk.as_ref() == Some(&chunk_id) {
            self.executing_chunk = None;
        }
        self.clean_chunk(&chunk_id);

        let done = self.rpc_callback(&job_desc, "remove chunk from the execution queue");
        self.collab
            .engine
            .update_queue_unit(unit, QueueOp::Delete, None, done);

        // No engine event is guaranteed for a deleted unit.
        if complete {
            self.end_execution(false);
        }
    }

    /// Drop the whole active queue locally.
    ///
    /// Clears rendered state for every queued unit and ends the execution
    /// lifecycle. The engine is not notified per unit.
    pub fn clear(&mut self) {
        let units = self
            .queue
            .as_mut()
            .map(DocQueue::take_units)
            .unwrap_or_default();

        for unit in &units {
            self.clean_chunk(&unit.chunk_id);
        }
        self.end_execution(true);
    }

    /// Adopt a queue the engine is still running, e.g. after the document
    /// was reopened.
    pub fn restore(&mut self, queue: DocQueue) {
        if queue.doc_id != self.doc_id {
            tracing::warn!(
                doc = %self.doc_id,
                "ignoring queue snapshot for document {}",
                queue.doc_id
            );
            return;
        }
        if queue.is_complete() {
            return;
        }

        let job_desc = queue.job_desc.clone();
        let percent = queue.progress_percent();
        self.queue = Some(queue);
        self.executing_chunk = None;

        self.begin_execution(&job_desc);
        self.collab.status.update_progress(percent);
        self.render_queue_state();
    }

    /// Re-render gutter and toolbar state for every unit in the active queue.
    pub fn render_queue_state(&self) {
        let Some(queue) = self.active_queue() else {
            return;
        };
        for unit in queue.units() {
            self.render_unit(unit);
        }
    }

    /// Reconcile an engine event with the local queue.
    ///
    /// Events for other documents, or arriving when no queue exists, are
    /// stale and ignored.
    pub fn handle_event(&mut self, event: &EngineEvent) {
        if event.doc_id() != &self.doc_id {
            tracing::debug!(doc = %self.doc_id, "ignoring event for {}", event.doc_id());
            return;
        }
        match self.queue.as_ref() {
            Some(queue) if queue.doc_id == self.doc_id => {}
            _ => {
                tracing::debug!(doc = %self.doc_id, "ignoring event without a queue");
                return;
            }
        }

        match event {
            EngineEvent::RangeExecuted {
                chunk_id,
                range,
                expr_mode,
                code,
                ..
            } => self.on_range_executed(chunk_id, *range, *expr_mode, code),
            EngineEvent::ChunkStateChanged {
                chunk_id,
                state,
                options,
                ..
            } => match state {
                ChunkExecState::Started => self.on_chunk_started(chunk_id, options.as_ref()),
                ChunkExecState::Finished => self.on_chunk_finished(chunk_id),
                ChunkExecState::Cancelled => self.on_chunk_cancelled(chunk_id),
            },
        }
    }

    fn on_range_executed(
        &mut self,
        chunk_id: &ChunkId,
        range: ExecRange,
        expr_mode: ExprMode,
        code: &str,
    ) {
        if self.current_chunk_id().as_ref() != Some(chunk_id) {
            tracing::debug!(chunk = %chunk_id, "ignoring range for a chunk that is not running");
            return;
        }
        let Some(unit) = self.queue.as_mut().and_then(|q| q.unit_mut(chunk_id)) else {
            return;
        };

        match expr_mode {
            ExprMode::New => unit.set_executing_range(range),
            ExprMode::Continuation => unit.extend_executing_range(range),
        }
        unit.add_completed_range(range);
        let lines = unit.lines_from_ranges(&[range]);

        self.executing_chunk = Some(chunk_id.clone());
        self.render_lines(chunk_id, &lines, LineState::Executed);
        if self.config.record_history {
            self.collab.history.append(code);
        }
    }

    fn on_chunk_started(&mut self, chunk_id: &ChunkId, options: Option<&serde_json::Value>) {
        if !self.is_chunk_queued(chunk_id) {
            tracing::debug!(chunk = %chunk_id, "ignoring start of a chunk that is not queued");
            return;
        }
        self.executing_chunk = Some(chunk_id.clone());

        if let Some(scope) = self.collab.editor.chunk_scope(chunk_id) {
            self.collab.editor.unfold(&scope);
        }
        if let Some(options) = options {
            self.collab.renderer.apply_chunk_options(chunk_id, options);
        }
        self.collab.renderer.clear_error(chunk_id);
        self.collab
            .renderer
            .set_chunk_state(chunk_id, ChunkState::Executing);
    }

    fn on_chunk_finished(&mut self, chunk_id: &ChunkId) {
        if self.current_chunk_id().as_ref() != Some(chunk_id) {
            tracing::debug!(chunk = %chunk_id, "ignoring finish of a chunk that is not running");
            return;
        }
        let Some(queue) = self.queue.as_mut() else {
            return;
        };
        let Some(unit) = queue.remove_unit(chunk_id) else {
            return;
        };
        queue.add_completed_unit(unit);
        let complete = queue.is_complete();
        let percent = queue.progress_percent();

        self.executing_chunk = None;
        self.collab
            .renderer
            .set_chunk_state(chunk_id, ChunkState::Resting);

        if complete {
            self.end_execution(false);
        } else {
            self.collab.status.update_progress(percent);
        }
    }

    fn on_chunk_cancelled(&mut self, chunk_id: &ChunkId) {
        let Some(queue) = self.queue.as_mut() else {
            return;
        };
        if queue.remove_unit(chunk_id).is_none() {
            tracing::debug!(chunk = %chunk_id, "cancelled chunk already gone");
            return;
        }
        let complete = queue.is_complete();

        if self.executing_chunk.as_ref() == Some(chunk_id) {
            self.executing_chunk = None;
        }
        self.clean_chunk(chunk_id);

        if complete {
            self.end_execution(false);
        }
    }

    fn active_queue(&self) -> Option<&DocQueue> {
        self.queue.as_ref().filter(|q| !q.is_complete())
    }

    fn active_queue_mut(&mut self) -> Option<&mut DocQueue> {
        self.queue.as_mut().filter(|q| !q.is_complete())
    }

    /// The unit treated as running: the started one, else the queue head.
    fn current_chunk_id(&self) -> Option<ChunkId> {
        let queue = self.active_queue()?;
        self.executing_chunk
            .clone()
            .filter(|id| queue.unit(id).is_some())
            .or_else(|| queue.head().map(|u| u.chunk_id.clone()))
    }

    fn new_queue(&self, job_desc: String) -> DocQueue {
        DocQueue::new(
            self.doc_id.clone(),
            job_desc,
            self.config.working_dir.clone(),
            self.config.commit_mode,
            self.collab.editor.pixel_width(),
            self.collab.editor.char_width(),
        )
    }

    fn start_queue(&mut self, queue: DocQueue) {
        let job_desc = queue.job_desc.clone();
        let submitted = queue.clone();
        self.queue = Some(queue);
        self.executing_chunk = None;

        self.begin_execution(&job_desc);
        self.render_queue_state();

        let done = self.rpc_callback(&job_desc, "execute chunks");
        self.collab.engine.execute_queue(submitted, done);
    }

    fn begin_execution(&mut self, job_desc: &str) {
        if self.lease.is_none() {
            tracing::info!(doc = %self.doc_id, job = job_desc, "queue execution started");
            self.lease = Some(self.tracker.begin());
        }
        self.collab.status.show_progress(job_desc);
    }

    fn end_execution(&mut self, hide_immediately: bool) {
        self.executing_chunk = None;
        if let Some(lease) = self.lease.take() {
            drop(lease);
            tracing::info!(doc = %self.doc_id, "queue execution ended");
            self.collab.status.hide_progress(hide_immediately);
        }
    }

    fn render_unit(&self, unit: &QueueUnit) {
        self.render_lines(&unit.chunk_id, &unit.completed_lines(), LineState::Executed);
        self.render_lines(&unit.chunk_id, &unit.pending_lines(), LineState::Queued);

        let state = if self.executing_chunk.as_ref() == Some(&unit.chunk_id) {
            ChunkState::Executing
        } else {
            ChunkState::Queued
        };
        self.collab.renderer.set_chunk_state(&unit.chunk_id, state);
    }

    /// Mark unit-relative `lines` of a chunk, grouped into contiguous runs.
    fn render_lines(&self, chunk_id: &ChunkId, lines: &[usize], state: LineState) {
        if lines.is_empty() {
            return;
        }
        let Some(scope) = self.collab.editor.chunk_scope(chunk_id) else {
            return;
        };
        for run in contiguous_runs(lines) {
            let rows = scope.body_start_row + run.start()..=scope.body_start_row + run.end();
            self.collab.renderer.set_line_state(chunk_id, rows, state);
        }
    }

    fn clean_chunk(&self, chunk_id: &ChunkId) {
        if let Some(scope) = self.collab.editor.chunk_scope(chunk_id) {
            self.collab.renderer.set_line_state(
                chunk_id,
                scope.body_start_row..=scope.body_end_row(),
                LineState::Resting,
            );
        }
        self.collab
            .renderer
            .set_chunk_state(chunk_id, ChunkState::Resting);
    }

    fn rpc_callback(&self, job_desc: &str, action: &'static str) -> RpcCallback {
        let status = Arc::clone(&self.collab.status);
        let caption = job_desc.to_string();
        Box::new(move |result| {
            if let Err(e) = result {
                tracing::warn!(job = %caption, "failed to {}: {}", action, e);
                status.show_error(&caption, &format!("Couldn't {action}: {e}"));
            }
        })
    }
}

/// Group ascending line numbers into inclusive runs of consecutive lines.
fn contiguous_runs(lines: &[usize]) -> Vec<RangeInclusive<usize>> {
    let mut runs = Vec::new();
    let mut iter = lines.iter().copied();
    let Some(first) = iter.next() else {
        return runs;
    };

    let (mut start, mut end) = (first, first);
    for line in iter {
        if line == end + 1 {
            end = line;
        } else {
            runs.push(start..=end);
            start = line;
            end = line;
        }
    }
    runs.push(start..=end);
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::collab::{
        ChunkRenderer, CommandHistory, ExecutionEngine, NotebookEditor, StatusReporter,
    };
    use crate::error::RpcError;
    use crate::exec_unit::{ChunkScope, Position, Span};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Execute(usize),
        Update(String, QueueOp),
        Lines(String, RangeInclusive<usize>, LineState),
        Chunk(String, ChunkState),
        Progress(u32),
        Hide(bool),
        Error(String),
    }

    /// Records every collaborator call; the engine can be told to fail.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<Call>>,
        chunks: Vec<ChunkScope>,
        fail_rpc: bool,
    }

    impl Recorder {
        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn reply(&self, done: RpcCallback) {
            if self.fail_rpc {
                done(Err(RpcError::Disconnected));
            } else {
                done(Ok(()));
            }
        }
    }

    impl ExecutionEngine for Recorder {
        fn execute_queue(&self, queue: DocQueue, done: RpcCallback) {
            self.record(Call::Execute(queue.units().len()));
            self.reply(done);
        }

        fn update_queue_unit(
            &self,
            unit: QueueUnit,
            op: QueueOp,
            _before: Option<ChunkId>,
            done: RpcCallback,
        ) {
            self.record(Call::Update(unit.chunk_id.to_string(), op));
            self.reply(done);
        }
    }

    impl NotebookEditor for Recorder {
        fn chunk_id_at_row(&self, row: usize) -> Option<ChunkId> {
            self.chunks
                .iter()
                .find(|c| c.contains_row(row))
                .map(|c| c.chunk_id.clone())
        }

        fn chunk_scope(&self, chunk_id: &ChunkId) -> Option<ChunkScope> {
            self.chunks.iter().find(|c| &c.chunk_id == chunk_id).cloned()
        }

        fn unfold(&self, _scope: &ChunkScope) {}

        fn pixel_width(&self) -> u32 {
            640
        }

        fn char_width(&self) -> u32 {
            8
        }
    }

    impl ChunkRenderer for Recorder {
        fn set_line_state(&self, chunk_id: &ChunkId, rows: RangeInclusive<usize>, state: LineState) {
            self.record(Call::Lines(chunk_id.to_string(), rows, state));
        }

        fn set_chunk_state(&self, chunk_id: &ChunkId, state: ChunkState) {
            self.record(Call::Chunk(chunk_id.to_string(), state));
        }

        fn clear_error(&self, _chunk_id: &ChunkId) {}
    }

    impl StatusReporter for Recorder {
        fn show_progress(&self, _job_desc: &str) {}

        fn update_progress(&self, percent: u32) {
            self.record(Call::Progress(percent));
        }

        fn hide_progress(&self, immediate: bool) {
            self.record(Call::Hide(immediate));
        }

        fn show_error(&self, caption: &str, _message: &str) {
            self.record(Call::Error(caption.to_string()));
        }
    }

    impl CommandHistory for Recorder {
        fn append(&self, _code: &str) {}
    }

    fn setup(fail_rpc: bool) -> (QueueState, Arc<Recorder>, ExecutionTracker) {
        let recorder = Arc::new(Recorder {
            calls: Mutex::new(Vec::new()),
            chunks: vec![
                ChunkScope::new(ChunkId::new("c1"), 1, "a<-1\nb<-2\n"),
                ChunkScope::new(ChunkId::new("c2"), 5, "c<-3\nd<-4\n"),
            ],
            fail_rpc,
        });
        let collab = Collaborators {
            engine: recorder.clone(),
            editor: recorder.clone(),
            renderer: recorder.clone(),
            status: recorder.clone(),
            history: recorder.clone(),
        };
        let tracker = ExecutionTracker::new();
        let state = QueueState::new(
            DocId::new("doc"),
            QueueConfig::default(),
            collab,
            tracker.clone(),
        );
        (state, recorder, tracker)
    }

    fn whole(recorder: &Recorder, chunk: &str) -> ExecUnit {
        let scope = recorder.chunk_scope(&ChunkId::new(chunk)).unwrap();
        ExecUnit::whole_chunk(scope, ExecMode::Batch)
    }

    #[test]
    fn test_contiguous_runs() {
        assert!(contiguous_runs(&[]).is_empty());
        assert_eq!(contiguous_runs(&[3]), vec![3..=3]);
        assert_eq!(contiguous_runs(&[0, 1, 2, 5, 6, 9]), vec![0..=2, 5..=6, 9..=9]);
    }

    #[test]
    fn test_execute_chunk_starts_new_queue() {
        let (mut state, recorder, tracker) = setup(false);
        state.execute_chunk(whole(&recorder, "c1"));

        assert!(state.is_executing());
        assert!(tracker.any_executing());
        assert_eq!(state.queue().unwrap().job_desc, "Run Chunk");
        assert_eq!(state.queue().unwrap().pixel_width, 640);

        let calls = recorder.calls();
        assert!(calls.contains(&Call::Lines("c1".into(), 1..=2, LineState::Queued)));
        assert!(calls.contains(&Call::Chunk("c1".into(), ChunkState::Queued)));
        assert_eq!(calls.last(), Some(&Call::Execute(1)));
    }

    #[test]
    fn test_execute_chunk_appends_while_running() {
        let (mut state, recorder, tracker) = setup(false);
        state.execute_chunk(whole(&recorder, "c1"));
        state.execute_chunk(whole(&recorder, "c2"));

        assert_eq!(tracker.active_count(), 1);
        assert_eq!(state.queue().unwrap().units().len(), 2);
        assert!(recorder.calls().contains(&Call::Update("c2".into(), QueueOp::Add)));
    }

    #[test]
    fn test_partial_range_on_queued_chunk_sends_update() {
        let (mut state, recorder, _) = setup(false);
        state.execute_chunk(whole(&recorder, "c1"));

        // c1 is queued with [0, 9); its first line is already covered
        let scope = recorder.chunk_scope(&ChunkId::new("c1")).unwrap();
        let span = scope.row_span(1).unwrap();
        state.execute_chunk(ExecUnit::partial(scope, span, ExecMode::Batch));
        assert!(
            !recorder
                .calls()
                .iter()
                .any(|c| matches!(c, Call::Update(_, QueueOp::Update)))
        );

        // c2 joins with its first line only, then its second line is requested
        let scope = recorder.chunk_scope(&ChunkId::new("c2")).unwrap();
        let first = scope.row_span(5).unwrap();
        state.execute_chunk(ExecUnit::partial(scope.clone(), first, ExecMode::Batch));
        assert!(recorder.calls().contains(&Call::Update("c2".into(), QueueOp::Add)));

        let second = Span::new(Position::new(6, 0), Position::new(6, 4));
        state.execute_chunk(ExecUnit::partial(scope, second, ExecMode::Batch));
        let calls = recorder.calls();
        assert!(calls.contains(&Call::Update("c2".into(), QueueOp::Update)));
        assert!(calls.contains(&Call::Lines("c2".into(), 6..=6, LineState::Queued)));

        let unit = state.queue().unwrap().unit(&ChunkId::new("c2")).unwrap();
        assert_eq!(unit.pending(), &[ExecRange::new(0, 4), ExecRange::new(5, 9)]);
    }

    #[test]
    fn test_execute_chunks_rejected_while_running() {
        let (mut state, recorder, _) = setup(false);
        state.execute_chunk(whole(&recorder, "c1"));
        let result = state.execute_chunks("Run All", vec![whole(&recorder, "c2")]);
        assert!(matches!(result, Err(Error::ExecutionInProgress)));
        assert_eq!(state.queue().unwrap().units().len(), 1);
    }

    #[test]
    fn test_execute_chunks_empty_is_noop() {
        let (mut state, recorder, tracker) = setup(false);
        state.execute_chunks("Run All", Vec::new()).unwrap();
        assert!(!state.is_executing());
        assert!(!tracker.any_executing());
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_rpc_failure_reports_error_and_keeps_queue() {
        let (mut state, recorder, _) = setup(true);
        state
            .execute_chunks("Run All", vec![whole(&recorder, "c1"), whole(&recorder, "c2")])
            .unwrap();

        assert!(recorder.calls().contains(&Call::Error("Run All".into())));
        assert!(state.is_executing());
        assert_eq!(state.queue().unwrap().units().len(), 2);
    }

    #[test]
    fn test_dequeue_last_unit_ends_execution() {
        let (mut state, recorder, tracker) = setup(false);
        state.execute_chunk(whole(&recorder, "c1"));
        state.dequeue_chunk(2);

        assert!(!state.is_executing());
        assert!(!tracker.any_executing());
        let calls = recorder.calls();
        assert!(calls.contains(&Call::Update("c1".into(), QueueOp::Delete)));
        assert!(calls.contains(&Call::Lines("c1".into(), 1..=2, LineState::Resting)));
        assert_eq!(calls.last(), Some(&Call::Hide(false)));
    }

    #[test]
    fn test_dequeue_unknown_row_is_noop() {
        let (mut state, recorder, _) = setup(false);
        state.execute_chunk(whole(&recorder, "c1"));
        let before = recorder.calls().len();
        state.dequeue_chunk(40);
        state.dequeue_chunk(5);
        assert_eq!(recorder.calls().len(), before);
        assert!(state.is_chunk_queued(&ChunkId::new("c1")));
    }

    #[test]
    fn test_clear_ends_once() {
        let (mut state, recorder, tracker) = setup(false);
        state
            .execute_chunks("Run All", vec![whole(&recorder, "c1"), whole(&recorder, "c2")])
            .unwrap();
        state.clear();
        state.clear();

        assert!(!state.is_executing());
        assert_eq!(tracker.active_count(), 0);
        let hides = recorder
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Hide(_)))
            .count();
        assert_eq!(hides, 1);
        assert!(recorder.calls().contains(&Call::Hide(true)));
        assert!(
            !recorder
                .calls()
                .iter()
                .any(|c| matches!(c, Call::Update(_, QueueOp::Delete)))
        );
    }

    #[test]
    fn test_started_tracks_executing_chunk() {
        let (mut state, recorder, _) = setup(false);
        state
            .execute_chunks("Run All", vec![whole(&recorder, "c1"), whole(&recorder, "c2")])
            .unwrap();
        assert!(state.executing_chunk_id().is_none());

        state.handle_event(&EngineEvent::state(
            DocId::new("doc"),
            ChunkId::new("c1"),
            ChunkExecState::Started,
        ));
        assert!(state.is_chunk_executing(&ChunkId::new("c1")));
        assert!(recorder.calls().contains(&Call::Chunk("c1".into(), ChunkState::Executing)));
    }

    #[test]
    fn test_event_for_other_document_is_ignored() {
        let (mut state, recorder, _) = setup(false);
        state.execute_chunk(whole(&recorder, "c1"));
        state.handle_event(&EngineEvent::state(
            DocId::new("other"),
            ChunkId::new("c1"),
            ChunkExecState::Finished,
        ));
        assert!(state.is_chunk_queued(&ChunkId::new("c1")));
    }

    #[test]
    fn test_chunk_exec_mode_lookup() {
        let (mut state, recorder, _) = setup(false);
        assert_eq!(state.chunk_exec_mode(&ChunkId::new("c1")), ExecMode::Batch);

        let scope = recorder.chunk_scope(&ChunkId::new("c1")).unwrap();
        state.execute_chunk(ExecUnit::whole_chunk(scope, ExecMode::Single));
        assert_eq!(state.chunk_exec_mode(&ChunkId::new("c1")), ExecMode::Single);

        state.handle_event(&EngineEvent::state(
            DocId::new("doc"),
            ChunkId::new("c1"),
            ChunkExecState::Finished,
        ));
        assert!(!state.is_executing());
        // answered from the completed log
        assert_eq!(state.chunk_exec_mode(&ChunkId::new("c1")), ExecMode::Single);
    }

    #[test]
    fn test_restore_adopts_running_queue() {
        let (mut state, recorder, tracker) = setup(false);
        let mut queue = DocQueue::new(
            DocId::new("doc"),
            "Run All",
            None,
            Default::default(),
            640,
            8,
        );
        queue.add_unit(whole(&recorder, "c1").into_queue_unit(DocId::new("doc")));
        queue.add_unit(whole(&recorder, "c2").into_queue_unit(DocId::new("doc")));
        queue.remove_unit(&ChunkId::new("c1"));

        state.restore(queue);
        assert!(state.is_executing());
        assert!(tracker.any_executing());
        let calls = recorder.calls();
        assert!(calls.contains(&Call::Progress(50)));
        assert!(calls.contains(&Call::Lines("c2".into(), 5..=6, LineState::Queued)));
        assert!(!calls.iter().any(|c| matches!(c, Call::Execute(_))));
    }

    #[test]
    fn test_restore_ignores_foreign_or_complete_queue() {
        let (mut state, _recorder, tracker) = setup(false);
        let foreign = DocQueue::new(DocId::new("other"), "Run All", None, Default::default(), 0, 0);
        state.restore(foreign);
        let empty = DocQueue::new(DocId::new("doc"), "Run All", None, Default::default(), 0, 0);
        state.restore(empty);
        assert!(!state.is_executing());
        assert!(!tracker.any_executing());
    }
}
