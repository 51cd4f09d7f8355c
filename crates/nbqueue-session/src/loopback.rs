//! In-process execution engine.
//!
//! Mirrors the engine side of the queue protocol without evaluating any
//! code: each document's units run strictly one after another, emitting
//! `Started`, one `RangeExecuted` per statement (single mode) or per pending
//! range (batch mode), then `Finished`.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use nbqueue_core::{
    ChunkExecState, ChunkId, DocId, EngineEvent, ExecMode, ExecRange, ExprMode, QueueOp,
    QueueUnit,
};

use crate::engine::EngineCall;
use crate::protocol::EngineRequest;

/// Loopback engine settings.
#[derive(Debug, Clone, Default)]
pub struct LoopbackConfig {
    /// Pause before each emitted event.
    pub step_delay: Duration,
}

/// One statement or range the engine will report as executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Step {
    range: ExecRange,
    expr_mode: ExprMode,
}

/// Engine-side mirror of one document's queue.
#[derive(Debug)]
struct EngineQueue {
    doc_id: DocId,
    units: VecDeque<QueueUnit>,
    /// Whether `units[0]` has been reported as started.
    started: bool,
    /// Steps left for the head unit.
    steps: VecDeque<Step>,
    /// Pending ranges of the head unit already turned into steps.
    planned: usize,
}

impl EngineQueue {
    fn new(doc_id: DocId) -> Self {
        Self {
            doc_id,
            units: VecDeque::new(),
            started: false,
            steps: VecDeque::new(),
            planned: 0,
        }
    }

    fn position(&self, chunk_id: &ChunkId) -> Option<usize> {
        self.units.iter().position(|u| &u.chunk_id == chunk_id)
    }

    fn reset_head(&mut self) {
        self.started = false;
        self.steps.clear();
        self.planned = 0;
    }

    /// Turn pending ranges of the head unit not yet planned into steps.
    fn plan_head(&mut self) {
        let Some(head) = self.units.front() else {
            return;
        };
        // A replacement unit may carry fewer ranges than were already planned.
        let unplanned = head.pending().get(self.planned..).unwrap_or_default();
        for range in unplanned {
            match head.exec_mode {
                ExecMode::Batch => self.steps.push_back(Step {
                    range: *range,
                    expr_mode: ExprMode::New,
                }),
                ExecMode::Single => self.steps.extend(statements(head.code(), *range)),
            }
        }
        self.planned = head.pending().len();
    }
}

/// Split a range into one step per non-blank line, line breaks excluded.
///
/// Indented lines continue the previous expression.
fn statements(code: &str, range: ExecRange) -> Vec<Step> {
    let mut steps = Vec::new();
    let mut line_start = range.start;
    let mut blank = true;
    let mut indented = false;

    let chars: Vec<char> = code.chars().collect();
    let stop = range.stop.min(chars.len());

    for offset in range.start..stop {
        let ch = chars[offset];
        if offset == line_start {
            indented = ch == ' ' || ch == '\t';
        }
        if !ch.is_whitespace() {
            blank = false;
        }
        if ch == '\n' || offset + 1 == stop {
            if !blank {
                let expr_mode = if indented && !steps.is_empty() {
                    ExprMode::Continuation
                } else {
                    ExprMode::New
                };
                let end = if ch == '\n' { offset } else { offset + 1 };
                steps.push(Step {
                    range: ExecRange::new(line_start, end),
                    expr_mode,
                });
            }
            line_start = offset + 1;
            blank = true;
        }
    }
    steps
}

/// Characters of `code` covered by `range`.
fn slice(code: &str, range: ExecRange) -> String {
    code.chars().skip(range.start).take(range.len()).collect()
}

/// Engine state, advanced one event at a time.
#[derive(Debug, Default)]
pub struct LoopbackEngine {
    queues: Vec<EngineQueue>,
    /// Events produced by requests, delivered before further execution.
    outbox: VecDeque<EngineEvent>,
}

impl LoopbackEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nothing queued and nothing left to report.
    pub fn is_idle(&self) -> bool {
        self.outbox.is_empty() && self.queues.iter().all(|q| q.units.is_empty())
    }

    /// Chunk ids queued for a document, head first.
    pub fn queued(&self, doc_id: &DocId) -> Vec<ChunkId> {
        self.queue(doc_id)
            .map(|q| q.units.iter().map(|u| u.chunk_id.clone()).collect())
            .unwrap_or_default()
    }

    fn queue(&self, doc_id: &DocId) -> Option<&EngineQueue> {
        self.queues.iter().find(|q| &q.doc_id == doc_id)
    }

    fn queue_mut(&mut self, doc_id: &DocId) -> &mut EngineQueue {
        let idx = match self.queues.iter().position(|q| &q.doc_id == doc_id) {
            Some(idx) => idx,
            None => {
                self.queues.push(EngineQueue::new(doc_id.clone()));
                self.queues.len() - 1
            }
        };
        &mut self.queues[idx]
    }

    /// Apply a scheduler request.
    pub fn apply(&mut self, request: EngineRequest) {
        match request {
            EngineRequest::ExecuteQueue { queue } => {
                let doc_id = queue.doc_id.clone();
                tracing::debug!(doc = %doc_id, units = queue.units().len(), "loopback queue submitted");
                let target = self.queue_mut(&doc_id);
                let interrupted = target
                    .units
                    .front()
                    .filter(|_| target.started)
                    .map(|head| head.chunk_id.clone());
                target.units = queue.units().iter().cloned().collect();
                target.reset_head();
                if let Some(chunk_id) = interrupted {
                    self.outbox
                        .push_back(EngineEvent::state(doc_id, chunk_id, ChunkExecState::Cancelled));
                }
            }
            EngineRequest::UpdateUnit { unit, op, before } => self.update(unit, op, before),
        }
    }

    fn update(&mut self, unit: QueueUnit, op: QueueOp, before: Option<ChunkId>) {
        let doc_id = unit.doc_id.clone();
        let chunk_id = unit.chunk_id.clone();
        let queue = self.queue_mut(&doc_id);

        match op {
            QueueOp::Add => {
                if let Some(idx) = queue.position(&chunk_id) {
                    queue.units[idx] = unit;
                    return;
                }
                let idx = before
                    .as_ref()
                    .and_then(|b| queue.position(b))
                    .filter(|&idx| idx > 0 || !queue.started)
                    .unwrap_or(queue.units.len());
                if idx == 0 {
                    queue.reset_head();
                }
                queue.units.insert(idx, unit);
            }
            QueueOp::Update => match queue.position(&chunk_id) {
                Some(0) => {
                    queue.units[0] = unit;
                    if queue.started {
                        queue.plan_head();
                    }
                }
                Some(idx) => queue.units[idx] = unit,
                None => tracing::debug!(chunk = %chunk_id, "update for unknown unit"),
            },
            QueueOp::Delete => {
                let Some(idx) = queue.position(&chunk_id) else {
                    return;
                };
                queue.units.remove(idx);
                if idx == 0 {
                    let was_started = queue.started;
                    queue.reset_head();
                    if was_started {
                        self.outbox.push_back(EngineEvent::state(
                            doc_id,
                            chunk_id,
                            ChunkExecState::Cancelled,
                        ));
                    }
                }
            }
        }
    }

    /// Produce the next event, if any work remains.
    pub fn step(&mut self) -> Option<EngineEvent> {
        if let Some(event) = self.outbox.pop_front() {
            return Some(event);
        }

        let queue = self.queues.iter_mut().find(|q| !q.units.is_empty())?;
        let doc_id = queue.doc_id.clone();
        let head = queue.units.front()?;
        let chunk_id = head.chunk_id.clone();

        if !queue.started {
            queue.started = true;
            queue.plan_head();
            return Some(EngineEvent::state(doc_id, chunk_id, ChunkExecState::Started));
        }

        if let Some(step) = queue.steps.pop_front() {
            let code = queue.units.front().map(|u| slice(u.code(), step.range))?;
            return Some(EngineEvent::RangeExecuted {
                doc_id,
                chunk_id,
                range: step.range,
                expr_mode: step.expr_mode,
                code,
            });
        }

        queue.units.pop_front();
        queue.reset_head();
        Some(EngineEvent::state(doc_id, chunk_id, ChunkExecState::Finished))
    }
}

/// Spawn the loopback engine on the current tokio runtime.
///
/// The task applies incoming calls (acknowledging each) and emits events
/// until the call channel closes and all work is done, or the event
/// receiver is dropped.
pub fn spawn(
    config: LoopbackConfig,
    calls: mpsc::UnboundedReceiver<EngineCall>,
    events: mpsc::UnboundedSender<EngineEvent>,
) -> JoinHandle<()> {
    tokio::spawn(run(LoopbackEngine::new(), config, calls, events))
}

pub async fn run(
    mut engine: LoopbackEngine,
    config: LoopbackConfig,
    mut calls: mpsc::UnboundedReceiver<EngineCall>,
    events: mpsc::UnboundedSender<EngineEvent>,
) {
    loop {
        if engine.is_idle() {
            match calls.recv().await {
                Some(call) => accept(&mut engine, call),
                None => break,
            }
            continue;
        }

        while let Ok(call) = calls.try_recv() {
            accept(&mut engine, call);
        }

        if !config.step_delay.is_zero() {
            tokio::time::sleep(config.step_delay).await;
        }

        if let Some(event) = engine.step()
            && events.send(event).is_err()
        {
            tracing::debug!("event receiver dropped, stopping loopback engine");
            break;
        }
    }
}

fn accept(engine: &mut LoopbackEngine, call: EngineCall) {
    let EngineCall { request, reply } = call;
    engine.apply(request);
    reply(Ok(()));
}
