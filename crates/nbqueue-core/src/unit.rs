//! Per-chunk execution record.

use serde::{Deserialize, Serialize};

use crate::range::ExecRange;
use crate::types::{ChunkId, DocId, ExecMode, ExecScope};

/// One chunk's execution request and progress.
///
/// Identity is `(doc_id, chunk_id)`. The code is captured when the unit is
/// enqueued and never changes afterwards, so every range in the unit indexes
/// into the same text even if the editor buffer has since been edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueUnit {
    pub doc_id: DocId,
    pub chunk_id: ChunkId,
    pub exec_mode: ExecMode,
    pub exec_scope: ExecScope,
    code: String,
    /// Ranges not yet started, in FIFO order.
    pending: Vec<ExecRange>,
    /// Ranges that finished, in the order the engine reported them.
    completed: Vec<ExecRange>,
    /// Region currently running. Grows statement by statement in single mode.
    executing: Option<ExecRange>,
}

impl QueueUnit {
    pub fn new(
        doc_id: DocId,
        chunk_id: ChunkId,
        exec_mode: ExecMode,
        exec_scope: ExecScope,
        code: impl Into<String>,
    ) -> Self {
        Self {
            doc_id,
            chunk_id,
            exec_mode,
            exec_scope,
            code: code.into(),
            pending: Vec::new(),
            completed: Vec::new(),
            executing: None,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn pending(&self) -> &[ExecRange] {
        &self.pending
    }

    pub fn completed(&self) -> &[ExecRange] {
        &self.completed
    }

    pub fn executing(&self) -> Option<ExecRange> {
        self.executing
    }

    pub fn add_pending_range(&mut self, range: ExecRange) {
        self.pending.push(range);
    }

    pub fn add_completed_range(&mut self, range: ExecRange) {
        self.completed.push(range);
    }

    pub fn set_executing_range(&mut self, range: ExecRange) {
        self.executing = Some(range);
    }

    /// Grow the executing region to include `range`, or start it if none is set.
    pub fn extend_executing_range(&mut self, range: ExecRange) {
        match self.executing.as_mut() {
            Some(executing) => executing.extend_to(&range),
            None => self.set_executing_range(range),
        }
    }

    /// Whether an existing pending range already covers `candidate`.
    pub fn has_pending_range(&self, candidate: &ExecRange) -> bool {
        self.pending.iter().any(|p| p.covers(candidate))
    }

    /// Nothing is left to run or running.
    pub fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.executing.is_none()
    }

    /// Zero-based lines of the unit's code touched by any of `ranges`.
    ///
    /// A newline inside a range flags the line it closes, so a range that
    /// spans several lines yields every one of them, and a trailing newline
    /// never produces a line past the end of the code.
    pub fn lines_from_ranges(&self, ranges: &[ExecRange]) -> Vec<usize> {
        let mut lines: Vec<usize> = Vec::new();
        if ranges.is_empty() {
            return lines;
        }

        let in_range = |offset: usize| ranges.iter().any(|r| r.contains(offset));
        let mut line = 0;

        for (offset, ch) in self.code.chars().enumerate() {
            if ch == '\n' {
                line += 1;
                if in_range(offset) && lines.last() != Some(&(line - 1)) {
                    lines.push(line - 1);
                }
                continue;
            }
            if in_range(offset) && lines.last() != Some(&line) {
                lines.push(line);
            }
        }

        lines
    }

    pub fn pending_lines(&self) -> Vec<usize> {
        self.lines_from_ranges(&self.pending)
    }

    pub fn completed_lines(&self) -> Vec<usize> {
        self.lines_from_ranges(&self.completed)
    }

    pub fn executing_lines(&self) -> Vec<usize> {
        match self.executing {
            Some(range) => self.lines_from_ranges(&[range]),
            None => Vec::new(),
        }
    }
}
