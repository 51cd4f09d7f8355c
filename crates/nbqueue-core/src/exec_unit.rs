//! Execution requests raised by the editor layer.
//!
//! Editor coordinates (row/column) are translated here into the private
//! character-offset space of a [`QueueUnit`].

use serde::{Deserialize, Serialize};

use crate::range::ExecRange;
use crate::types::{ChunkId, DocId, ExecMode, ExecScope};
use crate::unit::QueueUnit;

/// Row/column position in the editor (both zero-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

impl Position {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

/// Editor-space span from `start` to `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// Snapshot of a chunk as the editor sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkScope {
    pub chunk_id: ChunkId,
    /// Editor row holding the first line of the chunk body.
    pub body_start_row: usize,
    /// Chunk body without its fences.
    pub body: String,
}

impl ChunkScope {
    pub fn new(chunk_id: ChunkId, body_start_row: usize, body: impl Into<String>) -> Self {
        Self {
            chunk_id,
            body_start_row,
            body: body.into(),
        }
    }

    /// Number of body lines (at least one, even for an empty body).
    pub fn line_count(&self) -> usize {
        self.body.lines().count().max(1)
    }

    pub fn body_end_row(&self) -> usize {
        self.body_start_row + self.line_count() - 1
    }

    /// Whether `row` lies within the chunk body.
    pub fn contains_row(&self, row: usize) -> bool {
        row >= self.body_start_row && row <= self.body_end_row()
    }

    /// Span covering the whole body.
    pub fn full_span(&self) -> Span {
        let last = self.body.lines().last().map(|l| l.chars().count()).unwrap_or(0);
        Span::new(
            Position::new(self.body_start_row, 0),
            Position::new(self.body_end_row(), last),
        )
    }

    /// Span covering a single body row, used for "run current line".
    pub fn row_span(&self, row: usize) -> Option<Span> {
        if !self.contains_row(row) {
            return None;
        }
        let width = self
            .body
            .lines()
            .nth(row - self.body_start_row)
            .map(|l| l.chars().count())
            .unwrap_or(0);
        Some(Span::new(Position::new(row, 0), Position::new(row, width)))
    }

    /// Convert an editor span into a character range of the body.
    ///
    /// Each body row contributes one counter position per column plus one
    /// for its line break (two for `\r\n`), so offsets index the body text
    /// as stored. A start that is never reached maps to 0; an end that is
    /// never reached closes the range at the last offset minus one.
    pub fn exec_range(&self, span: &Span) -> ExecRange {
        let mut offset: usize = 0;
        let mut start = None;
        let mut stop = None;

        for (idx, line) in self.body.split_inclusive('\n').enumerate() {
            let row = self.body_start_row + idx;
            let content = line.strip_suffix('\n').unwrap_or(line);
            let (text, cr) = match content.strip_suffix('\r') {
                Some(text) => (text, 1),
                None => (content, 0),
            };
            let width = text.chars().count();
            for column in 0..=width {
                let here = Position::new(row, column);
                if start.is_none() && here == span.start {
                    start = Some(offset + column);
                }
                if stop.is_none() && here == span.end {
                    stop = Some(offset + column);
                }
            }
            offset += width + 1 + cr;
        }

        let stop = stop.unwrap_or_else(|| {
            tracing::debug!(chunk = %self.chunk_id, "span end outside chunk body, clamping");
            offset.saturating_sub(1)
        });
        ExecRange::new(start.unwrap_or(0), stop)
    }
}

/// A request to run some scope of one chunk.
///
/// Built fresh per request and consumed once it has been turned into a
/// [`QueueUnit`] or merged into an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecUnit {
    pub scope: ChunkScope,
    /// Editor span to run; `None` runs the whole chunk.
    pub range: Option<Span>,
    pub exec_mode: ExecMode,
    pub exec_scope: ExecScope,
}

impl ExecUnit {
    /// Request for an entire chunk.
    pub fn whole_chunk(scope: ChunkScope, exec_mode: ExecMode) -> Self {
        Self {
            scope,
            range: None,
            exec_mode,
            exec_scope: ExecScope::Chunk,
        }
    }

    /// Request for part of a chunk.
    pub fn partial(scope: ChunkScope, range: Span, exec_mode: ExecMode) -> Self {
        Self {
            scope,
            range: Some(range),
            exec_mode,
            exec_scope: ExecScope::Partial,
        }
    }

    pub fn chunk_id(&self) -> &ChunkId {
        &self.scope.chunk_id
    }

    /// Character range this request covers.
    pub fn exec_range(&self) -> ExecRange {
        match &self.range {
            Some(span) => self.scope.exec_range(span),
            None => self.scope.exec_range(&self.scope.full_span()),
        }
    }

    /// Build a queue unit whose only pending range is this request's range.
    pub fn into_queue_unit(self, doc_id: DocId) -> QueueUnit {
        let range = self.exec_range();
        let mut unit = QueueUnit::new(
            doc_id,
            self.scope.chunk_id,
            self.exec_mode,
            self.exec_scope,
            self.scope.body,
        );
        unit.add_pending_range(range);
        unit
    }
}
