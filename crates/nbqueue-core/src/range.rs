//! Character ranges within a chunk's code.

use serde::{Deserialize, Serialize};

/// Half-open interval `[start, stop)` of character offsets into a chunk body.
///
/// Offset 0 is the first character of the chunk body, not of the document.
/// Ranges are never merged or de-duplicated automatically; callers avoid
/// queueing overlapping pending ranges through [`QueueUnit::has_pending_range`].
///
/// [`QueueUnit::has_pending_range`]: crate::unit::QueueUnit::has_pending_range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecRange {
    pub start: usize,
    pub stop: usize,
}

impl ExecRange {
    pub fn new(start: usize, stop: usize) -> Self {
        Self { start, stop }
    }

    /// Grow this range in place to the bounding interval of `self` and `other`.
    pub fn extend_to(&mut self, other: &ExecRange) {
        self.start = self.start.min(other.start);
        self.stop = self.stop.max(other.stop);
    }

    /// Whether `offset` falls inside the range.
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.stop
    }

    /// Whether `other` lies entirely within this range.
    pub fn covers(&self, other: &ExecRange) -> bool {
        self.start <= other.start && self.stop >= other.stop
    }

    pub fn len(&self) -> usize {
        self.stop.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
