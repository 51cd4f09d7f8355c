//! Ordered execution queue for one document.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{ChunkId, CommitMode, DocId};
use crate::unit::QueueUnit;

/// The units of one document awaiting or undergoing execution.
///
/// `units[0]` is always the unit currently executing or about to execute.
/// `max_units` is the largest length `units` has ever reached and only
/// resets when a new queue is built for the next batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocQueue {
    pub doc_id: DocId,
    /// Human-readable label shown while the queue runs (e.g. "Run All").
    pub job_desc: String,
    pub working_dir: Option<PathBuf>,
    pub commit_mode: CommitMode,
    /// Rendering hints forwarded to the engine.
    pub pixel_width: u32,
    pub char_width: u32,
    units: Vec<QueueUnit>,
    max_units: usize,
    completed_units: Vec<QueueUnit>,
}

impl DocQueue {
    pub fn new(
        doc_id: DocId,
        job_desc: impl Into<String>,
        working_dir: Option<PathBuf>,
        commit_mode: CommitMode,
        pixel_width: u32,
        char_width: u32,
    ) -> Self {
        Self {
            doc_id,
            job_desc: job_desc.into(),
            working_dir,
            commit_mode,
            pixel_width,
            char_width,
            units: Vec::new(),
            max_units: 0,
            completed_units: Vec::new(),
        }
    }

    pub fn units(&self) -> &[QueueUnit] {
        &self.units
    }

    pub fn completed_units(&self) -> &[QueueUnit] {
        &self.completed_units
    }

    pub fn max_units(&self) -> usize {
        self.max_units
    }

    /// Append a unit behind everything already queued.
    pub fn add_unit(&mut self, unit: QueueUnit) {
        self.units.push(unit);
        self.max_units = self.max_units.max(self.units.len());
    }

    /// Remove the unit for `chunk_id`, returning it if it was queued.
    pub fn remove_unit(&mut self, chunk_id: &ChunkId) -> Option<QueueUnit> {
        let idx = self.units.iter().position(|u| &u.chunk_id == chunk_id)?;
        Some(self.units.remove(idx))
    }

    /// Empty the queue, returning the units that were waiting.
    pub fn take_units(&mut self) -> Vec<QueueUnit> {
        std::mem::take(&mut self.units)
    }

    pub fn add_completed_unit(&mut self, unit: QueueUnit) {
        self.completed_units.push(unit);
    }

    pub fn is_complete(&self) -> bool {
        self.units.is_empty()
    }

    pub fn unit(&self, chunk_id: &ChunkId) -> Option<&QueueUnit> {
        self.units.iter().find(|u| &u.chunk_id == chunk_id)
    }

    pub fn unit_mut(&mut self, chunk_id: &ChunkId) -> Option<&mut QueueUnit> {
        self.units.iter_mut().find(|u| &u.chunk_id == chunk_id)
    }

    /// Most recent completed record for `chunk_id`.
    pub fn completed_unit(&self, chunk_id: &ChunkId) -> Option<&QueueUnit> {
        self.completed_units
            .iter()
            .rev()
            .find(|u| &u.chunk_id == chunk_id)
    }

    /// Unit at the head of the queue.
    pub fn head(&self) -> Option<&QueueUnit> {
        self.units.first()
    }

    /// Share of the high-water mark that has left the queue, in percent.
    pub fn progress_percent(&self) -> u32 {
        if self.max_units == 0 {
            return 0;
        }
        let done = self.max_units - self.units.len();
        (100 * done / self.max_units) as u32
    }
}
