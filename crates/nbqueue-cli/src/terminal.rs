//! Terminal rendering of scheduler activity.

use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};

use nbqueue_core::{ChunkId, ChunkRenderer, ChunkState, CommandHistory, LineState, StatusReporter};
use nbqueue_session::FencedNotebook;

use crate::colors;

/// Prints gutter changes, progress, errors and executed code to the terminal.
pub struct TerminalReporter {
    notebook: Arc<FencedNotebook>,
    errors: Mutex<usize>,
}

impl TerminalReporter {
    pub fn new(notebook: Arc<FencedNotebook>) -> Self {
        Self {
            notebook,
            errors: Mutex::new(0),
        }
    }

    /// Number of errors shown so far.
    pub fn error_count(&self) -> usize {
        self.errors.lock().map(|n| *n).unwrap_or(0)
    }

    fn name<'a>(&'a self, chunk_id: &'a ChunkId) -> &'a str {
        self.notebook
            .chunk(chunk_id)
            .map(|c| c.display_name())
            .unwrap_or(chunk_id.as_str())
    }
}

fn line_state_label(state: LineState) -> &'static str {
    match state {
        LineState::Queued => "queued",
        LineState::Executed => "executed",
        LineState::Resting => "resting",
    }
}

/// Final progress line. An immediate hide means the queue was cleared, not
/// drained.
fn progress_end_marker(immediate: bool) -> &'static str {
    if immediate { "[stopped]" } else { "[100%]" }
}

impl ChunkRenderer for TerminalReporter {
    fn set_line_state(&self, chunk_id: &ChunkId, rows: RangeInclusive<usize>, state: LineState) {
        println!(
            "{}  {} rows {}-{} {}{}",
            colors::DIM,
            self.name(chunk_id),
            rows.start(),
            rows.end(),
            line_state_label(state),
            colors::RESET
        );
    }

    fn set_chunk_state(&self, chunk_id: &ChunkId, state: ChunkState) {
        match state {
            ChunkState::Executing => {
                println!("{}▶ {}{}", colors::BOLD, self.name(chunk_id), colors::RESET);
            }
            ChunkState::Queued | ChunkState::Resting => {
                tracing::debug!(chunk = %chunk_id, ?state, "chunk state");
            }
        }
    }

    fn clear_error(&self, _chunk_id: &ChunkId) {}
}

impl StatusReporter for TerminalReporter {
    fn show_progress(&self, job_desc: &str) {
        println!("{}{}...{}", colors::BOLD, job_desc, colors::RESET);
    }

    fn update_progress(&self, percent: u32) {
        println!("{}[{:>3}%]{}", colors::CYAN, percent, colors::RESET);
    }

    fn hide_progress(&self, immediate: bool) {
        println!("{}{}{}", colors::CYAN, progress_end_marker(immediate), colors::RESET);
    }

    fn show_error(&self, caption: &str, message: &str) {
        if let Ok(mut n) = self.errors.lock() {
            *n += 1;
        }
        eprintln!("{}{}: {}{}", colors::RED, caption, message, colors::RESET);
    }
}

impl CommandHistory for TerminalReporter {
    fn append(&self, code: &str) {
        for line in code.lines() {
            println!("{}>{} {}", colors::GREEN, colors::RESET, line);
        }
    }
}
