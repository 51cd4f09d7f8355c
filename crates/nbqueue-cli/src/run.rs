//! Run command implementation for nbqueue CLI.
//!
//! Queues the chunks of a notebook, runs them on the in-process loopback
//! engine and prints the scheduler's activity as it happens.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use tokio::sync::mpsc;
use uuid::Uuid;

use nbqueue_core::{ChunkId, Collaborators, DocId, ExecMode, QueueConfig};
use nbqueue_session::{ChannelEngine, FencedNotebook, LoopbackConfig, SessionRouter, loopback};

use crate::colors;
use crate::terminal::TerminalReporter;

const RUN_ALL_JOB_DESC: &str = "Run All";

pub struct RunOptions {
    pub chunk: Option<String>,
    pub single: bool,
    pub timeout_ms: u64,
    pub step_delay_ms: u64,
}

/// Run a notebook.
pub async fn execute(notebook_path: &Path, options: RunOptions) -> anyhow::Result<()> {
    let start = Instant::now();

    let notebook = Arc::new(FencedNotebook::load(notebook_path)?);
    if notebook.chunks().is_empty() {
        println!("{}No chunks found in notebook.{}", colors::YELLOW, colors::RESET);
        println!("Chunks are fenced blocks opened with ```{{lang label}}");
        return Ok(());
    }

    let exec_mode = if options.single {
        ExecMode::Single
    } else {
        ExecMode::Batch
    };

    let (engine, calls) = ChannelEngine::new();
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let loopback_config = LoopbackConfig {
        step_delay: Duration::from_millis(options.step_delay_ms),
    };
    let engine_task = loopback::spawn(loopback_config, calls, events_tx);

    let reporter = Arc::new(TerminalReporter::new(notebook.clone()));
    let collab = Collaborators {
        engine: Arc::new(engine),
        editor: notebook.clone(),
        renderer: reporter.clone(),
        status: reporter.clone(),
        history: reporter.clone(),
    };
    let config = QueueConfig {
        working_dir: notebook_path.parent().map(Path::to_path_buf),
        ..QueueConfig::default()
    };

    let doc_id = DocId::new(Uuid::new_v4().to_string());
    let mut router = SessionRouter::new();
    let state = router.open(doc_id.clone(), config, collab)?;

    match options.chunk.as_deref() {
        Some(name) => {
            let chunk_id = notebook
                .chunk_by_label(name)
                .map(|c| c.id.clone())
                .unwrap_or_else(|| ChunkId::new(name));
            state.execute_chunk_id(&chunk_id, exec_mode)?;
        }
        None => state.execute_chunks(RUN_ALL_JOB_DESC, notebook.exec_units(exec_mode))?,
    }

    let timeout = Duration::from_millis(options.timeout_ms);
    if tokio::time::timeout(timeout, router.run_until_idle(&mut events))
        .await
        .is_err()
    {
        if let Some(state) = router.get_mut(&doc_id) {
            state.clear();
        }
        bail!("Timed out after {}ms waiting for the queue to drain", options.timeout_ms);
    }

    let completed = router
        .get(&doc_id)
        .and_then(|s| s.queue())
        .map(|q| q.completed_units().len())
        .unwrap_or(0);
    router.close(&doc_id)?;
    drop(router);
    engine_task.await.context("loopback engine task failed")?;

    if reporter.error_count() > 0 {
        bail!("{} error(s) while running the queue", reporter.error_count());
    }

    println!(
        "{}Completed{} {} {} in {:.2}s",
        colors::GREEN,
        colors::RESET,
        completed,
        if completed == 1 { "chunk" } else { "chunks" },
        start.elapsed().as_secs_f64()
    );

    Ok(())
}
