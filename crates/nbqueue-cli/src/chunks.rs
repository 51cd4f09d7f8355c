//! Chunks command: list the chunks of a notebook.

use std::path::Path;

use nbqueue_session::FencedNotebook;

use crate::colors;

pub fn execute(notebook_path: &Path) -> anyhow::Result<()> {
    let notebook = FencedNotebook::load(notebook_path)?;

    if notebook.chunks().is_empty() {
        println!("{}No chunks found in notebook.{}", colors::YELLOW, colors::RESET);
        return Ok(());
    }

    for chunk in notebook.chunks() {
        println!(
            "{}{:<4}{} {:<16} {:<8} rows {}-{}",
            colors::BOLD,
            chunk.id.as_str(),
            colors::RESET,
            chunk.label.as_deref().unwrap_or("-"),
            chunk.engine,
            chunk.header_row,
            chunk.footer_row,
        );
    }

    Ok(())
}
