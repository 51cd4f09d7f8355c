//! Fenced markdown notebooks.
//!
//! Chunks are fenced code blocks whose info string is wrapped in braces:
//!
//! ````text
//! Some prose.
//!
//! ```{r setup}
//! x <- 1
//! ```
//! ````
//!
//! The first word inside the braces is the engine, the optional second word
//! the chunk label. Anything after a comma is ignored. Plain ```` ``` ````
//! blocks are prose and never become chunks. Rows are zero-based.

use std::path::Path;

use nbqueue_core::{ChunkId, ChunkScope, ExecMode, ExecUnit, NotebookEditor};

use crate::error::{SessionError, SessionResult};

/// One executable chunk of a notebook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedChunk {
    pub id: ChunkId,
    pub label: Option<String>,
    pub engine: String,
    /// Row of the opening fence.
    pub header_row: usize,
    pub body_start_row: usize,
    /// Body lines, each terminated by a newline.
    pub body: String,
    /// Row of the closing fence.
    pub footer_row: usize,
}

impl FencedChunk {
    /// Label if present, otherwise the chunk id.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(self.id.as_str())
    }

    pub fn scope(&self) -> ChunkScope {
        ChunkScope::new(self.id.clone(), self.body_start_row, self.body.clone())
    }

    fn contains_row(&self, row: usize) -> bool {
        row >= self.header_row && row <= self.footer_row
    }
}

/// A notebook split into chunks, read-only.
#[derive(Debug, Clone, Default)]
pub struct FencedNotebook {
    chunks: Vec<FencedChunk>,
    pixel_width: u32,
    char_width: u32,
}

impl FencedNotebook {
    /// Split notebook source into chunks.
    pub fn parse(source: &str) -> SessionResult<Self> {
        let mut chunks = Vec::new();
        let mut open: Option<(usize, String, Option<String>)> = None;
        let mut body = String::new();

        for (row, line) in source.lines().enumerate() {
            let trimmed = line.trim();

            match open.take() {
                None => {
                    if let Some(info) = trimmed.strip_prefix("```{") {
                        let Some(info) = info.strip_suffix('}') else {
                            return Err(SessionError::Parse {
                                line: row + 1,
                                message: "chunk header missing closing brace".to_string(),
                            });
                        };
                        let (engine, label) = parse_header(info).ok_or_else(|| {
                            SessionError::Parse {
                                line: row + 1,
                                message: "chunk header names no engine".to_string(),
                            }
                        })?;
                        open = Some((row, engine, label));
                        body.clear();
                    }
                }
                Some((header_row, engine, label)) => {
                    if trimmed == "```" {
                        chunks.push(FencedChunk {
                            id: ChunkId::new(format!("c{}", chunks.len() + 1)),
                            label,
                            engine,
                            header_row,
                            body_start_row: header_row + 1,
                            body: std::mem::take(&mut body),
                            footer_row: row,
                        });
                    } else {
                        body.push_str(line);
                        body.push('\n');
                        open = Some((header_row, engine, label));
                    }
                }
            }
        }

        if let Some((header_row, _, _)) = open {
            return Err(SessionError::Parse {
                line: header_row + 1,
                message: "unterminated chunk".to_string(),
            });
        }

        tracing::debug!(chunks = chunks.len(), "parsed notebook");
        Ok(Self {
            chunks,
            pixel_width: 0,
            char_width: 0,
        })
    }

    /// Read and parse a notebook file.
    pub fn load(path: &Path) -> SessionResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| SessionError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&source)
    }

    /// Set the rendering hints reported to the scheduler.
    pub fn with_display(mut self, pixel_width: u32, char_width: u32) -> Self {
        self.pixel_width = pixel_width;
        self.char_width = char_width;
        self
    }

    pub fn chunks(&self) -> &[FencedChunk] {
        &self.chunks
    }

    pub fn chunk(&self, chunk_id: &ChunkId) -> Option<&FencedChunk> {
        self.chunks.iter().find(|c| &c.id == chunk_id)
    }

    pub fn chunk_by_label(&self, label: &str) -> Option<&FencedChunk> {
        self.chunks.iter().find(|c| c.label.as_deref() == Some(label))
    }

    /// Whole-chunk execution requests for every chunk, in document order.
    pub fn exec_units(&self, exec_mode: ExecMode) -> Vec<ExecUnit> {
        self.chunks
            .iter()
            .map(|c| ExecUnit::whole_chunk(c.scope(), exec_mode))
            .collect()
    }
}

/// Split `lang label, opts` into engine and label.
fn parse_header(info: &str) -> Option<(String, Option<String>)> {
    let head = info.split(',').next().unwrap_or_default();
    let mut words = head.split_whitespace();
    let engine = words.next()?.to_string();
    let label = words.next().map(str::to_string);
    Some((engine, label))
}

impl NotebookEditor for FencedNotebook {
    fn chunk_id_at_row(&self, row: usize) -> Option<ChunkId> {
        self.chunks
            .iter()
            .find(|c| c.contains_row(row))
            .map(|c| c.id.clone())
    }

    fn chunk_scope(&self, chunk_id: &ChunkId) -> Option<ChunkScope> {
        self.chunk(chunk_id).map(FencedChunk::scope)
    }

    fn unfold(&self, scope: &ChunkScope) {
        tracing::trace!(chunk = %scope.chunk_id, "unfold");
    }

    fn pixel_width(&self) -> u32 {
        self.pixel_width
    }

    fn char_width(&self) -> u32 {
        self.char_width
    }
}
