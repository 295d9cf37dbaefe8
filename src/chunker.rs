//! Text normalization and overlapping fixed-size chunking.
//!
//! Chunk offsets are character offsets into the normalized text, so
//! multi-byte input never splits inside a code point.

use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for text chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Reject sizes that would produce empty chunks or never advance.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::InvalidArgument(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::InvalidArgument(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Distance between the start offsets of consecutive chunks.
    pub fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }

    /// Chunk `text` with this configuration.
    pub fn chunk(&self, text: &str) -> Result<Vec<Chunk>> {
        chunk_text(text, self.chunk_size, self.chunk_overlap)
    }
}

/// A contiguous span of the normalized document, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of the chunk in document order, starting at 0.
    pub id: usize,
    /// Chunk text content.
    pub text: String,
    /// Start character offset (inclusive).
    pub start_offset: usize,
    /// End character offset (exclusive).
    pub end_offset: usize,
}

impl Chunk {
    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.end_offset - self.start_offset
    }
}

fn is_artifact(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\t')
}

/// Collapse tab/newline artifacts left behind by text extraction.
///
/// Each run of whitespace that contains at least one tab, newline or
/// carriage return becomes a single space. Runs of plain spaces and all
/// other characters are left untouched.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = String::new();
    let mut run_has_artifact = false;

    for c in text.chars() {
        if c == ' ' || is_artifact(c) {
            run_has_artifact |= is_artifact(c);
            run.push(c);
            continue;
        }
        flush_run(&mut out, &mut run, &mut run_has_artifact);
        out.push(c);
    }
    flush_run(&mut out, &mut run, &mut run_has_artifact);

    out
}

fn flush_run(out: &mut String, run: &mut String, run_has_artifact: &mut bool) {
    if run.is_empty() {
        return;
    }
    if *run_has_artifact {
        out.push(' ');
    } else {
        out.push_str(run);
    }
    run.clear();
    *run_has_artifact = false;
}

/// Normalize `text` and split it into overlapping windows.
///
/// A chunk starts at every multiple of `chunk_size - overlap` below the
/// normalized length, so the tail may be covered by more than one short
/// chunk. No chunk is ever empty.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    let config = ChunkConfig::new(chunk_size, overlap);
    config.validate()?;

    let normalized = normalize_whitespace(text);
    let chars: Vec<char> = normalized.chars().collect();
    let len = chars.len();
    let stride = config.stride();

    let chunks = (0..len)
        .step_by(stride)
        .enumerate()
        .map(|(id, start)| {
            let end = (start + chunk_size).min(len);
            Chunk {
                id,
                text: chars[start..end].iter().collect(),
                start_offset: start,
                end_offset: end,
            }
        })
        .collect();

    Ok(chunks)
}

/// Rebuild the normalized text from chunks in document order.
///
/// Each chunk contributes only the characters past the end of the
/// previous one.
pub fn reconstruct(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    let mut covered = 0;

    for chunk in chunks {
        if chunk.end_offset <= covered {
            continue;
        }
        let skip = covered.saturating_sub(chunk.start_offset);
        out.extend(chunk.text.chars().skip(skip));
        covered = chunk.end_offset;
    }

    out
}
