//! Source documents for indexing.
//!
//! Text is consumed as already extracted plain text; binary formats are
//! converted before they reach this crate.

use crate::chunker::{Chunk, ChunkConfig, normalize_whitespace};
use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A named body of text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Document name/title.
    pub name: String,
    /// Original file path (if loaded from file).
    pub path: Option<PathBuf>,
    /// Raw text as extracted.
    pub content: String,
}

impl Document {
    /// Load a UTF-8 text file.
    pub fn from_text_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RagError::DocumentNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled")
            .to_string();

        Ok(Self {
            name,
            path: Some(path.to_path_buf()),
            content,
        })
    }

    /// Create a document from raw text content.
    pub fn from_text(name: impl Into<String>, content: String) -> Self {
        Self {
            name: name.into(),
            path: None,
            content,
        }
    }

    /// Content with extraction whitespace artifacts collapsed.
    pub fn normalized_content(&self) -> String {
        normalize_whitespace(&self.content)
    }

    /// Number of characters in the normalized content.
    pub fn char_count(&self) -> usize {
        self.normalized_content().chars().count()
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }

    /// Split the document into overlapping chunks.
    pub fn chunks(&self, config: &ChunkConfig) -> Result<Vec<Chunk>> {
        config.chunk(&self.content)
    }
}
