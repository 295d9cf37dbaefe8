//! Persistence layer for saving/loading vector indexes.
//!
//! Supports both JSON (human-readable) and bincode (efficient binary) formats.
//! Loaded indexes are re-checked against the same invariants as freshly
//! built ones.

use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Where the CLI reads and writes the index when no path is given.
pub const DEFAULT_INDEX_PATH: &str = "data/vector_index.json";

/// Save format for vector indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    /// JSON format (human-readable, larger).
    Json,
    /// Bincode format (binary, compact).
    Bincode,
}

impl SaveFormat {
    /// Determine format from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") | Some("bincode") => SaveFormat::Bincode,
            _ => SaveFormat::Json,
        }
    }
}

/// Save a VectorIndex to a file.
pub fn save_index(index: &VectorIndex, path: &Path) -> Result<()> {
    save_index_with_format(index, path, SaveFormat::from_path(path))
}

/// Save a VectorIndex with specific format.
pub fn save_index_with_format(index: &VectorIndex, path: &Path, format: SaveFormat) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| RagError::io(parent, e))?;
        }
    }

    let data = match format {
        SaveFormat::Json => serde_json::to_string_pretty(index)
            .map_err(|e| RagError::Serialization(e.to_string()))?
            .into_bytes(),
        SaveFormat::Bincode => {
            bincode::serde::encode_to_vec(index, bincode::config::standard())
                .map_err(|e| RagError::Serialization(e.to_string()))?
        }
    };

    fs::write(path, &data).map_err(|e| RagError::io(path, e))?;
    debug!(path = %path.display(), bytes = data.len(), ?format, "index saved");

    Ok(())
}

/// Load a VectorIndex from a file.
pub fn load_index(path: &Path) -> Result<VectorIndex> {
    if !path.exists() {
        return Err(RagError::IndexNotFound(path.to_path_buf()));
    }

    load_index_with_format(path, SaveFormat::from_path(path))
}

/// Load a VectorIndex with specific format.
pub fn load_index_with_format(path: &Path, format: SaveFormat) -> Result<VectorIndex> {
    let data = fs::read(path).map_err(|e| RagError::io(path, e))?;

    let index: VectorIndex = match format {
        SaveFormat::Json => serde_json::from_slice(&data)
            .map_err(|e| RagError::Serialization(e.to_string()))?,
        SaveFormat::Bincode => {
            let (index, _) = bincode::serde::decode_from_slice(&data, bincode::config::standard())
                .map_err(|e| RagError::Serialization(e.to_string()))?;
            index
        }
    };

    index.validate()?;
    Ok(index)
}

/// Check if an index file exists at the given path.
pub fn index_exists(path: &Path) -> bool {
    path.is_file()
}

/// Get the size of an index file in bytes.
pub fn index_size(path: &Path) -> Result<u64> {
    let metadata = fs::metadata(path).map_err(|e| RagError::io(path, e))?;
    Ok(metadata.len())
}
