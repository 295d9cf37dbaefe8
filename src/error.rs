//! Error types for the retrieval index and evaluation pipeline.

use reqwest::StatusCode;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors that can occur while chunking, indexing, retrieving or judging.
#[derive(Error, Debug)]
pub enum RagError {
    /// A caller supplied an argument outside its valid range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An embedding call failed or returned a malformed vector.
    #[error("Embedding failed for {target}: {reason}")]
    Embedding { target: String, reason: String },

    /// An external call exceeded its time bound.
    #[error("Timed out after {elapsed:?} while {operation}")]
    Timeout { operation: String, elapsed: Duration },

    /// The judge failed or returned an out-of-range score.
    #[error("Judging error: {0}")]
    Judging(String),

    /// The remote service asked us to slow down.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// A transient failure kept recurring past the retry budget.
    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        last: Box<RagError>,
    },

    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The document path does not exist.
    #[error("Document not found at '{0}'")]
    DocumentNotFound(PathBuf),

    /// The index file does not exist.
    #[error("Index file not found at '{0}'")]
    IndexNotFound(PathBuf),

    /// Configuration file or value error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// LLM API error.
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// LLM response parsing error.
    #[error("Failed to parse LLM response: {0}")]
    LlmParse(String),

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),
}

impl RagError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Embedding failure attributed to a stored chunk.
    pub fn chunk_embedding(chunk_id: usize, reason: impl Into<String>) -> Self {
        Self::Embedding {
            target: format!("chunk {}", chunk_id),
            reason: reason.into(),
        }
    }

    /// Embedding failure attributed to a query string.
    pub fn query_embedding(reason: impl Into<String>) -> Self {
        Self::Embedding {
            target: "query".to_string(),
            reason: reason.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed,
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Http(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// OpenAI-style error body.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Map a non-success API response to an error.
///
/// 429 becomes [`RagError::RateLimited`] and 5xx becomes [`RagError::Http`],
/// both transient. Anything else is [`RagError::LlmApi`] prefixed with
/// `context`.
pub(crate) fn classify_failure(status: StatusCode, body: &str, context: &str) -> RagError {
    let message = serde_json::from_str::<ApiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());

    if status == StatusCode::TOO_MANY_REQUESTS {
        RagError::RateLimited(message)
    } else if status.is_server_error() {
        RagError::Http(format!("{}: {}", status, message))
    } else {
        RagError::LlmApi(format!("{} ({}): {}", context, status, message))
    }
}

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        RagError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::LlmParse(err.to_string())
    }
}
