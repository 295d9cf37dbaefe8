//! Rust RAG Indexer - chunked semantic retrieval with LLM-judged evaluation.
//!
//! Documents are normalized, split into overlapping fixed-size chunks,
//! embedded through a pluggable [`Embedder`](embedding::Embedder) and stored
//! in an immutable [`VectorIndex`] that answers exact top-k similarity
//! queries. The [`eval`] module scores retrieved context and generated
//! answers with an injected [`Judge`](eval::Judge).
//!
//! # Quick Start
//!
//! ```no_run
//! use rust_rag_indexer::{
//!     config::Config,
//!     document::Document,
//!     embedding,
//!     index::VectorIndex,
//!     persistence::save_index,
//!     retriever::Retriever,
//! };
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load configuration
//!     let config = Config::load()?;
//!     config.validate()?;
//!
//!     // Pick the embedding provider once
//!     let embedder = embedding::from_config(&config.embedding, config.retry)?;
//!
//!     // Load and chunk a document
//!     let document = Document::from_text_file(Path::new("document.txt"))?;
//!     let chunks = document.chunks(&config.chunking)?;
//!
//!     // Build and save the index
//!     let index = VectorIndex::build(
//!         chunks,
//!         embedder.as_ref(),
//!         config.retrieval.build_options(),
//!     )
//!     .await?;
//!     save_index(&index, Path::new("vector_index.json"))?;
//!
//!     // Retrieve
//!     let retriever = Retriever::new(
//!         Arc::new(index),
//!         embedder,
//!         config.retrieval.top_k,
//!         config.retrieval.timeout(),
//!     )?;
//!     for text in retriever.retrieve("your question here").await? {
//!         println!("{}", text);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **chunker**: whitespace normalization and overlapping segmentation
//! - **embedding**: the `Embedder` capability and its providers
//! - **index**: brute-force vector index with deterministic ranking
//! - **retriever**: question to ranked chunk texts
//! - **eval**: judge capability, thresholds, datasets and the eval runner

pub mod chunker;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod eval;
pub mod index;
pub mod llm;
pub mod persistence;
pub mod retriever;
pub mod retry;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use chunker::{Chunk, ChunkConfig, chunk_text};
pub use config::Config;
pub use document::Document;
pub use embedding::Embedder;
pub use error::{RagError, Result};
pub use index::{Metric, ScoredChunk, VectorIndex};
pub use llm::LlmClient;
pub use persistence::{load_index, save_index};
pub use retriever::{Retriever, retrieve, retrieve_with_timeout};
