//! Top-k retrieval of chunk texts for a question.

use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::index::{ScoredChunk, VectorIndex};
use crate::retry::with_timeout;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default bound on the question embedding call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Embed `question` with `embedder` and return the `k` best chunk texts.
///
/// The embedding call is bounded by [`DEFAULT_TIMEOUT`]. Errors from the
/// embedder or the index are returned unchanged.
pub async fn retrieve(
    index: &VectorIndex,
    embedder: &dyn Embedder,
    question: &str,
    k: usize,
) -> Result<Vec<String>> {
    retrieve_with_timeout(index, embedder, question, k, DEFAULT_TIMEOUT).await
}

/// Like [`retrieve`], with a caller-supplied bound on the embedding call.
pub async fn retrieve_with_timeout(
    index: &VectorIndex,
    embedder: &dyn Embedder,
    question: &str,
    k: usize,
    timeout: Duration,
) -> Result<Vec<String>> {
    let results = retrieve_scored(index, embedder, question, k, timeout).await?;
    Ok(results.into_iter().map(|r| r.chunk.text).collect())
}

/// Fail unless `embedder` is the model whose vectors `index` stores.
fn check_embedder(index: &VectorIndex, embedder: &dyn Embedder) -> Result<()> {
    if embedder.model_id() != index.embedder_id() {
        return Err(RagError::InvalidArgument(format!(
            "index was built with '{}' but retriever embeds with '{}'",
            index.embedder_id(),
            embedder.model_id()
        )));
    }
    Ok(())
}

async fn retrieve_scored(
    index: &VectorIndex,
    embedder: &dyn Embedder,
    question: &str,
    k: usize,
    timeout: Duration,
) -> Result<Vec<ScoredChunk>> {
    check_embedder(index, embedder)?;
    let query_vector = with_timeout(timeout, "embedding question", embedder.embed(question)).await?;
    let results = index.query(&query_vector, k)?;
    debug!(question, k, returned = results.len(), "retrieved chunks");
    Ok(results)
}

/// An index bound to the embedder that built it and a fixed result count.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
    timeout: Duration,
}

impl Retriever {
    /// Create a retriever.
    ///
    /// Fails when `top_k` is zero or when `embedder` is not the model the
    /// index was built with, since their vectors would not be comparable.
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
        top_k: usize,
        timeout: Duration,
    ) -> Result<Self> {
        if top_k == 0 {
            return Err(RagError::InvalidArgument("top_k must be at least 1".to_string()));
        }
        check_embedder(&index, embedder.as_ref())?;

        Ok(Self {
            index,
            embedder,
            top_k,
            timeout,
        })
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Chunk texts in rank order.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<String>> {
        let results = self.retrieve_scored(question).await?;
        Ok(results.into_iter().map(|r| r.chunk.text).collect())
    }

    /// Chunks with their similarity scores, best first.
    pub async fn retrieve_scored(&self, question: &str) -> Result<Vec<ScoredChunk>> {
        retrieve_scored(
            &self.index,
            self.embedder.as_ref(),
            question,
            self.top_k,
            self.timeout,
        )
        .await
    }

    /// Search and return concatenated context for a prompt.
    pub async fn retrieve_context(&self, question: &str) -> Result<String> {
        let results = self.retrieve_scored(question).await?;
        Ok(format_context(&results))
    }
}

/// Join scored chunks into a single context block.
pub fn format_context(results: &[ScoredChunk]) -> String {
    results
        .iter()
        .map(|r| format!("[Chunk {} | Score: {:.3}]\n{}", r.chunk.id, r.score, r.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
