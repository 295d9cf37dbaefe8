//! Immutable chunk vector index with exact top-k search.
//!
//! An index is built once from a document's chunks and never mutated;
//! rebuilding means constructing a fresh [`VectorIndex`]. Because queries
//! only take `&self`, a built index can be shared across tasks behind an
//! `Arc` without locking.

use crate::chunker::Chunk;
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::retry::with_timeout;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Similarity function used to rank entries. Higher is always closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Normalized dot product in [-1, 1].
    #[default]
    Cosine,
    /// `1 / (1 + l2_distance)` in (0, 1].
    Euclidean,
}

impl Metric {
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => cosine_similarity(a, b),
            Metric::Euclidean => 1.0 / (1.0 + l2_distance(a, b)),
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 when the lengths differ or either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// A chunk together with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// A stored chunk and its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Options controlling how [`VectorIndex::build`] calls the embedder.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Maximum embedding calls in flight.
    pub concurrency: usize,
    /// Bound on each individual embedding call.
    pub timeout: Duration,
    pub metric: Metric,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout: Duration::from_secs(30),
            metric: Metric::Cosine,
        }
    }
}

/// Nearest-neighbor search over stored chunk vectors.
///
/// [`VectorIndex`] answers exactly by scanning every entry. An approximate
/// backend may implement the same contract as long as results keep the
/// descending-score, ascending-id ordering.
pub trait NearestNeighbors {
    /// Return up to `k` entries most similar to `query`.
    fn query(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;
}

/// Flat vector index over one document's chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    embedder_id: String,
    dimension: usize,
    metric: Metric,
}

impl VectorIndex {
    /// Embed every chunk and build an index.
    ///
    /// Calls are issued concurrently (at most `options.concurrency` at a
    /// time) but results are stored in chunk order. The first failure
    /// aborts the build; no partial index is ever returned.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
        options: BuildOptions,
    ) -> Result<Self> {
        if options.concurrency == 0 {
            return Err(RagError::InvalidArgument(
                "build concurrency must be at least 1".to_string(),
            ));
        }

        let dimension = embedder.dimension();
        let started = Instant::now();
        info!(
            chunks = chunks.len(),
            embedder = embedder.model_id(),
            concurrency = options.concurrency,
            "building vector index"
        );

        let entries: Vec<IndexEntry> = stream::iter(chunks)
            .map(|chunk| embed_chunk(embedder, chunk, dimension, options.timeout))
            .buffered(options.concurrency)
            .try_collect()
            .await?;

        let index = Self::from_entries(
            entries,
            embedder.model_id().to_string(),
            dimension,
            options.metric,
        )?;

        info!(
            entries = index.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "vector index built"
        );
        Ok(index)
    }

    /// Assemble an index from precomputed vectors.
    ///
    /// `chunks` and `vectors` are paired positionally.
    pub fn from_parts(
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
        embedder_id: impl Into<String>,
        dimension: usize,
        metric: Metric,
    ) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(RagError::InvalidArgument(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();

        Self::from_entries(entries, embedder_id.into(), dimension, metric)
    }

    fn from_entries(
        entries: Vec<IndexEntry>,
        embedder_id: String,
        dimension: usize,
        metric: Metric,
    ) -> Result<Self> {
        let index = Self {
            entries,
            embedder_id,
            dimension,
            metric,
        };
        index.validate()?;
        Ok(index)
    }

    /// Check the dimension, finiteness and unique-id invariants.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(RagError::InvalidArgument(
                "index dimension must be greater than 0".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(self.entries.len());
        for entry in &self.entries {
            if entry.vector.len() != self.dimension {
                return Err(RagError::chunk_embedding(
                    entry.chunk.id,
                    format!(
                        "expected {} dimensions, got {}",
                        self.dimension,
                        entry.vector.len()
                    ),
                ));
            }
            if !is_finite(&entry.vector) {
                return Err(RagError::chunk_embedding(
                    entry.chunk.id,
                    "non-finite component",
                ));
            }
            if !seen.insert(entry.chunk.id) {
                return Err(RagError::InvalidArgument(format!(
                    "duplicate chunk id {}",
                    entry.chunk.id
                )));
            }
        }
        Ok(())
    }

    /// Score every entry against `query` and return the best `k`.
    ///
    /// Results are sorted by descending score; equal scores are ordered by
    /// ascending chunk id. Asking for more than `len()` returns everything.
    pub fn query(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(RagError::InvalidArgument("k must be at least 1".to_string()));
        }
        if self.entries.is_empty() {
            return Err(RagError::InvalidArgument(
                "cannot query an empty index".to_string(),
            ));
        }
        if query.len() != self.dimension {
            return Err(RagError::InvalidArgument(format!(
                "query vector has {} dimensions, index has {}",
                query.len(),
                self.dimension
            )));
        }
        if !is_finite(query) {
            return Err(RagError::InvalidArgument(
                "query vector has a non-finite component".to_string(),
            ));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (pos, self.metric.similarity(query, &entry.vector)))
            .collect();

        scored.sort_by(|(pa, sa), (pb, sb)| {
            sb.total_cmp(sa)
                .then_with(|| self.entries[*pa].chunk.id.cmp(&self.entries[*pb].chunk.id))
        });
        scored.truncate(k);

        debug!(k, returned = scored.len(), "index query");

        Ok(scored
            .into_iter()
            .map(|(pos, score)| ScoredChunk {
                chunk: self.entries[pos].chunk.clone(),
                score,
            })
            .collect())
    }

    /// Number of chunks in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Identifier of the embedder whose vectors are stored.
    pub fn embedder_id(&self) -> &str {
        &self.embedder_id
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Get all entries.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Stored chunks in insertion order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|e| &e.chunk)
    }

    /// Look up a chunk by id.
    pub fn get(&self, id: usize) -> Option<&IndexEntry> {
        self.entries.iter().find(|e| e.chunk.id == id)
    }
}

impl NearestNeighbors for VectorIndex {
    fn query(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        VectorIndex::query(self, query, k)
    }
}

fn is_finite(vector: &[f32]) -> bool {
    vector.iter().all(|x| x.is_finite())
}

async fn embed_chunk(
    embedder: &dyn Embedder,
    chunk: Chunk,
    dimension: usize,
    timeout: Duration,
) -> Result<IndexEntry> {
    let operation = format!("embedding chunk {}", chunk.id);
    let vector = with_timeout(timeout, &operation, embedder.embed(&chunk.text))
        .await
        .map_err(|err| match err {
            RagError::Timeout { .. } => err,
            RagError::Embedding { reason, .. } => RagError::chunk_embedding(chunk.id, reason),
            other => RagError::chunk_embedding(chunk.id, other.to_string()),
        })?;

    if vector.len() != dimension {
        return Err(RagError::chunk_embedding(
            chunk.id,
            format!("expected {} dimensions, got {}", dimension, vector.len()),
        ));
    }
    if !is_finite(&vector) {
        return Err(RagError::chunk_embedding(chunk.id, "non-finite component"));
    }

    Ok(IndexEntry { chunk, vector })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::chunk_text;
    use crate::test_utils::{FixedEmbedder, ScriptedEmbedder, chunk};

    fn three_vector_index() -> VectorIndex {
        VectorIndex::from_parts(
            vec![chunk(0, "east"), chunk(1, "north"), chunk(2, "north-east")],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
            "test:d2",
            2,
            Metric::Cosine,
        )
        .unwrap()
    }

    #[test]
    fn test_documented_ranking_scenario() {
        let index = three_vector_index();
        let results = index.query(&[1.0, 0.0], 2).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, 0);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert_eq!(results[1].chunk.id, 2);
        assert!((results[1].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-3);
    }

    #[test]
    fn test_k_larger_than_index_returns_all_sorted() {
        let index = three_vector_index();
        let results = index.query(&[0.2, 1.0], 10).unwrap();

        assert_eq!(results.len(), 3);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_self_similarity_is_one() {
        let index = three_vector_index();
        for entry in index.entries() {
            let results = index.query(&entry.vector, 1).unwrap();
            assert_eq!(results[0].chunk.id, entry.chunk.id);
            assert!((results[0].score - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_ties_break_by_ascending_id() {
        let index = VectorIndex::from_parts(
            vec![chunk(5, "b"), chunk(2, "a"), chunk(9, "c")],
            vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![2.0, 0.0]],
            "test:d2",
            2,
            Metric::Cosine,
        )
        .unwrap();

        let ids: Vec<usize> = index
            .query(&[1.0, 0.0], 3)
            .unwrap()
            .iter()
            .map(|r| r.chunk.id)
            .collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }

    #[test]
    fn test_query_argument_errors() {
        let index = three_vector_index();
        assert!(matches!(
            index.query(&[1.0, 0.0], 0),
            Err(RagError::InvalidArgument(_))
        ));
        assert!(matches!(
            index.query(&[1.0, 0.0, 0.0], 1),
            Err(RagError::InvalidArgument(_))
        ));

        let empty = VectorIndex::from_parts(vec![], vec![], "test:d2", 2, Metric::Cosine).unwrap();
        assert!(empty.is_empty());
        assert!(matches!(
            empty.query(&[1.0, 0.0], 1),
            Err(RagError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_from_parts_validates_invariants() {
        let wrong_dim = VectorIndex::from_parts(
            vec![chunk(0, "a")],
            vec![vec![1.0, 0.0, 0.0]],
            "test:d2",
            2,
            Metric::Cosine,
        );
        assert!(matches!(wrong_dim, Err(RagError::Embedding { .. })));

        let duplicate = VectorIndex::from_parts(
            vec![chunk(1, "a"), chunk(1, "b")],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            "test:d2",
            2,
            Metric::Cosine,
        );
        assert!(matches!(duplicate, Err(RagError::InvalidArgument(_))));

        let mismatched = VectorIndex::from_parts(
            vec![chunk(0, "a")],
            vec![],
            "test:d2",
            2,
            Metric::Cosine,
        );
        assert!(matches!(mismatched, Err(RagError::InvalidArgument(_))));
    }

    #[test]
    fn test_non_finite_vectors_are_rejected() {
        let stored_nan = VectorIndex::from_parts(
            vec![chunk(0, "a"), chunk(1, "b")],
            vec![vec![1.0, 0.0], vec![f32::NAN, 0.0]],
            "test:d2",
            2,
            Metric::Cosine,
        );
        match stored_nan {
            Err(RagError::Embedding { target, .. }) => assert_eq!(target, "chunk 1"),
            other => panic!("expected embedding error, got {:?}", other),
        }

        let index = three_vector_index();
        assert!(matches!(
            index.query(&[f32::NAN, 0.0], 2),
            Err(RagError::InvalidArgument(_))
        ));
        assert!(matches!(
            index.query(&[f32::INFINITY, 0.0], 2),
            Err(RagError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_lookup_by_id() {
        let index = three_vector_index();
        assert_eq!(index.get(2).map(|e| e.chunk.text.as_str()), Some("north-east"));
        assert!(index.get(7).is_none());
    }

    #[test]
    fn test_euclidean_metric_prefers_nearest() {
        let index = VectorIndex::from_parts(
            vec![chunk(0, "near"), chunk(1, "far")],
            vec![vec![1.0, 1.0], vec![10.0, 10.0]],
            "test:d2",
            2,
            Metric::Euclidean,
        )
        .unwrap();

        let results = index.query(&[1.0, 1.0], 2).unwrap();
        assert_eq!(results[0].chunk.id, 0);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert!(results[1].score < results[0].score);
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &[0.0, 1.0, 0.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_build_preserves_chunk_order() {
        let chunks = chunk_text("alpha beta gamma delta epsilon", 6, 1).unwrap();
        let embedder = ScriptedEmbedder::new(4).with_jitter();

        let index = VectorIndex::build(
            chunks.clone(),
            &embedder,
            BuildOptions {
                concurrency: 3,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let stored: Vec<&Chunk> = index.chunks().collect();
        assert_eq!(stored.len(), chunks.len());
        for (stored, original) in stored.iter().zip(&chunks) {
            assert_eq!(*stored, original);
        }
        assert_eq!(index.embedder_id(), embedder.model_id());
        assert_eq!(embedder.calls(), chunks.len());
    }

    #[tokio::test]
    async fn test_build_is_atomic_on_embed_failure() {
        let chunks = chunk_text("one two three four five six", 4, 0).unwrap();
        let embedder = ScriptedEmbedder::new(4).failing_on("thre");

        let result = VectorIndex::build(chunks, &embedder, BuildOptions::default()).await;
        match result {
            Err(RagError::Embedding { target, .. }) => assert_eq!(target, "chunk 2"),
            other => panic!("expected embedding error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_build_rejects_wrong_dimension() {
        let chunks = chunk_text("some text here", 5, 0).unwrap();
        let embedder = ScriptedEmbedder::new(4).wrong_dimension_on("text ");

        let result = VectorIndex::build(chunks, &embedder, BuildOptions::default()).await;
        assert!(matches!(result, Err(RagError::Embedding { .. })));
    }

    #[tokio::test]
    async fn test_build_rejects_infinite_component() {
        let chunks = vec![chunk(0, "fine"), chunk(1, "broken")];
        let embedder = FixedEmbedder::new("fixed:d2", 2)
            .with("fine", vec![1.0, 0.0])
            .with("broken", vec![f32::INFINITY, 0.0]);

        let result = VectorIndex::build(chunks, &embedder, BuildOptions::default()).await;
        match result {
            Err(RagError::Embedding { target, reason }) => {
                assert_eq!(target, "chunk 1");
                assert!(reason.contains("non-finite"));
            }
            other => panic!("expected embedding error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_build_times_out() {
        let chunks = chunk_text("slow text", 4, 0).unwrap();
        let embedder = ScriptedEmbedder::new(4).with_delay(Duration::from_secs(5));

        let result = VectorIndex::build(
            chunks,
            &embedder,
            BuildOptions {
                timeout: Duration::from_millis(10),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(RagError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_build_rejects_zero_concurrency() {
        let embedder = ScriptedEmbedder::new(4);
        let result = VectorIndex::build(
            vec![chunk(0, "x")],
            &embedder,
            BuildOptions {
                concurrency: 0,
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(RagError::InvalidArgument(_))));
    }
}
