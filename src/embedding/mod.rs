//! Embedding capability.
//!
//! The index and retriever only see the [`Embedder`] trait. Which concrete
//! strategy backs it is decided once, when [`from_config`] builds it.

mod hashing;
#[cfg(feature = "local-embeddings")]
mod local;
mod openai;

pub use hashing::HashingEmbedder;
#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;
pub use openai::OpenAiEmbedder;

use crate::config::{EmbeddingConfig, EmbeddingProvider};
use crate::error::Result;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::sync::Arc;

/// Maps text to a fixed-length vector.
///
/// Implementations must be pinned: the same `model_id` always produces
/// vectors of `dimension()` components in the same space, so index vectors
/// and query vectors stay comparable.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider, model and dimension
    /// (e.g. `openai:text-embedding-3-small:d1536`).
    fn model_id(&self) -> &str;

    /// Vector dimensionality (D).
    fn dimension(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Build the embedder selected by `config.provider`.
pub fn from_config(config: &EmbeddingConfig, retry: RetryPolicy) -> Result<Arc<dyn Embedder>> {
    match config.provider {
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(config.dimension)?)),
        EmbeddingProvider::OpenAi => Ok(Arc::new(OpenAiEmbedder::new(config.clone(), retry)?)),
        EmbeddingProvider::Local => local_from_config(config),
    }
}

#[cfg(feature = "local-embeddings")]
fn local_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    Ok(Arc::new(LocalEmbedder::load(&config.model)?))
}

#[cfg(not(feature = "local-embeddings"))]
fn local_from_config(_config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    Err(crate::error::RagError::Config(
        "local embeddings require building with the `local-embeddings` feature".to_string(),
    ))
}

/// Scale `v` to unit length in place. Zero vectors are left as they are.
pub(crate) fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_hashing() {
        let config = EmbeddingConfig {
            provider: EmbeddingProvider::Hashing,
            dimension: 64,
            ..Default::default()
        };
        let embedder = from_config(&config, RetryPolicy::none()).unwrap();
        assert_eq!(embedder.dimension(), 64);
        assert_eq!(embedder.model_id(), "hashing:xxh64:d64");
    }

    #[cfg(not(feature = "local-embeddings"))]
    #[test]
    fn test_local_requires_feature() {
        let config = EmbeddingConfig {
            provider: EmbeddingProvider::Local,
            ..Default::default()
        };
        assert!(matches!(
            from_config(&config, RetryPolicy::none()),
            Err(crate::error::RagError::Config(_))
        ));
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }
}
