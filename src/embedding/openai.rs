//! OpenAI-compatible embeddings client.

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result, classify_failure};
use crate::retry::{RetryPolicy, retry_with_backoff};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embedder backed by a remote `/v1/embeddings` endpoint.
///
/// Rate limiting (HTTP 429) and server errors are retried with the
/// configured [`RetryPolicy`]; other failures surface immediately.
pub struct OpenAiEmbedder {
    client: Client,
    config: EmbeddingConfig,
    retry: RetryPolicy,
    model_id: String,
}

impl OpenAiEmbedder {
    pub fn new(config: EmbeddingConfig, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        let model_id = format!("openai:{}:d{}", config.model, config.dimension);
        Ok(Self {
            client,
            config,
            retry,
            model_id,
        })
    }

    /// Get the API endpoint URL.
    fn endpoint(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        format!("{}/v1/embeddings", base)
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: vec![text],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(classify_failure(status, &body, "Embedding request failed"));
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&body)?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| RagError::query_embedding("response contained no embeddings"))
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(model = %self.config.model, chars = text.len(), "requesting embedding");
        retry_with_backoff(&self.retry, "embedding request", move || self.request(text)).await
    }
}
