//! Local sentence-transformer embeddings using candle.

use super::Embedder;
use crate::error::{RagError, Result};
use async_trait::async_trait;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use hf_hub::{Repo, RepoType, api::sync::Api};
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::info;

/// Default model: 384-dimensional all-MiniLM-L6-v2.
pub const DEFAULT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

fn load_err(what: &str, e: impl std::fmt::Display) -> RagError {
    RagError::Config(format!("{}: {}", what, e))
}

fn model_err(e: impl std::fmt::Display) -> RagError {
    RagError::Embedding {
        target: "local model".to_string(),
        reason: e.to_string(),
    }
}

/// Model weights and tokenizer, shared with blocking inference tasks.
struct Encoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

/// BERT-style encoder with masked mean pooling and L2 normalization.
///
/// Inference runs on tokio's blocking pool so timeouts around
/// [`Embedder::embed`] stay effective and concurrent calls run in parallel.
pub struct LocalEmbedder {
    encoder: Arc<Encoder>,
    dimension: usize,
    model_id: String,
}

/// Reject names that are not a Hugging Face `owner/name` repo id.
fn check_model_name(model_name: &str) -> Result<()> {
    let mut parts = model_name.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => Ok(()),
        _ => Err(RagError::Config(format!(
            "local embedding model '{}' is not a Hugging Face repo id (e.g. {})",
            model_name, DEFAULT_MODEL
        ))),
    }
}

impl LocalEmbedder {
    /// Load a sentence-transformers model by name from the Hugging Face Hub.
    pub fn load(model_name: &str) -> Result<Self> {
        check_model_name(model_name)?;
        info!(model = model_name, "loading local embedding model");

        let device = Device::Cpu;

        let api = Api::new().map_err(|e| load_err("Failed to create HF Hub API", e))?;
        let repo = api.repo(Repo::new(model_name.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .map_err(|e| load_err("Failed to get config.json", e))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| load_err("Failed to get tokenizer.json", e))?;
        let weights_path = repo
            .get("model.safetensors")
            .or_else(|_| repo.get("pytorch_model.bin"))
            .map_err(|e| load_err("Failed to get model weights", e))?;

        let raw_config =
            std::fs::read_to_string(&config_path).map_err(|e| RagError::io(&config_path, e))?;
        let config: BertConfig = serde_json::from_str(&raw_config)
            .map_err(|e| load_err("Failed to parse model config", e))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| load_err("Failed to load tokenizer", e))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)
                .map_err(|e| load_err("Failed to load model weights", e))?
        };

        let model =
            BertModel::load(vb, &config).map_err(|e| load_err("Failed to load BERT model", e))?;

        let encoder = Encoder {
            model,
            tokenizer,
            device,
        };

        // The hidden size is whatever the loaded weights produce.
        let sample = encoder.embed_batch(&["dimension check"])?;
        let dimension = sample.first().map(Vec::len).unwrap_or(0);

        Ok(Self {
            encoder: Arc::new(encoder),
            dimension,
            model_id: format!("local:{}:d{}", model_name, dimension),
        })
    }

    /// Generate embeddings for a batch of texts on the calling thread.
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.encoder.embed_batch(texts)
    }
}

impl Encoder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(model_err)?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids_vec = Vec::new();
        let mut attention_mask_vec = Vec::new();

        for encoding in &encodings {
            let mut padded_ids = encoding.get_ids().to_vec();
            let mut padded_mask = encoding.get_attention_mask().to_vec();
            padded_ids.resize(max_len, 0);
            padded_mask.resize(max_len, 0);

            input_ids_vec.extend(padded_ids);
            attention_mask_vec.extend(padded_mask);
        }

        let batch_size = texts.len();
        let token_type_ids_vec = vec![0u32; batch_size * max_len];

        let input_ids = Tensor::from_vec(input_ids_vec, (batch_size, max_len), &self.device)
            .map_err(model_err)?;
        let attention_mask =
            Tensor::from_vec(attention_mask_vec, (batch_size, max_len), &self.device)
                .map_err(model_err)?;
        let token_type_ids =
            Tensor::from_vec(token_type_ids_vec, (batch_size, max_len), &self.device)
                .map_err(model_err)?;

        let pooled = self
            .forward_pooled(&input_ids, &token_type_ids, &attention_mask)
            .map_err(model_err)?;

        pooled.to_vec2::<f32>().map_err(model_err)
    }

    /// Masked mean pooling followed by L2 normalization.
    fn forward_pooled(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> candle_core::Result<Tensor> {
        let output = self
            .model
            .forward(input_ids, token_type_ids, Some(attention_mask))?;

        let mask = attention_mask
            .unsqueeze(2)?
            .to_dtype(output.dtype())?
            .broadcast_as(output.shape())?;

        let summed = (output * &mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
        let mean = (summed / counts)?;

        let norms = mean.sqr()?.sum_keepdim(1)?.sqrt()?;
        mean.broadcast_div(&norms)
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoder = Arc::clone(&self.encoder);
        let text = text.to_string();
        let batch = tokio::task::spawn_blocking(move || encoder.embed_batch(&[text.as_str()]))
            .await
            .map_err(|e| model_err(format!("inference task failed: {}", e)))??;

        batch
            .into_iter()
            .next()
            .ok_or_else(|| model_err("model returned no embedding"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_name_must_be_repo_id() {
        assert!(check_model_name(DEFAULT_MODEL).is_ok());
        for name in ["text-embedding-3-small", "/model", "owner/", "a/b/c"] {
            assert!(
                matches!(check_model_name(name), Err(RagError::Config(_))),
                "{} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_load_rejects_non_hub_name_before_downloading() {
        assert!(matches!(
            LocalEmbedder::load("text-embedding-3-small"),
            Err(RagError::Config(_))
        ));
    }
}
