//! Configuration for the retrieval index and evaluation pipeline.
//!
//! Supports both environment variables and a YAML config file.
//! Environment variables take precedence over config file values. The
//! loaded [`Config`] is handed explicitly to the clients and embedders that
//! need it; nothing reads the environment after load time.

use crate::chunker::ChunkConfig;
use crate::error::{RagError, Result};
use crate::eval::Thresholds;
use crate::index::{BuildOptions, Metric};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// LLM configuration for answer generation and judging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL for the LLM API (e.g., "https://api.openai.com")
    pub api_base: String,

    /// API key for authentication
    pub api_key: String,

    /// Model name (e.g., "gpt-4o-mini")
    pub model: String,

    /// Maximum tokens for response
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// Per-request time bound in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1024,
            temperature: 0.0,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which embedding strategy to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// OpenAI-compatible `/v1/embeddings` endpoint.
    OpenAi,
    /// Offline feature hashing.
    Hashing,
    /// Sentence-transformer model run locally (feature `local-embeddings`).
    Local,
}

impl EmbeddingProvider {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "hashing" | "hash" => Some(Self::Hashing),
            "local" => Some(Self::Local),
            _ => None,
        }
    }
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,

    /// Base URL for the embeddings API
    pub api_base: String,

    /// API key for authentication
    pub api_key: String,

    /// Model name or Hugging Face model id
    pub model: String,

    /// Vector dimensionality produced by the model
    pub dimension: usize,

    /// Per-request time bound in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hashing,
            api_base: String::new(),
            api_key: String::new(),
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Index build and query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks returned per question
    pub top_k: usize,

    /// Maximum embedding calls in flight while building
    pub concurrency: usize,

    /// Bound on each embedding call, in seconds
    pub timeout_secs: u64,

    pub metric: Metric,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            concurrency: 4,
            timeout_secs: 30,
            metric: Metric::Cosine,
        }
    }
}

impl RetrievalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Options for [`VectorIndex::build`](crate::index::VectorIndex::build).
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            concurrency: self.concurrency,
            timeout: self.timeout(),
            metric: self.metric,
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// LLM settings
    pub llm: LlmConfig,
    /// Embedding settings
    pub embedding: EmbeddingConfig,
    /// Chunking settings
    pub chunking: ChunkConfig,
    /// Retrieval settings
    pub retrieval: RetrievalConfig,
    /// Retry policy for HTTP-backed capabilities
    pub retry: RetryPolicy,
    /// Pass thresholds for evaluation
    pub thresholds: Thresholds,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (LLM_API_BASE, LLM_API_KEY, LLM_MODEL, EMBEDDING_*)
    /// 2. Config file (~/.config/rust-rag-indexer/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                config = Self::load_from_file(&config_path)?;
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text; missing sections keep defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| RagError::Config(format!("Failed to parse config file: {}", e)))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(api_base) = env::var("LLM_API_BASE") {
            self.llm.api_base = api_base;
        }

        if let Ok(api_key) = env::var("LLM_API_KEY") {
            self.llm.api_key = api_key;
        }

        if let Ok(model) = env::var("LLM_MODEL") {
            self.llm.model = model;
        }

        if let Ok(provider) = env::var("EMBEDDING_PROVIDER") {
            if let Some(provider) = EmbeddingProvider::parse(&provider) {
                self.embedding.provider = provider;
            }
        }

        if let Ok(api_base) = env::var("EMBEDDING_API_BASE") {
            self.embedding.api_base = api_base;
        }

        if let Ok(api_key) = env::var("EMBEDDING_API_KEY") {
            self.embedding.api_key = api_key;
        }

        if let Ok(model) = env::var("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }

        if let Ok(dimension) = env::var("EMBEDDING_DIMENSION") {
            if let Ok(dimension) = dimension.parse() {
                self.embedding.dimension = dimension;
            }
        }
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rust-rag-indexer")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate the settings needed to build and query an index.
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;

        if self.retrieval.top_k == 0 {
            return Err(RagError::Config("retrieval.top_k must be at least 1".to_string()));
        }

        if self.retrieval.concurrency == 0 {
            return Err(RagError::Config(
                "retrieval.concurrency must be at least 1".to_string(),
            ));
        }

        if self.embedding.dimension == 0 {
            return Err(RagError::Config(
                "embedding.dimension must be at least 1".to_string(),
            ));
        }

        if self.embedding.provider == EmbeddingProvider::OpenAi {
            if self.embedding.api_base.is_empty() {
                return Err(RagError::Config(
                    "Embedding API base URL is required. Set EMBEDDING_API_BASE environment variable or add to config file.".to_string()
                ));
            }
            if self.embedding.api_key.is_empty() {
                return Err(RagError::Config(
                    "Embedding API key is required. Set EMBEDDING_API_KEY environment variable or add to config file.".to_string()
                ));
            }
        }

        Ok(())
    }

    /// Validate the settings needed to call the LLM.
    pub fn validate_llm(&self) -> Result<()> {
        if self.llm.api_base.is_empty() {
            return Err(RagError::Config(
                "LLM API base URL is required. Set LLM_API_BASE environment variable or add to config file.".to_string()
            ));
        }

        if self.llm.api_key.is_empty() {
            return Err(RagError::Config(
                "LLM API key is required. Set LLM_API_KEY environment variable or add to config file.".to_string()
            ));
        }

        if self.llm.model.is_empty() {
            return Err(RagError::Config(
                "LLM model is required. Set LLM_MODEL environment variable or add to config file."
                    .to_string(),
            ));
        }

        self.thresholds.validate()
    }

    /// Create a config from explicit LLM values (useful for testing).
    pub fn with_llm(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            llm: LlmConfig {
                api_base: api_base.into(),
                api_key: api_key.into(),
                model: model.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.llm.api_base.is_empty());
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.temperature, 0.0);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Hashing);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.chunking, ChunkConfig::default());
    }

    #[test]
    fn test_default_config_is_valid_offline() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_llm_fails_without_required_fields() {
        assert!(Config::default().validate_llm().is_err());
    }

    #[test]
    fn test_openai_embeddings_require_credentials() {
        let mut config = Config::default();
        config.embedding.provider = EmbeddingProvider::OpenAi;
        assert!(matches!(config.validate(), Err(RagError::Config(_))));
    }

    #[test]
    fn test_invalid_chunking_rejected() {
        let mut config = Config::default();
        config.chunking = ChunkConfig::new(100, 100);
        assert!(matches!(
            config.validate(),
            Err(RagError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
llm:
  api_base: https://api.example.com
  api_key: secret
embedding:
  provider: openai
  dimension: 768
chunking:
  chunk_size: 400
  chunk_overlap: 40
retrieval:
  metric: euclidean
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.llm.api_base, "https://api.example.com");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.embedding.provider, EmbeddingProvider::OpenAi);
        assert_eq!(config.embedding.dimension, 768);
        assert_eq!(config.chunking, ChunkConfig::new(400, 40));
        assert_eq!(config.retrieval.metric, Metric::Euclidean);
        assert_eq!(config.retrieval.top_k, 3);
    }

    #[test]
    fn test_with_llm() {
        let config = Config::with_llm("https://api.example.com", "test-key", "gpt-4");
        assert_eq!(config.llm.api_base, "https://api.example.com");
        assert_eq!(config.llm.api_key, "test-key");
        assert_eq!(config.llm.model, "gpt-4");
        assert!(config.validate_llm().is_ok());
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(EmbeddingProvider::parse("OpenAI"), Some(EmbeddingProvider::OpenAi));
        assert_eq!(EmbeddingProvider::parse("hash"), Some(EmbeddingProvider::Hashing));
        assert_eq!(EmbeddingProvider::parse("nope"), None);
    }
}
