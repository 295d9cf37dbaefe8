//! End-to-end evaluation: chunk, index, retrieve, answer, judge.

use super::dataset::{Dataset, DatasetItem};
use super::evaluator::{EvalCase, Thresholds, evaluate_case};
use super::judge::Judge;
use super::report::{EvalReport, ItemResult};
use crate::chunker::ChunkConfig;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::index::{BuildOptions, VectorIndex};
use crate::llm::{LlmClient, Prompts};
use crate::retriever::{Retriever, format_context};
use crate::retry::with_timeout;
use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use twox_hash::XxHash64;

/// Produces an answer to a question from retrieved context.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn answer(&self, question: &str, context: &str) -> Result<String>;
}

#[async_trait]
impl AnswerGenerator for LlmClient {
    async fn answer(&self, question: &str, context: &str) -> Result<String> {
        let prompt = Prompts::rag_answer()
            .replace("{question}", question)
            .replace("{context}", context);

        let answer = self.complete(None, &prompt).await?;
        Ok(answer.trim().to_string())
    }
}

/// Settings for an evaluation run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub chunking: ChunkConfig,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    pub build: BuildOptions,
    /// Bound on embedding the question.
    pub retrieval_timeout: Duration,
    /// Bound on generating an answer.
    pub generation_timeout: Duration,
    /// Bound on judging one case.
    pub judge_timeout: Duration,
    pub thresholds: Thresholds,
    /// Maximum items to evaluate (for quick testing).
    pub max_items: Option<usize>,
    /// Abort on the first item error instead of recording it.
    pub fail_fast: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkConfig::default(),
            top_k: 3,
            build: BuildOptions::default(),
            retrieval_timeout: Duration::from_secs(30),
            generation_timeout: Duration::from_secs(120),
            judge_timeout: Duration::from_secs(120),
            thresholds: Thresholds::default(),
            max_items: None,
            fail_fast: false,
        }
    }
}

impl RunnerConfig {
    /// Derive run settings from the application config.
    ///
    /// LLM-backed steps are bounded by the worst case of their retry loop,
    /// so exhausted retries surface as such rather than as a timeout.
    pub fn from_config(config: &Config) -> Self {
        let llm_budget = config.retry.worst_case(config.llm.timeout());
        Self {
            chunking: config.chunking.clone(),
            top_k: config.retrieval.top_k,
            build: config.retrieval.build_options(),
            retrieval_timeout: config.retrieval.timeout(),
            generation_timeout: llm_budget,
            judge_timeout: llm_budget,
            thresholds: config.thresholds,
            max_items: None,
            fail_fast: false,
        }
    }
}

/// Key for the per-document index cache.
fn document_hash(document: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(document.as_bytes());
    hasher.finish()
}

/// Runs every dataset item through retrieval, generation and judging.
pub struct EvalRunner {
    config: RunnerConfig,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn AnswerGenerator>,
    judge: Arc<dyn Judge>,
    /// Built indexes keyed by document hash, shared by items on one document.
    index_cache: Arc<RwLock<HashMap<u64, Arc<VectorIndex>>>>,
}

impl EvalRunner {
    /// Create a runner. Chunking, `top_k` and thresholds are checked up front.
    pub fn new(
        config: RunnerConfig,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn AnswerGenerator>,
        judge: Arc<dyn Judge>,
    ) -> Result<Self> {
        config.chunking.validate()?;
        config.thresholds.validate()?;
        if config.top_k == 0 {
            return Err(RagError::InvalidArgument("top_k must be at least 1".to_string()));
        }

        Ok(Self {
            config,
            embedder,
            generator,
            judge,
            index_cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Evaluate a dataset.
    ///
    /// Item failures are recorded in the report unless `fail_fast` is set,
    /// in which case the first one is returned.
    pub async fn run(&self, dataset: &Dataset) -> Result<EvalReport> {
        let start_time = Instant::now();
        let mut report = EvalReport::new(&dataset.name, self.config.thresholds);

        let items: Vec<_> = match self.config.max_items {
            Some(max) => dataset.items.iter().take(max).collect(),
            None => dataset.items.iter().collect(),
        };

        info!(dataset = %dataset.name, items = items.len(), "running evaluation");

        for (idx, item) in items.iter().enumerate() {
            debug!(item = %item.id, position = idx + 1, total = items.len(), "processing item");

            match self.process_item(item).await {
                Ok(result) => {
                    info!(item = %item.id, passed = result.passed(), "item judged");
                    report.item_results.push(result);
                }
                Err(e) if self.config.fail_fast => return Err(e),
                Err(e) => {
                    warn!(item = %item.id, error = %e, "item failed");
                    report
                        .item_results
                        .push(ItemResult::failed(&item.id, &item.question, e.to_string()));
                }
            }
        }

        report.total_time_secs = start_time.elapsed().as_secs_f64();
        report.calculate_summary();

        info!(
            passed = report.passed,
            failed = report.failed,
            errors = report.errors,
            "evaluation finished"
        );
        Ok(report)
    }

    /// Process a single dataset item.
    async fn process_item(&self, item: &DatasetItem) -> Result<ItemResult> {
        let start = Instant::now();

        let index = self.index_for(&item.document).await?;
        let retriever = Retriever::new(
            index,
            Arc::clone(&self.embedder),
            self.config.top_k,
            self.config.retrieval_timeout,
        )?;
        let scored = retriever.retrieve_scored(&item.question).await?;
        let retrieval_time_ms = start.elapsed().as_millis() as u64;

        let context = format_context(&scored);
        let answer = with_timeout(
            self.config.generation_timeout,
            "generating answer",
            self.generator.answer(&item.question, &context),
        )
        .await?;

        let case = EvalCase {
            question: item.question.clone(),
            retrieved_chunks: scored.into_iter().map(|r| r.chunk.text).collect(),
            generated_answer: answer,
            expected_answer: item.expected_answer.clone(),
        };

        let outcome = evaluate_case(
            self.judge.as_ref(),
            &case,
            &self.config.thresholds,
            self.config.judge_timeout,
        )
        .await?;

        Ok(ItemResult {
            item_id: item.id.clone(),
            question: case.question,
            retrieved_chunks: case.retrieved_chunks,
            generated_answer: Some(case.generated_answer),
            outcome: Some(outcome),
            retrieval_time_ms: Some(retrieval_time_ms),
            error: None,
        })
    }

    /// Return the cached index for `document`, building it on a miss.
    async fn index_for(&self, document: &str) -> Result<Arc<VectorIndex>> {
        let key = document_hash(document);

        if let Some(index) = self.index_cache.read().await.get(&key) {
            debug!(key, "using cached index");
            return Ok(Arc::clone(index));
        }

        let chunks = self.config.chunking.chunk(document)?;
        let index = Arc::new(
            VectorIndex::build(chunks, self.embedder.as_ref(), self.config.build).await?,
        );

        self.index_cache
            .write()
            .await
            .insert(key, Arc::clone(&index));
        Ok(index)
    }

    /// Number of distinct documents indexed so far.
    pub async fn cached_indexes(&self) -> usize {
        self.index_cache.read().await.len()
    }
}
