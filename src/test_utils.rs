//! Scripted capabilities for unit tests.

use crate::chunker::Chunk;
use crate::embedding::{Embedder, HashingEmbedder};
use crate::error::{RagError, Result};
use crate::eval::{EvalCase, Judge, JudgeScores};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn chunk(id: usize, text: &str) -> Chunk {
    let len = text.chars().count();
    Chunk {
        id,
        text: text.to_string(),
        start_offset: id * len,
        end_offset: id * len + len,
    }
}

/// Hashing embedder with injectable failures, delays and call counting.
pub struct ScriptedEmbedder {
    inner: HashingEmbedder,
    model_id: String,
    fail_on: Option<String>,
    wrong_dimension_on: Option<String>,
    delay: Option<Duration>,
    jitter: bool,
    calls: AtomicUsize,
}

impl ScriptedEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            inner: HashingEmbedder::new(dimension).expect("non-zero dimension"),
            model_id: format!("scripted:d{}", dimension),
            fail_on: None,
            wrong_dimension_on: None,
            delay: None,
            jitter: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail for any text containing `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    /// Return a vector one component too long for texts containing `needle`.
    pub fn wrong_dimension_on(mut self, needle: &str) -> Self {
        self.wrong_dimension_on = Some(needle.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep longer on earlier calls so completions arrive out of order.
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for ScriptedEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.jitter {
            let millis = 20u64.saturating_sub(call as u64 * 5);
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }

        if let Some(needle) = &self.fail_on {
            if text.contains(needle.as_str()) {
                return Err(RagError::Http("connection reset by peer".to_string()));
            }
        }

        let mut vector = self.inner.embed_sync(text);
        if let Some(needle) = &self.wrong_dimension_on {
            if text.contains(needle.as_str()) {
                vector.push(0.0);
            }
        }
        Ok(vector)
    }
}

/// Embedder that only knows a fixed table of texts.
pub struct FixedEmbedder {
    model_id: String,
    dimension: usize,
    table: HashMap<String, Vec<f32>>,
}

impl FixedEmbedder {
    pub fn new(model_id: &str, dimension: usize) -> Self {
        Self {
            model_id: model_id.to_string(),
            dimension,
            table: HashMap::new(),
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.table.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl Embedder for FixedEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.table
            .get(text)
            .cloned()
            .ok_or_else(|| RagError::query_embedding(format!("no vector for '{}'", text)))
    }
}

/// Judge returning the same scores for every case.
pub struct FixedJudge {
    pub scores: JudgeScores,
    pub delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FixedJudge {
    pub fn new(correctness: f64, faithfulness: f64, contextual_relevancy: f64) -> Self {
        Self {
            scores: JudgeScores {
                correctness,
                faithfulness,
                contextual_relevancy,
            },
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Judge for FixedJudge {
    async fn score(&self, _case: &EvalCase) -> Result<JudgeScores> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.scores.clone())
    }
}
