//! Aggregated results of an evaluation run.

use super::evaluator::{CaseOutcome, Thresholds};
use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Results for a single item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResult {
    /// Item ID.
    pub item_id: String,
    pub question: String,
    /// Retrieved chunk texts in rank order.
    pub retrieved_chunks: Vec<String>,
    /// Answer generated from the retrieved chunks.
    pub generated_answer: Option<String>,
    /// Judge verdict, absent when the item failed before judging finished.
    pub outcome: Option<CaseOutcome>,
    /// Retrieval time, including any index build for the document.
    pub retrieval_time_ms: Option<u64>,
    /// Error message if any.
    pub error: Option<String>,
}

impl ItemResult {
    /// An item that failed with `error` before producing an outcome.
    pub fn failed(item_id: &str, question: &str, error: String) -> Self {
        Self {
            item_id: item_id.to_string(),
            question: question.to_string(),
            retrieved_chunks: Vec::new(),
            generated_answer: None,
            outcome: None,
            retrieval_time_ms: None,
            error: Some(error),
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome.as_ref().is_some_and(|o| o.passed)
    }
}

/// Aggregated evaluation results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    /// Dataset name.
    pub dataset_name: String,
    pub thresholds: Thresholds,
    /// Total items evaluated.
    pub total_items: usize,
    /// Items passing every metric.
    pub passed: usize,
    /// Items failing a metric or erroring.
    pub failed: usize,
    /// Items that errored before a verdict.
    pub errors: usize,
    pub correctness_passed: usize,
    pub faithfulness_passed: usize,
    pub contextual_relevancy_passed: usize,
    /// Averages over judged items only.
    pub avg_correctness: f64,
    pub avg_faithfulness: f64,
    pub avg_contextual_relevancy: f64,
    /// Average retrieval time (ms).
    pub avg_retrieval_time_ms: f64,
    /// Individual item results.
    pub item_results: Vec<ItemResult>,
    /// Total run time (seconds).
    pub total_time_secs: f64,
}

impl EvalReport {
    /// Create empty results.
    pub fn new(dataset_name: &str, thresholds: Thresholds) -> Self {
        Self {
            dataset_name: dataset_name.to_string(),
            thresholds,
            total_items: 0,
            passed: 0,
            failed: 0,
            errors: 0,
            correctness_passed: 0,
            faithfulness_passed: 0,
            contextual_relevancy_passed: 0,
            avg_correctness: 0.0,
            avg_faithfulness: 0.0,
            avg_contextual_relevancy: 0.0,
            avg_retrieval_time_ms: 0.0,
            item_results: Vec::new(),
            total_time_secs: 0.0,
        }
    }

    /// Recompute summary statistics from item results.
    pub fn calculate_summary(&mut self) {
        self.total_items = self.item_results.len();
        self.passed = self.item_results.iter().filter(|r| r.passed()).count();
        self.failed = self.total_items - self.passed;
        self.errors = self.item_results.iter().filter(|r| r.error.is_some()).count();

        let outcomes: Vec<&CaseOutcome> = self
            .item_results
            .iter()
            .filter_map(|r| r.outcome.as_ref())
            .collect();

        self.correctness_passed = outcomes.iter().filter(|o| o.correctness_passed).count();
        self.faithfulness_passed = outcomes.iter().filter(|o| o.faithfulness_passed).count();
        self.contextual_relevancy_passed = outcomes
            .iter()
            .filter(|o| o.contextual_relevancy_passed)
            .count();

        self.avg_correctness = mean(outcomes.iter().map(|o| o.scores.correctness));
        self.avg_faithfulness = mean(outcomes.iter().map(|o| o.scores.faithfulness));
        self.avg_contextual_relevancy =
            mean(outcomes.iter().map(|o| o.scores.contextual_relevancy));
        self.avg_retrieval_time_ms = mean(
            self.item_results
                .iter()
                .filter_map(|r| r.retrieval_time_ms)
                .map(|t| t as f64),
        );
    }

    /// Fraction of items that passed, 0 for an empty run.
    pub fn pass_rate(&self) -> f64 {
        if self.total_items == 0 {
            0.0
        } else {
            self.passed as f64 / self.total_items as f64
        }
    }

    /// Print summary to stdout.
    pub fn print_summary(&self) {
        let percent = |n: usize| {
            if self.total_items > 0 {
                n as f64 / self.total_items as f64 * 100.0
            } else {
                0.0
            }
        };

        println!("\n========== Evaluation Results ==========");
        println!("Dataset: {}", self.dataset_name);
        println!("Total items: {}", self.total_items);
        println!("----------------------------------------");
        println!("Passed: {} ({:.1}%)", self.passed, percent(self.passed));
        println!("Failed: {} ({:.1}%)", self.failed, percent(self.failed));
        println!("Errors: {}", self.errors);
        println!("----------------------------------------");
        println!(
            "Correctness:          avg {:.2}, passed {} (threshold {:.2})",
            self.avg_correctness, self.correctness_passed, self.thresholds.correctness
        );
        println!(
            "Faithfulness:         avg {:.2}, passed {} (threshold {:.2})",
            self.avg_faithfulness, self.faithfulness_passed, self.thresholds.faithfulness
        );
        println!(
            "Contextual relevancy: avg {:.2}, passed {} (threshold {:.2})",
            self.avg_contextual_relevancy,
            self.contextual_relevancy_passed,
            self.thresholds.contextual_relevancy
        );
        println!("----------------------------------------");
        println!("Avg retrieval time: {:.0}ms", self.avg_retrieval_time_ms);
        println!("Total time: {:.1}s", self.total_time_secs);
        println!("========================================\n");
    }

    /// Save the full report as pretty JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| RagError::Serialization(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| RagError::io(path, e))
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}
