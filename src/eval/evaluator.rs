//! Threshold-based pass/fail for judged retrievals.

use super::judge::{Judge, JudgeScores};
use crate::error::{RagError, Result};
use crate::retry::with_timeout;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Everything a judge sees for one retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalCase {
    pub question: String,
    /// Retrieved chunk texts in rank order.
    pub retrieved_chunks: Vec<String>,
    pub generated_answer: String,
    pub expected_answer: String,
}

/// Minimum score each metric must reach for a case to pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub correctness: f64,
    pub faithfulness: f64,
    pub contextual_relevancy: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            correctness: 0.5,
            faithfulness: 0.5,
            contextual_relevancy: 0.5,
        }
    }
}

impl Thresholds {
    /// Every threshold must lie in `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in self.named() {
            if !(0.0..=1.0).contains(&value) {
                return Err(RagError::InvalidArgument(format!(
                    "{} threshold must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Compare scores against the thresholds. A metric passes at or above
    /// its threshold.
    pub fn apply(&self, scores: JudgeScores) -> CaseOutcome {
        let correctness_passed = scores.correctness >= self.correctness;
        let faithfulness_passed = scores.faithfulness >= self.faithfulness;
        let contextual_relevancy_passed = scores.contextual_relevancy >= self.contextual_relevancy;

        CaseOutcome {
            scores,
            correctness_passed,
            faithfulness_passed,
            contextual_relevancy_passed,
            passed: correctness_passed && faithfulness_passed && contextual_relevancy_passed,
        }
    }

    fn named(&self) -> [(&'static str, f64); 3] {
        [
            ("correctness", self.correctness),
            ("faithfulness", self.faithfulness),
            ("contextual_relevancy", self.contextual_relevancy),
        ]
    }
}

/// Judged scores of one case and the verdict for each metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub scores: JudgeScores,
    pub correctness_passed: bool,
    pub faithfulness_passed: bool,
    pub contextual_relevancy_passed: bool,
    /// True only when all three metrics pass.
    pub passed: bool,
}

/// Score `case` with `judge` and apply `thresholds`.
///
/// The judge call is bounded by `timeout`. Scores outside `[0, 1]` are a
/// judging failure, never clamped.
pub async fn evaluate_case(
    judge: &dyn Judge,
    case: &EvalCase,
    thresholds: &Thresholds,
    timeout: Duration,
) -> Result<CaseOutcome> {
    let scores = with_timeout(timeout, "judging case", judge.score(case)).await?;
    scores.validate()?;

    let outcome = thresholds.apply(scores);
    debug!(
        question = %case.question,
        passed = outcome.passed,
        "case evaluated"
    );
    Ok(outcome)
}
