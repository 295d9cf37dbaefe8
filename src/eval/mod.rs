//! Evaluation of retrieval-augmented answers.
//!
//! This module provides:
//! - The [`Judge`] capability and an LLM-as-judge implementation
//! - Threshold-based pass/fail per case
//! - Dataset loading and an end-to-end [`EvalRunner`]

pub mod dataset;
pub mod evaluator;
pub mod judge;
pub mod report;
pub mod runner;

pub use dataset::{Dataset, DatasetItem, sample_dataset};
pub use evaluator::{CaseOutcome, EvalCase, Thresholds, evaluate_case};
pub use judge::{Judge, JudgeScores, LlmJudge};
pub use report::{EvalReport, ItemResult};
pub use runner::{AnswerGenerator, EvalRunner, RunnerConfig};
