//! LLM-as-judge scoring of retrieval-augmented answers.

use super::evaluator::EvalCase;
use crate::error::{RagError, Result};
use crate::llm::{LlmClient, Prompts};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Scores for one case, each expected in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeScores {
    /// Generated answer against the expected answer.
    pub correctness: f64,
    /// Generated answer grounded in the retrieved chunks.
    pub faithfulness: f64,
    /// Retrieved chunks relevant to the question.
    pub contextual_relevancy: f64,
}

impl JudgeScores {
    /// Reject any score outside `[0, 1]` (NaN included).
    pub fn validate(&self) -> Result<()> {
        check_score("correctness", self.correctness)?;
        check_score("faithfulness", self.faithfulness)?;
        check_score("contextual_relevancy", self.contextual_relevancy)?;
        Ok(())
    }
}

fn check_score(metric: &str, score: f64) -> Result<()> {
    if (0.0..=1.0).contains(&score) {
        Ok(())
    } else {
        Err(RagError::Judging(format!(
            "{} score {} is outside [0, 1]",
            metric, score
        )))
    }
}

/// External capability that scores an [`EvalCase`].
#[async_trait]
pub trait Judge: Send + Sync {
    async fn score(&self, case: &EvalCase) -> Result<JudgeScores>;
}

/// Judge backed by an OpenAI-compatible chat model, one prompt per metric.
pub struct LlmJudge {
    client: LlmClient,
}

impl LlmJudge {
    /// Create a new judge with the given LLM client.
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    async fn ask(&self, metric: &str, prompt: String) -> Result<f64> {
        let response = self
            .client
            .complete(Some(Prompts::system_judge()), &prompt)
            .await
            .map_err(|e| judging_failure(metric, e))?;

        let score = Self::parse_score_response(&response)
            .map_err(|e| RagError::Judging(format!("{}: {}", metric, e)))?;
        check_score(metric, score)?;

        debug!(metric, score, "judge scored");
        Ok(score)
    }

    /// Parse a `{"score": .., "reason": ..}` reply.
    fn parse_score_response(response: &str) -> std::result::Result<f64, String> {
        #[derive(Deserialize)]
        struct RawScore {
            score: f64,
            #[allow(dead_code)]
            #[serde(default)]
            reason: Option<String>,
        }

        let json_str = Self::extract_json(response);
        let raw: RawScore = serde_json::from_str(&json_str).map_err(|e| {
            format!("failed to parse judge response: {}. Response: {}", e, response)
        })?;
        Ok(raw.score)
    }

    /// Extract JSON from response.
    fn extract_json(response: &str) -> String {
        let response = response.trim();

        if let Some(rest) = response.strip_prefix("```json") {
            if let Some(end) = rest.rfind("```") {
                return rest[..end].trim().to_string();
            }
        }

        if response.starts_with("```") {
            if let Some(end) = response.rfind("```") {
                let start = response.find('\n').map(|n| n + 1).unwrap_or(3);
                if end > start {
                    return response[start..end].trim().to_string();
                }
            }
        }

        if let Some(start) = response.find('{') {
            if let Some(end) = response.rfind('}') {
                if end > start {
                    return response[start..=end].to_string();
                }
            }
        }

        response.to_string()
    }
}

/// Number the retrieved chunks for the judge prompts.
fn format_chunks(chunks: &[String]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, text)| format!("[{}] {}", i + 1, text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Timeouts stay timeouts; everything else from the LLM is a judging failure.
fn judging_failure(metric: &str, error: RagError) -> RagError {
    match error {
        RagError::Timeout { .. } => error,
        other => RagError::Judging(format!("{} request failed: {}", metric, other)),
    }
}

#[async_trait]
impl Judge for LlmJudge {
    async fn score(&self, case: &EvalCase) -> Result<JudgeScores> {
        let context = format_chunks(&case.retrieved_chunks);

        let correctness = Prompts::judge_correctness()
            .replace("{question}", &case.question)
            .replace("{expected_answer}", &case.expected_answer)
            .replace("{answer}", &case.generated_answer);
        let faithfulness = Prompts::judge_faithfulness()
            .replace("{context}", &context)
            .replace("{answer}", &case.generated_answer);
        let contextual_relevancy = Prompts::judge_contextual_relevancy()
            .replace("{question}", &case.question)
            .replace("{context}", &context);

        let (correctness, faithfulness, contextual_relevancy) = tokio::try_join!(
            self.ask("correctness", correctness),
            self.ask("faithfulness", faithfulness),
            self.ask("contextual_relevancy", contextual_relevancy),
        )?;

        Ok(JudgeScores {
            correctness,
            faithfulness,
            contextual_relevancy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_score_response() {
        let response = r#"{"score": 0.75, "reason": "Mostly correct"}"#;
        assert_eq!(LlmJudge::parse_score_response(response).unwrap(), 0.75);
    }

    #[test]
    fn test_parse_fenced_response() {
        let response = "```json\n{\"score\": 1, \"reason\": \"ok\"}\n```";
        assert_eq!(LlmJudge::parse_score_response(response).unwrap(), 1.0);

        let prose = "Here is my verdict: {\"score\": 0.2} hope it helps";
        assert_eq!(LlmJudge::parse_score_response(prose).unwrap(), 0.2);
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(LlmJudge::parse_score_response("I think it is good").is_err());
    }

    #[test]
    fn test_scores_validate() {
        let ok = JudgeScores {
            correctness: 0.0,
            faithfulness: 1.0,
            contextual_relevancy: 0.5,
        };
        assert!(ok.validate().is_ok());

        let nan = JudgeScores {
            contextual_relevancy: f64::NAN,
            ..ok
        };
        assert!(matches!(nan.validate(), Err(RagError::Judging(_))));
    }

    #[test]
    fn test_judging_failure_keeps_timeouts() {
        let timeout = RagError::timeout("waiting for chat completion", Duration::from_secs(1));
        assert!(judging_failure("faithfulness", timeout).is_timeout());

        let api = RagError::LlmApi("bad request".to_string());
        assert!(matches!(
            judging_failure("faithfulness", api),
            RagError::Judging(_)
        ));
    }

    #[test]
    fn test_format_chunks_numbers_from_one() {
        let chunks = vec!["alpha".to_string(), "beta".to_string()];
        assert_eq!(format_chunks(&chunks), "[1] alpha\n\n[2] beta");
    }
}
