//! LLM prompts for answer generation and judging.
//!
//! Templates use `{placeholder}` markers filled with `str::replace`.

/// Collection of prompts used for RAG answering and evaluation.
pub struct Prompts;

impl Prompts {
    /// Prompt to answer a question from retrieved context only.
    pub fn rag_answer() -> &'static str {
        r#"Answer the question using ONLY the context below. If the context does not contain the answer, say that you cannot answer from the provided context.

Context:
{context}

Question: {question}

Answer concisely in one to three sentences."#
    }

    /// Prompt scoring how well an answer matches the expected answer.
    pub fn judge_correctness() -> &'static str {
        r#"You are evaluating the correctness of an answer to a question.

Question: {question}

Expected answer: {expected_answer}

Generated answer: {answer}

Score how factually consistent the generated answer is with the expected answer. Ignore wording differences; penalize missing or contradicting facts.
1.0 means fully correct, 0.0 means completely wrong.

Reply in JSON format:
{
    "score": <number between 0 and 1>,
    "reason": "<one sentence explaining the score>"
}
Directly return the final JSON structure. Do not output anything else."#
    }

    /// Prompt scoring whether an answer is grounded in the retrieved chunks.
    pub fn judge_faithfulness() -> &'static str {
        r#"You are evaluating whether an answer is faithful to its supporting context.

Context:
{context}

Answer: {answer}

Break the answer into individual claims and check each one against the context. Claims not supported by the context, or contradicted by it, lower the score.
1.0 means every claim is supported by the context, 0.0 means none is.

Reply in JSON format:
{
    "score": <number between 0 and 1>,
    "reason": "<one sentence explaining the score>"
}
Directly return the final JSON structure. Do not output anything else."#
    }

    /// Prompt scoring whether the retrieved chunks are relevant to the question.
    pub fn judge_contextual_relevancy() -> &'static str {
        r#"You are evaluating the relevancy of retrieved context for a question.

Question: {question}

Retrieved context:
{context}

Judge which statements in the retrieved context are useful for answering the question.
1.0 means all of the context is relevant, 0.0 means none of it is.

Reply in JSON format:
{
    "score": <number between 0 and 1>,
    "reason": "<one sentence explaining the score>"
}
Directly return the final JSON structure. Do not output anything else."#
    }

    /// System prompt for judging calls.
    pub fn system_judge() -> &'static str {
        "You are a strict, impartial evaluator of retrieval-augmented generation systems. Always respond with valid JSON when requested."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_are_not_empty() {
        assert!(!Prompts::rag_answer().is_empty());
        assert!(!Prompts::judge_correctness().is_empty());
        assert!(!Prompts::judge_faithfulness().is_empty());
        assert!(!Prompts::judge_contextual_relevancy().is_empty());
        assert!(!Prompts::system_judge().is_empty());
    }

    #[test]
    fn test_placeholders_present() {
        assert!(Prompts::rag_answer().contains("{context}"));
        assert!(Prompts::rag_answer().contains("{question}"));
        assert!(Prompts::judge_correctness().contains("{expected_answer}"));
        assert!(Prompts::judge_faithfulness().contains("{answer}"));
        assert!(Prompts::judge_contextual_relevancy().contains("{context}"));
    }
}
