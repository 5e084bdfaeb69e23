//! Answer scoring.
//!
//! The LLM grader follows the usual QA-grading pattern: the model sees the
//! question, the answer and a reference, and replies `CORRECT` or
//! `INCORRECT`.

use serde::Serialize;

use crate::llm::LlmProvider;

use super::PipelineError;

const STUB_SCORE: f64 = 0.8;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Evaluation {
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Evaluation {
    /// Zero score carrying the error that ended the run.
    pub fn failed(error: String) -> Self {
        Self { score: 0.0, reasoning: None, error: Some(error) }
    }
}

pub enum Evaluator {
    /// Fixed score, no model call.
    Stub,
    Llm(LlmGrader),
}

impl Evaluator {
    pub fn name(&self) -> &'static str {
        match self {
            Evaluator::Stub => "stub",
            Evaluator::Llm(_) => "llm",
        }
    }

    pub async fn evaluate(&self, question: &str, answer: &str, reference: &str) -> Result<Evaluation, PipelineError> {
        match self {
            Evaluator::Stub => Ok(Evaluation {
                score: STUB_SCORE,
                reasoning: Some("Mock evaluation".into()),
                error: None,
            }),
            Evaluator::Llm(grader) => grader.grade(question, answer, reference).await,
        }
    }
}

pub struct LlmGrader {
    provider: LlmProvider,
}

impl LlmGrader {
    pub fn new(provider: LlmProvider) -> Self {
        Self { provider }
    }

    pub async fn grade(&self, question: &str, answer: &str, reference: &str) -> Result<Evaluation, PipelineError> {
        let prompt = format!(
            "You are a teacher grading a quiz.\n\
             You are given a question, the student's answer, and the true answer, \
             and are asked to score the student answer as either CORRECT or INCORRECT.\n\n\
             QUESTION: {question}\n\
             STUDENT ANSWER: {answer}\n\
             TRUE ANSWER: {reference}\n\
             GRADE:"
        );
        let reply = self
            .provider
            .complete(&prompt, None)
            .await
            .map_err(|e| PipelineError::Evaluation(e.to_string()))?;

        let score = parse_grade(&reply.text)
            .ok_or_else(|| PipelineError::Evaluation(format!("ungradable reply: {}", reply.text)))?;
        Ok(Evaluation { score, reasoning: Some(reply.text), error: None })
    }
}

/// `INCORRECT` wins over `CORRECT` since the former contains the latter.
fn parse_grade(reply: &str) -> Option<f64> {
    let upper = reply.to_uppercase();
    if upper.contains("INCORRECT") {
        Some(0.0)
    } else if upper.contains("CORRECT") {
        Some(1.0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::dummy::DummyProvider;

    fn grader(reply: &str) -> Evaluator {
        Evaluator::Llm(LlmGrader::new(LlmProvider::Dummy(DummyProvider::replying(reply))))
    }

    #[tokio::test]
    async fn stub_score_is_fixed() {
        let e = Evaluator::Stub.evaluate("q", "a", "").await.unwrap();
        assert_eq!(e.score, 0.8);
        assert_eq!(e.reasoning.as_deref(), Some("Mock evaluation"));
    }

    #[tokio::test]
    async fn correct_grade() {
        let e = grader("GRADE: CORRECT").evaluate("q", "a", "r").await.unwrap();
        assert_eq!(e.score, 1.0);
    }

    #[tokio::test]
    async fn incorrect_grade() {
        let e = grader("Incorrect, the capital is Paris").evaluate("q", "a", "r").await.unwrap();
        assert_eq!(e.score, 0.0);
    }

    #[tokio::test]
    async fn unparseable_grade_errors() {
        let err = grader("maybe?").evaluate("q", "a", "r").await.unwrap_err();
        assert!(matches!(err, PipelineError::Evaluation(_)));
    }

    #[test]
    fn failed_evaluation_serialises_error() {
        let v = serde_json::to_value(Evaluation::failed("boom".into())).unwrap();
        assert_eq!(v["score"], 0.0);
        assert_eq!(v["error"], "boom");
        assert!(v.get("reasoning").is_none());
    }
}
