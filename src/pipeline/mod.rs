//! Fallback pipeline: retrieval → agent workflow → evaluation.
//!
//! Runs only when no live provider answered. Each step is a capability enum
//! with a real and a stub variant, chosen once at construction from
//! `[pipeline]` config.
//!
//! [`FallbackPipeline::run`] never fails: any internal error becomes an
//! output whose text explains the error and whose score is 0.

pub mod evaluation;
pub mod retrieval;
pub mod workflow;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::llm::providers;

pub use evaluation::{Evaluation, Evaluator};
pub use retrieval::Retriever;
pub use workflow::Workflow;

/// Prefix of every stub workflow reply. The resolver keys on this substring.
pub const MOCK_MARKER: &str = "Mock AI response for:";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown pipeline capability: {0}")]
    UnknownCapability(String),
    #[error("retrieval failed: {0}")]
    Retrieval(String),
    #[error("workflow failed: {0}")]
    Workflow(String),
    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

/// Result of one pipeline run. Serialised as the `/query` response body.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub query: String,
    pub response: String,
    pub evaluation: Evaluation,
    pub context: Option<String>,
    /// A stub produced the text, or the run failed.
    pub synthetic: bool,
}

pub struct FallbackPipeline {
    retriever: Retriever,
    workflow: Workflow,
    evaluator: Evaluator,
}

impl FallbackPipeline {
    pub fn new(retriever: Retriever, workflow: Workflow, evaluator: Evaluator) -> Self {
        Self { retriever, workflow, evaluator }
    }

    /// All-stub pipeline: no network access at all.
    pub fn stub() -> Self {
        Self::new(Retriever::Stub, Workflow::Stub, Evaluator::Stub)
    }

    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let p = &config.pipeline;

        let agent_provider = || {
            providers::build(&p.agent_provider, &config.llm, &config.keys)
                .map_err(|e| PipelineError::UnknownCapability(format!("agent provider: {e}")))
        };

        let retriever = match p.retriever.as_str() {
            "stub" => Retriever::Stub,
            "http" => Retriever::Http(retrieval::HttpRetriever::new(&p.index_url, p.n_results)?),
            other => return Err(PipelineError::UnknownCapability(format!("retriever '{other}'"))),
        };
        let workflow = match p.workflow.as_str() {
            "stub" => Workflow::Stub,
            "agents" => Workflow::Agents(workflow::AgentChain::new(agent_provider()?)),
            other => return Err(PipelineError::UnknownCapability(format!("workflow '{other}'"))),
        };
        let evaluator = match p.evaluator.as_str() {
            "stub" => Evaluator::Stub,
            "llm" => Evaluator::Llm(evaluation::LlmGrader::new(agent_provider()?)),
            other => return Err(PipelineError::UnknownCapability(format!("evaluator '{other}'"))),
        };

        Ok(Self::new(retriever, workflow, evaluator))
    }

    /// `(retriever, workflow, evaluator)` variant names, for startup logs.
    pub fn describe(&self) -> (&'static str, &'static str, &'static str) {
        (self.retriever.name(), self.workflow.name(), self.evaluator.name())
    }

    pub async fn run(&self, prompt: &str, context: Option<&str>) -> PipelineOutput {
        match self.try_run(prompt, context).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "fallback pipeline failed");
                PipelineOutput {
                    query: prompt.to_string(),
                    response: format!("Error processing query: {e}"),
                    evaluation: Evaluation::failed(e.to_string()),
                    context: context.map(str::to_string),
                    synthetic: true,
                }
            }
        }
    }

    async fn try_run(&self, prompt: &str, context: Option<&str>) -> Result<PipelineOutput, PipelineError> {
        // Retrieval only runs without explicit context, and never fails the run.
        let retrieved = match context {
            Some(_) => None,
            None => match self.retriever.retrieve(prompt).await {
                Ok(docs) => Some(docs.join("\n")).filter(|s| !s.is_empty()),
                Err(e) => {
                    debug!(error = %e, "retrieval failed, continuing without context");
                    None
                }
            },
        };

        let response = self.workflow.run(prompt, retrieved.as_deref()).await?;

        let final_context = context.map(str::to_string).or(retrieved);
        let evaluation = self
            .evaluator
            .evaluate(prompt, &response, final_context.as_deref().unwrap_or(""))
            .await?;

        Ok(PipelineOutput {
            query: prompt.to_string(),
            response,
            evaluation,
            context: final_context,
            synthetic: self.workflow.is_stub(),
        })
    }
}
