//! Research-then-analyze agent workflow.

use tracing::debug;

use crate::llm::LlmProvider;

use super::{MOCK_MARKER, PipelineError};

const RESEARCH_SYSTEM_PROMPT: &str = "You are a research agent. Use tools to gather information.";
const ANALYSIS_SYSTEM_PROMPT: &str = "You are an analysis agent. Analyze information and provide insights.";

pub enum Workflow {
    /// Echoes the prompt behind [`MOCK_MARKER`].
    Stub,
    Agents(AgentChain),
}

impl Workflow {
    pub fn name(&self) -> &'static str {
        match self {
            Workflow::Stub => "stub",
            Workflow::Agents(_) => "agents",
        }
    }

    pub fn is_stub(&self) -> bool {
        matches!(self, Workflow::Stub)
    }

    /// `documents` is retrieved context, when retrieval produced any.
    pub async fn run(&self, prompt: &str, documents: Option<&str>) -> Result<String, PipelineError> {
        match self {
            Workflow::Stub => Ok(format!("{MOCK_MARKER} {prompt}")),
            Workflow::Agents(chain) => chain.run(prompt, documents).await,
        }
    }
}

/// Two agents sharing one provider: the research agent answers the prompt,
/// the analysis agent turns that research into the final reply.
pub struct AgentChain {
    provider: LlmProvider,
}

impl AgentChain {
    pub fn new(provider: LlmProvider) -> Self {
        Self { provider }
    }

    pub async fn run(&self, prompt: &str, documents: Option<&str>) -> Result<String, PipelineError> {
        let research_input = match documents {
            Some(docs) => format!("{prompt}\n\nRelevant documents:\n{docs}"),
            None => prompt.to_string(),
        };

        let research = self
            .provider
            .complete(&research_input, Some(RESEARCH_SYSTEM_PROMPT))
            .await
            .map_err(|e| PipelineError::Workflow(format!("research agent: {e}")))?;
        debug!(provider = %self.provider.kind(), len = research.text.len(), "research stage done");

        let analysis_input = format!("Analyze this research: {}", research.text);
        let analysis = self
            .provider
            .complete(&analysis_input, Some(ANALYSIS_SYSTEM_PROMPT))
            .await
            .map_err(|e| PipelineError::Workflow(format!("analysis agent: {e}")))?;

        Ok(analysis.text)
    }
}
