//! Ordered provider chain: "first success wins".
//!
//! Providers are tried sequentially in priority order. Failures are recorded
//! and logged, never returned: a caller only learns whether some provider
//! produced text.

use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::llm::{LlmProvider, ProviderError, ProviderResult, build_prompt, providers};

#[derive(Debug, Clone)]
pub struct LlmAdapter {
    providers: Vec<LlmProvider>,
}

impl LlmAdapter {
    pub fn new(providers: Vec<LlmProvider>) -> Self {
        Self { providers }
    }

    /// Build the chain named by `[llm] order`.
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        Ok(Self::new(providers::build_chain(&config.llm, &config.keys)?))
    }

    /// One call against one provider, captured as a [`ProviderResult`].
    pub async fn attempt(&self, provider: &LlmProvider, prompt: &str) -> ProviderResult {
        match provider.complete(prompt, None).await {
            Ok(done) => ProviderResult {
                provider: provider.kind(),
                raw: Some(done.raw),
                outcome: Ok(done.text),
            },
            Err(e) => ProviderResult {
                provider: provider.kind(),
                raw: None,
                outcome: Err(e),
            },
        }
    }

    /// Text of the first provider that succeeds, or `None` when every
    /// provider is unconfigured or failed.
    pub async fn resolve(&self, prompt: &str, context: Option<&str>) -> Option<String> {
        let full_prompt = build_prompt(prompt, context);
        let mut failed = Vec::new();

        for provider in &self.providers {
            let result = self.attempt(provider, &full_prompt).await;
            if let Some(text) = result.text() {
                info!(provider = %result.provider, "live response");
                if let Some(raw) = &result.raw {
                    trace!(provider = %result.provider, %raw, "live response body");
                }
                return Some(text.to_string());
            }
            if let Err(ProviderError::Unavailable(reason)) = &result.outcome {
                debug!(provider = %result.provider, %reason, "provider skipped");
            }
            failed.push(result);
        }

        if !failed.is_empty() {
            let errors: Vec<String> = failed.iter().filter_map(ProviderResult::failure).collect();
            warn!(errors = %errors.join("; "), "no live response from any provider");
        }
        None
    }
}
