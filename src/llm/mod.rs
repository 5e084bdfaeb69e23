//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities; clone them freely.
//! The `complete` method is `async fn` on the enum so callers need no
//! trait-object machinery. [`adapter::LlmAdapter`] holds the ordered provider
//! chain and implements the "first success wins" policy.

pub mod adapter;
pub mod providers;

use serde_json::Value;
use thiserror::Error;

use crate::error::AppError;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    /// No credentials configured; the adapter skips silently.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    /// Transport, HTTP status or decode failure.
    #[error("provider request failed: {0}")]
    Request(String),
}

// ── Provider kinds ────────────────────────────────────────────────────────────

/// Tag identifying a provider's wire shape.
///
/// Each kind owns its text-extraction rule; see [`ProviderKind::extract_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    Dummy,
}

impl ProviderKind {
    /// Config-facing name (`[llm] order` entries).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "anthropic" => Some(Self::Anthropic),
            "openai" | "openai-compatible" => Some(Self::OpenAi),
            "dummy" => Some(Self::Dummy),
            _ => None,
        }
    }

    /// Human-facing name, used in logs and operator messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Anthropic => "Anthropic",
            Self::OpenAi => "OpenAI",
            Self::Dummy => "Dummy",
        }
    }

    /// Pull the reply text out of a raw response body.
    ///
    /// `None` means the body carried no usable text for this provider shape.
    pub fn extract_text(self, raw: &Value) -> Option<String> {
        match self {
            Self::Anthropic => Some(providers::anthropic::extract_text(raw)),
            Self::OpenAi => providers::openai_compatible::extract_text(raw),
            Self::Dummy => providers::dummy::extract_text(raw),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ── Request / result types ────────────────────────────────────────────────────

/// One user turn to be answered.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    prompt: String,
    context: Option<String>,
    session_id: Option<String>,
}

impl GenerationRequest {
    /// Fails when `prompt` is empty or whitespace. Empty `context` and
    /// `session_id` values are normalised to `None`.
    pub fn new(
        prompt: impl Into<String>,
        context: Option<String>,
        session_id: Option<String>,
    ) -> Result<Self, AppError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(AppError::InvalidRequest("message must not be empty".into()));
        }
        Ok(Self {
            prompt,
            context: context.filter(|c| !c.trim().is_empty()),
            session_id: session_id.filter(|s| !s.is_empty()),
        })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

/// Prompt text sent to a provider: context is prepended when present.
pub fn build_prompt(prompt: &str, context: Option<&str>) -> String {
    match context {
        Some(ctx) => format!("Context: {ctx}\n\nUser: {prompt}"),
        None => prompt.to_string(),
    }
}

/// A successful provider round-trip.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    /// Decoded response body, kept for diagnostics.
    pub raw: Value,
}

/// Outcome of one provider attempt. Never persisted.
#[derive(Debug)]
pub struct ProviderResult {
    pub provider: ProviderKind,
    pub raw: Option<Value>,
    pub outcome: Result<String, ProviderError>,
}

impl ProviderResult {
    pub fn text(&self) -> Option<&str> {
        self.outcome.as_deref().ok()
    }

    /// One-line failure summary for logs; `None` on success.
    pub fn failure(&self) -> Option<String> {
        match &self.outcome {
            Ok(_) => None,
            Err(ProviderError::Unavailable(reason)) => Some(format!("{} unavailable: {reason}", self.provider)),
            Err(e) => Some(format!("{} API error: {e}", self.provider)),
        }
    }
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
/// Adding a backend = new module + new variant + new `complete` arm.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Anthropic(providers::anthropic::AnthropicProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
    Dummy(providers::dummy::DummyProvider),
}

impl LlmProvider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            LlmProvider::Anthropic(_) => ProviderKind::Anthropic,
            LlmProvider::OpenAiCompatible(_) => ProviderKind::OpenAi,
            LlmProvider::Dummy(_) => ProviderKind::Dummy,
        }
    }

    /// Send `content` as the user message, with an optional system prompt.
    pub async fn complete(
        &self,
        content: &str,
        system: Option<&str>,
    ) -> Result<Completion, ProviderError> {
        match self {
            LlmProvider::Anthropic(p) => p.complete(content, system).await,
            LlmProvider::OpenAiCompatible(p) => p.complete(content, system).await,
            LlmProvider::Dummy(p) => p.complete(content, system).await,
        }
    }
}
