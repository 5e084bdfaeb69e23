//! Dummy LLM provider: scripted replies without a network.
//!
//! Echoes input back prefixed with `[echo]` by default. Tests script a fixed
//! reply or a fixed failure to drive the adapter's ordering rules.

use serde_json::{Value, json};

use crate::llm::{Completion, ProviderError, ProviderKind};

#[derive(Debug, Clone)]
enum Script {
    Echo,
    Reply(String),
    Fail(String),
}

#[derive(Debug, Clone)]
pub struct DummyProvider {
    script: Script,
}

impl DummyProvider {
    pub fn echo() -> Self {
        Self { script: Script::Echo }
    }

    /// Always answers with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self { script: Script::Reply(text.into()) }
    }

    /// Always fails as if the call had errored.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self { script: Script::Fail(reason.into()) }
    }

    pub async fn complete(&self, content: &str, _system: Option<&str>) -> Result<Completion, ProviderError> {
        let text = match &self.script {
            Script::Echo => format!("[echo] {content}"),
            Script::Reply(text) => text.clone(),
            Script::Fail(reason) => return Err(ProviderError::Request(reason.clone())),
        };
        let raw = json!({ "text": text });
        let text = ProviderKind::Dummy
            .extract_text(&raw)
            .ok_or_else(|| ProviderError::Request("no text in response".into()))?;
        Ok(Completion { text, raw })
    }
}

pub(crate) fn extract_text(raw: &Value) -> Option<String> {
    raw.get("text").and_then(Value::as_str).map(str::to_string)
}
