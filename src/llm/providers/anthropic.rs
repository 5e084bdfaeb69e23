//! Anthropic Messages API provider (`/v1/messages`).
//!
//! - Auth via `x-api-key` header (not `Authorization: Bearer`)
//! - Required `anthropic-version` header
//! - Replies arrive as a list of typed content blocks; only `text` blocks
//!   contribute to the reply.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, trace};

use crate::config::{AnthropicConfig, GenerationConfig};
use crate::llm::{Completion, ProviderError, ProviderKind};

use super::check_status;

#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: Client,
    api_base_url: String,
    model: String,
    api_version: String,
    temperature: f32,
    max_tokens: u32,
    api_key: Option<String>,
}

impl AnthropicProvider {
    pub fn new(
        config: &AnthropicConfig,
        generation: &GenerationConfig,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.clone(),
            model: config.model.clone(),
            api_version: config.api_version.clone(),
            temperature: generation.temperature,
            max_tokens: generation.max_tokens,
            api_key,
        })
    }

    /// One round-trip. Succeeds for any 2xx body that decodes as JSON, even
    /// one without text blocks (see [`extract_text`]).
    pub async fn complete(&self, content: &str, system: Option<&str>) -> Result<Completion, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Unavailable("ANTHROPIC_API_KEY not set".into()))?;

        let payload = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system,
            messages: vec![RequestMessage {
                role: "user",
                content: vec![RequestBlock { kind: "text", text: content }],
            }],
        };

        debug!(model = %self.model, content_len = content.len(), "sending Anthropic request");
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full Anthropic request payload");
        }

        let response = self
            .client
            .post(&self.api_base_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.api_version)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.api_base_url, error = %e, "Anthropic HTTP request failed (transport)");
                ProviderError::Request(e.to_string())
            })?;

        let response = check_status(ProviderKind::Anthropic, response).await?;

        let raw = response.json::<Value>().await.map_err(|e| {
            error!(error = %e, "failed to deserialize Anthropic response");
            ProviderError::Request(format!("failed to parse response body: {e}"))
        })?;
        trace!(response = %raw, "full Anthropic response payload");

        let text = ProviderKind::Anthropic
            .extract_text(&raw)
            .ok_or_else(|| ProviderError::Request("no text in response".into()))?;
        Ok(Completion { text, raw })
    }
}

/// Concatenate every non-empty `text` block, in order.
///
/// When the body has no text blocks the whole body is stringified instead, so
/// a 2xx reply always yields some text.
pub(crate) fn extract_text(raw: &Value) -> String {
    let blocks = serde_json::from_value::<MessagesResponse>(raw.clone())
        .map(|r| r.content)
        .unwrap_or_default();

    let text: String = blocks
        .into_iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text)
        .filter(|t| !t.is_empty())
        .collect();

    if text.is_empty() { raw.to_string() } else { text }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: Vec<RequestBlock<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestBlock<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}
