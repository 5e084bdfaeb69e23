//! OpenAI-compatible chat completion provider (`/v1/chat/completions`).
//!
//! All OpenAI wire types are private to this module; callers only see
//! [`Completion`]. The provider is stateless: one request, one reply.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, trace};

use crate::config::{GenerationConfig, OpenAiConfig};
use crate::llm::{Completion, ProviderError, ProviderKind};

use super::check_status;

/// Adapter for any HTTP endpoint implementing `/v1/chat/completions`.
///
/// Constructed once at startup, then cheaply cloned because
/// `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_base_url: String,
    model: String,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    api_key: Option<String>,
}

impl OpenAiCompatibleProvider {
    /// When `api_key` is present it is sent as `Authorization: Bearer <key>`.
    pub fn new(
        config: &OpenAiConfig,
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
            temperature: generation.temperature,
            top_p: generation.top_p,
            max_tokens: generation.max_tokens,
            api_key,
        })
    }

    /// Send `content` as the user message and optionally `system` as the system prompt.
    pub async fn complete(&self, content: &str, system: Option<&str>) -> Result<Completion, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Unavailable("OPENAI_API_KEY not set".into()))?;

        // Some models (gpt-5 family) do not accept a temperature parameter.
        let temperature = if self.model.starts_with("gpt-5") {
            None
        } else {
            Some(self.temperature)
        };

        let mut messages = Vec::new();
        if let Some(sys) = system {
            messages.push(Message { role: "system".to_string(), content: sys.to_string() });
        }
        messages.push(Message { role: "user".to_string(), content: content.to_string() });

        let payload = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
        };

        debug!(
            model = %payload.model,
            temperature = ?payload.temperature,
            content_len = content.len(),
            "sending LLM request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full LLM request payload");
        }

        let response = self
            .client
            .post(&self.api_base_url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.api_base_url, error = %e, "LLM HTTP request failed (transport)");
                ProviderError::Request(e.to_string())
            })?;

        let response = check_status(ProviderKind::OpenAi, response).await?;

        let raw = response.json::<Value>().await.map_err(|e| {
            error!(error = %e, "failed to deserialize LLM response");
            ProviderError::Request(format!("failed to parse response body: {e}"))
        })?;
        trace!(response = %raw, "full LLM response payload");

        let text = ProviderKind::OpenAi
            .extract_text(&raw)
            .ok_or_else(|| ProviderError::Request("empty or missing content in response".into()))?;

        Ok(Completion { text, raw })
    }
}

/// `choices[0].message.content` as sent; `None` when missing or blank.
pub(crate) fn extract_text(raw: &Value) -> Option<String> {
    let parsed = serde_json::from_value::<ChatCompletionResponse>(raw.clone()).ok()?;
    if let Some(usage) = &parsed.usage {
        debug!(
            input_tokens = usage.prompt_tokens,
            output_tokens = usage.completion_tokens,
            "received LLM response"
        );
    }
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|s| !s.trim().is_empty())
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<UsageData>,
}

#[derive(Debug, Deserialize)]
struct UsageData {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_provider(model: &str, api_key: Option<&str>) -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new(
            &OpenAiConfig {
                api_base_url: "http://127.0.0.1:9/v1/chat/completions".into(),
                model: model.into(),
                timeout_seconds: 1,
            },
            &GenerationConfig { temperature: 0.7, top_p: 0.9, max_tokens: 64 },
            api_key.map(str::to_string),
        )
        .unwrap()
    }

    #[test]
    fn takes_first_choice_content_verbatim() {
        let raw = json!({
            "choices": [
                { "message": { "role": "assistant", "content": "  Paris  " } },
                { "message": { "role": "assistant", "content": "Lyon" } }
            ],
            "usage": { "prompt_tokens": 5, "completion_tokens": 1 }
        });
        assert_eq!(extract_text(&raw).as_deref(), Some("  Paris  "));
    }

    #[test]
    fn empty_or_missing_content_is_none() {
        assert_eq!(extract_text(&json!({ "choices": [] })), None);
        assert_eq!(extract_text(&json!({ "choices": [{ "message": { "content": null } }] })), None);
        assert_eq!(extract_text(&json!({ "choices": [{ "message": { "content": "   " } }] })), None);
    }

    #[test]
    fn request_carries_sampling_parameters() {
        let payload = ChatCompletionRequest {
            model: "gpt-4o".into(),
            messages: vec![Message { role: "user".into(), content: "hi".into() }],
            temperature: Some(0.7),
            top_p: 0.9,
            max_tokens: 2000,
        };
        let v = serde_json::to_value(&payload).unwrap();
        assert_eq!(v["max_tokens"], 2000);
        assert!(v["top_p"].as_f64().is_some());
        assert_eq!(v["messages"][0]["content"], "hi");
    }

    #[tokio::test]
    async fn missing_key_is_unavailable() {
        let p = test_provider("gpt-4o", None);
        let err = p.complete("hello", None).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_request_error() {
        let p = test_provider("gpt-4o", Some("sk-test"));
        let err = p.complete("hello", None).await.unwrap_err();
        assert!(matches!(err, ProviderError::Request(_)));
    }
}
