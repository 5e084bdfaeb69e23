//! LLM provider implementations.
//!
//! [`build_chain`] is the factory called at startup: it turns `[llm] order`
//! into an ordered provider list. Adding a new backend = new module + new
//! match arm in [`build`].

pub mod anthropic;
pub mod dummy;
pub mod openai_compatible;

use serde::Deserialize;
use tracing::error;

use crate::config::{ApiKeys, LlmConfig};
use crate::llm::{LlmProvider, ProviderError, ProviderKind};

/// Construct one provider by config name.
///
/// Keys come from [`ApiKeys`] (environment only). A provider built without a
/// key still joins the chain; its calls fail with
/// [`ProviderError::Unavailable`].
pub fn build(name: &str, config: &LlmConfig, keys: &ApiKeys) -> Result<LlmProvider, ProviderError> {
    let kind = ProviderKind::from_name(name)
        .ok_or_else(|| ProviderError::UnknownProvider(name.to_string()))?;

    match kind {
        ProviderKind::Anthropic => {
            let p = anthropic::AnthropicProvider::new(
                &config.anthropic,
                &config.generation,
                keys.anthropic.clone(),
            )?;
            Ok(LlmProvider::Anthropic(p))
        }
        ProviderKind::OpenAi => {
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                &config.openai,
                &config.generation,
                keys.openai.clone(),
            )?;
            Ok(LlmProvider::OpenAiCompatible(p))
        }
        ProviderKind::Dummy => Ok(LlmProvider::Dummy(dummy::DummyProvider::echo())),
    }
}

/// Build every provider named in `config.order`, preserving order.
pub fn build_chain(config: &LlmConfig, keys: &ApiKeys) -> Result<Vec<LlmProvider>, ProviderError> {
    config
        .order
        .iter()
        .map(|name| build(name, config, keys))
        .collect()
}

// ── Shared HTTP helpers ───────────────────────────────────────────────────────

// Error envelope used by OpenAI, Anthropic and compatible APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// Consume the response and return it if successful, or a structured error.
pub(crate) async fn check_status(
    provider: ProviderKind,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let message = if let Ok(env) = serde_json::from_str::<ErrorEnvelope>(&body) {
        let code = env
            .error
            .code
            .map(|v| match v {
                serde_json::Value::String(s) => format!(" [code={s}]"),
                other => format!(" [code={other}]"),
            })
            .or_else(|| env.error.kind.map(|k| format!(" [type={k}]")))
            .unwrap_or_default();
        format!("HTTP {status}{code}: {}", env.error.message)
    } else {
        format!("HTTP {status}: {body}")
    };

    error!(%provider, %status, %message, "LLM request returned HTTP error");
    Err(ProviderError::Request(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn default_chain_is_anthropic_then_openai() {
        let cfg = Config::default();
        let chain = build_chain(&cfg.llm, &cfg.keys).unwrap();
        let kinds: Vec<_> = chain.iter().map(LlmProvider::kind).collect();
        assert_eq!(kinds, vec![ProviderKind::Anthropic, ProviderKind::OpenAi]);
    }

    #[test]
    fn custom_order_respected() {
        let mut cfg = Config::default();
        cfg.llm.order = vec!["openai".into(), "dummy".into()];
        let chain = build_chain(&cfg.llm, &cfg.keys).unwrap();
        let kinds: Vec<_> = chain.iter().map(LlmProvider::kind).collect();
        assert_eq!(kinds, vec![ProviderKind::OpenAi, ProviderKind::Dummy]);
    }

    #[test]
    fn unknown_provider_rejected() {
        let mut cfg = Config::default();
        cfg.llm.order = vec!["grok".into()];
        let err = build_chain(&cfg.llm, &cfg.keys).unwrap_err();
        assert!(matches!(err, ProviderError::UnknownProvider(name) if name == "grok"));
    }
}
