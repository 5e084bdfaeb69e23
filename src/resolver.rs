//! Response resolution: live text, fallback text, or an operator-facing
//! explanation of why only mock output exists.
//!
//! Rules, in order:
//! 1. A live provider answer is used as-is.
//! 2. Fallback text containing [`MOCK_MARKER`] is replaced by an explanation
//!    that depends on whether any provider key is configured.
//! 3. Any other fallback text passes through unmodified.

use serde::Serialize;

use crate::config::Config;
use crate::llm::ProviderKind;
use crate::pipeline::MOCK_MARKER;

const EMPTY_REPLY: &str = "I received your message but couldn't generate a proper response.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    Live,
    FallbackMock,
    FallbackExplained,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResponse {
    text: String,
    origin: Origin,
}

impl ResolvedResponse {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Which providers can actually be called: a key is set and the provider is
/// listed in `[llm] order`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyStatus {
    pub anthropic: bool,
    pub openai: bool,
}

impl KeyStatus {
    pub fn any(&self) -> bool {
        self.anthropic || self.openai
    }
}

impl KeyStatus {
    pub fn from_config(config: &Config) -> Self {
        let listed = |kind: ProviderKind| {
            config
                .llm
                .order
                .iter()
                .any(|name| ProviderKind::from_name(name) == Some(kind))
        };
        Self {
            anthropic: config.keys.anthropic.is_some() && listed(ProviderKind::Anthropic),
            openai: config.keys.openai.is_some() && listed(ProviderKind::OpenAi),
        }
    }
}

/// Pick the final reply for `prompt`.
///
/// `fallback` is only consulted when `live` is `None`; callers that got a live
/// answer may pass an empty string.
pub fn decide(prompt: &str, live: Option<String>, fallback: &str, keys: KeyStatus) -> ResolvedResponse {
    if let Some(text) = live {
        return ResolvedResponse { text, origin: Origin::Live };
    }

    if fallback.contains(MOCK_MARKER) {
        let text = if keys.any() {
            quota_explanation(prompt, keys)
        } else {
            setup_instructions(prompt)
        };
        return ResolvedResponse { text, origin: Origin::FallbackExplained };
    }

    let text = if fallback.trim().is_empty() {
        EMPTY_REPLY.to_string()
    } else {
        fallback.to_string()
    };
    ResolvedResponse { text, origin: Origin::FallbackMock }
}

fn key_line(configured: bool) -> &'static str {
    if configured {
        "key configured, request failed (usage quota or billing limit likely reached)"
    } else {
        "not configured (no key, or not listed in [llm] order)"
    }
}

fn quota_explanation(prompt: &str, keys: KeyStatus) -> String {
    format!(
        r#"I understand you're asking: "{prompt}"

I have access to AI API keys, but none of the configured services returned a response.

**Current Status:**
- Anthropic: {anthropic}
- OpenAI: {openai}
- System: falling back to demo mode

**To get real AI responses:**

1. **Anthropic:** check your credit balance at https://console.anthropic.com/settings/billing
2. **OpenAI:** check usage limits and billing at https://platform.openai.com/settings/organization/billing

Once either service has quota available, live responses resume immediately; no restart is needed."#,
        anthropic = key_line(keys.anthropic),
        openai = key_line(keys.openai),
    )
}

fn setup_instructions(prompt: &str) -> String {
    format!(
        r#"I understand you're asking: "{prompt}"

I'm currently running in demo mode because no AI API keys are configured. To get real AI responses:

1. Set an API key in the environment:
   ```bash
   export ANTHROPIC_API_KEY="your-api-key-here"
   # or
   export OPENAI_API_KEY="your-api-key-here"
   ```

2. Or add it to a .env file in the working directory:
   ```
   OPENAI_API_KEY=your-api-key-here
   ```

3. Restart the application

For now, I can help you test the interface and demonstrate the pipeline structure!"#
    )
}
