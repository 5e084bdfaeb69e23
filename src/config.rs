//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory (or
//! the file named by `PIPELINE_CONFIG`), then applies environment overrides.
//! The file is optional: when it does not exist every field takes its default.
//! API keys are only ever read from the environment, never from TOML.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;
use crate::logger;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// HTTP listener configuration (`[server]`).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address the axum channel binds to.
    pub bind: String,
    pub log_level: String,
}

/// Sampling parameters shared by every provider (`[llm]`).
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub temperature: f32,
    /// Nucleus sampling. Only sent to OpenAI-style endpoints.
    pub top_p: f32,
    pub max_tokens: u32,
}

/// Anthropic Messages API configuration (`[llm.anthropic]`).
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// Full messages endpoint URL.
    pub api_base_url: String,
    pub model: String,
    /// Value of the `anthropic-version` header.
    pub api_version: String,
    pub timeout_seconds: u64,
}

/// OpenAI / OpenAI-compatible provider configuration (`[llm.openai]`).
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
}

/// LLM subsystem configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Provider names in the order the adapter tries them.
    pub order: Vec<String>,
    pub generation: GenerationConfig,
    pub anthropic: AnthropicConfig,
    pub openai: OpenAiConfig,
}

/// Fallback pipeline capability selection (`[pipeline]`).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// `"stub"` or `"http"`.
    pub retriever: String,
    /// Document index query endpoint, used by the `http` retriever.
    pub index_url: String,
    pub n_results: usize,
    /// `"stub"` or `"agents"`.
    pub workflow: String,
    /// `"stub"` or `"llm"`.
    pub evaluator: String,
    /// Provider backing the `agents` workflow and the `llm` evaluator.
    pub agent_provider: String,
}

/// Provider credentials, sourced from the environment only.
///
/// Empty strings are treated as absent.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub anthropic: Option<String>,
    pub openai: Option<String>,
}

impl ApiKeys {
    pub fn new(anthropic: Option<String>, openai: Option<String>) -> Self {
        Self {
            anthropic: non_empty(anthropic),
            openai: non_empty(openai),
        }
    }

    pub fn any(&self) -> bool {
        self.anthropic.is_some() || self.openai.is_some()
    }
}

/// Fully-resolved service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub keys: ApiKeys,
}

impl Default for Config {
    /// Every field at its default, no API keys.
    fn default() -> Self {
        resolve(RawConfig::default(), &EnvOverrides::default())
    }
}

/// Values read from the process environment.
///
/// Kept separate from [`load_from`] so tests can pass overrides directly
/// instead of mutating env vars.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub bind: Option<String>,
    pub log_level: Option<String>,
    pub anthropic_model: Option<String>,
    pub openai_model: Option<String>,
    pub temperature: Option<String>,
    pub top_p: Option<String>,
    pub max_tokens: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            bind: env::var("PIPELINE_BIND").ok(),
            log_level: env::var("PIPELINE_LOG_LEVEL").ok(),
            anthropic_model: env::var("ANTHROPIC_MODEL").ok(),
            openai_model: env::var("OPENAI_MODEL").ok(),
            temperature: env::var("PIPELINE_TEMPERATURE").ok(),
            top_p: env::var("PIPELINE_TOP_P").ok(),
            max_tokens: env::var("PIPELINE_MAX_TOKENS").ok(),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
        }
    }
}

// ── Raw TOML shape ────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    pipeline: RawPipeline,
}

#[derive(Deserialize)]
struct RawServer {
    #[serde(default = "default_bind")]
    bind: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

impl Default for RawServer {
    fn default() -> Self {
        Self { bind: default_bind(), log_level: default_log_level() }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    #[serde(default = "default_order")]
    order: Vec<String>,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default = "default_top_p")]
    top_p: f32,
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
    #[serde(default)]
    anthropic: RawAnthropic,
    #[serde(default)]
    openai: RawOpenAi,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            order: default_order(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            anthropic: RawAnthropic::default(),
            openai: RawOpenAi::default(),
        }
    }
}

#[derive(Deserialize)]
struct RawAnthropic {
    #[serde(default = "default_anthropic_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_anthropic_model")]
    model: String,
    #[serde(default = "default_anthropic_api_version")]
    api_version: String,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawAnthropic {
    fn default() -> Self {
        Self {
            api_base_url: default_anthropic_api_base_url(),
            model: default_anthropic_model(),
            api_version: default_anthropic_api_version(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawOpenAi {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAi {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawPipeline {
    #[serde(default = "default_stub")]
    retriever: String,
    #[serde(default = "default_index_url")]
    index_url: String,
    #[serde(default = "default_n_results")]
    n_results: usize,
    #[serde(default = "default_stub")]
    workflow: String,
    #[serde(default = "default_stub")]
    evaluator: String,
    #[serde(default = "default_agent_provider")]
    agent_provider: String,
}

impl Default for RawPipeline {
    fn default() -> Self {
        Self {
            retriever: default_stub(),
            index_url: default_index_url(),
            n_results: default_n_results(),
            workflow: default_stub(),
            evaluator: default_stub(),
            agent_provider: default_agent_provider(),
        }
    }
}

fn default_bind() -> String { "0.0.0.0:8003".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_order() -> Vec<String> { vec!["anthropic".to_string(), "openai".to_string()] }
fn default_temperature() -> f32 { 0.7 }
fn default_top_p() -> f32 { 0.9 }
fn default_max_tokens() -> u32 { 2000 }
fn default_timeout_seconds() -> u64 { 60 }
fn default_anthropic_api_base_url() -> String { "https://api.anthropic.com/v1/messages".to_string() }
fn default_anthropic_model() -> String { "claude-3-5-sonnet-20241022".to_string() }
fn default_anthropic_api_version() -> String { "2023-06-01".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-4o".to_string() }
fn default_stub() -> String { "stub".to_string() }
fn default_index_url() -> String { "http://127.0.0.1:8000/query".to_string() }
fn default_n_results() -> usize { 5 }
fn default_agent_provider() -> String { "openai".to_string() }

// ── Loading ───────────────────────────────────────────────────────────────────

/// Load config from `config_path`, else `PIPELINE_CONFIG`, else
/// `config/default.toml`, then apply env-var overrides.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let path = match config_path {
        Some(p) => expand_home(p),
        None => env::var("PIPELINE_CONFIG")
            .map(|p| expand_home(&p))
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
    };
    load_from(&path, &EnvOverrides::from_env())
}

/// Internal loader. Accepts an explicit path and overrides.
///
/// A missing file is not an error; an unreadable or malformed one is.
pub fn load_from(path: &Path, overrides: &EnvOverrides) -> Result<Config, AppError> {
    let mut raw = if path.exists() {
        let text = fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str::<RawConfig>(&text)
            .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?
    } else {
        RawConfig::default()
    };

    if let Some(v) = &overrides.temperature {
        raw.llm.temperature = parse_override("PIPELINE_TEMPERATURE", v)?;
    }
    if let Some(v) = &overrides.top_p {
        raw.llm.top_p = parse_override("PIPELINE_TOP_P", v)?;
    }
    if let Some(v) = &overrides.max_tokens {
        raw.llm.max_tokens = parse_override("PIPELINE_MAX_TOKENS", v)?;
    }

    let config = resolve(raw, overrides);
    logger::parse_level(&config.server.log_level)
        .map_err(|e| AppError::Config(format!("[server] log_level: {e}")))?;
    Ok(config)
}

fn resolve(raw: RawConfig, overrides: &EnvOverrides) -> Config {
    let pick = |over: &Option<String>, base: String| non_empty(over.clone()).unwrap_or(base);

    Config {
        server: ServerConfig {
            bind: pick(&overrides.bind, raw.server.bind),
            log_level: pick(&overrides.log_level, raw.server.log_level),
        },
        llm: LlmConfig {
            order: raw.llm.order,
            generation: GenerationConfig {
                temperature: raw.llm.temperature,
                top_p: raw.llm.top_p,
                max_tokens: raw.llm.max_tokens,
            },
            anthropic: AnthropicConfig {
                api_base_url: raw.llm.anthropic.api_base_url,
                model: pick(&overrides.anthropic_model, raw.llm.anthropic.model),
                api_version: raw.llm.anthropic.api_version,
                timeout_seconds: raw.llm.anthropic.timeout_seconds,
            },
            openai: OpenAiConfig {
                api_base_url: raw.llm.openai.api_base_url,
                model: pick(&overrides.openai_model, raw.llm.openai.model),
                timeout_seconds: raw.llm.openai.timeout_seconds,
            },
        },
        pipeline: PipelineConfig {
            retriever: raw.pipeline.retriever,
            index_url: raw.pipeline.index_url,
            n_results: raw.pipeline.n_results,
            workflow: raw.pipeline.workflow,
            evaluator: raw.pipeline.evaluator,
            agent_provider: raw.pipeline.agent_provider,
        },
        keys: ApiKeys::new(
            overrides.anthropic_api_key.clone(),
            overrides.openai_api_key.clone(),
        ),
    }
}

fn parse_override<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| AppError::Config(format!("invalid {name} '{value}': {e}")))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
