//! Application context, built once at startup, shared by every handler.
//!
//! Owns the provider chain, the fallback pipeline and the session store, and
//! implements one chat turn end to end:
//!
//! ```text
//! request → session (locked) → user message
//!         → adapter (live providers, in order)
//!         → [none answered] fallback pipeline
//!         → resolver → assistant message → reply
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::AppError;
use crate::llm::GenerationRequest;
use crate::llm::adapter::LlmAdapter;
use crate::pipeline::{FallbackPipeline, PipelineOutput};
use crate::resolver::{self, KeyStatus, Origin, ResolvedResponse};
use crate::session::{Role, SessionStore};

/// Body of a successful `POST /chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub origin: Origin,
}

pub struct AppContext {
    adapter: LlmAdapter,
    pipeline: FallbackPipeline,
    sessions: SessionStore,
    keys: KeyStatus,
}

impl AppContext {
    pub fn new(adapter: LlmAdapter, pipeline: FallbackPipeline, keys: KeyStatus) -> Self {
        Self { adapter, pipeline, sessions: SessionStore::new(), keys }
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let adapter = LlmAdapter::from_config(config).map_err(|e| AppError::Config(e.to_string()))?;
        let pipeline = FallbackPipeline::from_config(config).map_err(|e| AppError::Config(e.to_string()))?;
        let keys = KeyStatus::from_config(config);

        let (retriever, workflow, evaluator) = pipeline.describe();
        info!(
            providers = ?config.llm.order,
            anthropic_key = keys.anthropic,
            openai_key = keys.openai,
            retriever,
            workflow,
            evaluator,
            "application context ready"
        );

        Ok(Self::new(adapter, pipeline, keys))
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Resolve a reply without touching any session.
    pub async fn respond(&self, request: &GenerationRequest) -> ResolvedResponse {
        let live = self.adapter.resolve(request.prompt(), request.context()).await;
        if live.is_some() {
            return resolver::decide(request.prompt(), live, "", self.keys);
        }

        let fallback = self.pipeline.run(request.prompt(), request.context()).await;
        debug!(score = fallback.evaluation.score, synthetic = fallback.synthetic, "fallback pipeline done");
        resolver::decide(request.prompt(), None, &fallback.response, self.keys)
    }

    /// One chat turn. The session's turn lock is held for the whole turn, so
    /// the user and assistant messages of concurrent turns never interleave.
    /// History reads do not take that lock.
    pub async fn chat(&self, request: GenerationRequest) -> Result<ChatReply, AppError> {
        let (session_id, session) = self.sessions.get_or_create(request.session_id())?;
        let _turn = session.begin_turn().await;

        session.add_message(Role::User, request.prompt(), request.context().map(str::to_string));

        let resolved = self.respond(&request).await;
        let origin = resolved.origin();
        info!(%session_id, ?origin, "chat turn resolved");

        let response = resolved.into_text();
        session.add_message(Role::Assistant, response.clone(), None);

        Ok(ChatReply { response, session_id, timestamp: Utc::now(), origin })
    }

    /// Run the fallback pipeline directly, bypassing providers and sessions.
    pub async fn query(&self, prompt: &str, context: Option<&str>) -> PipelineOutput {
        self.pipeline.run(prompt, context).await
    }
}
