//! Chat endpoint that answers from live LLM providers (Anthropic, OpenAI)
//! and falls back to a retrieval → workflow → evaluation pipeline when none
//! of them answers.

pub mod app;
pub mod comms;
pub mod config;
pub mod error;
pub mod llm;
pub mod logger;
pub mod pipeline;
pub mod resolver;
pub mod session;
