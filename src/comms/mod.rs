//! HTTP channel: the axum router and server loop in front of [`AppContext`].
//!
//! ```text
//! POST /chat
//! POST /query                    fallback pipeline only, no session
//! GET  /sessions/{id}/history
//! GET  /health
//! GET  /favicon.ico              → 204
//! GET  /                         → chat page
//! ```
//!
//! The server stops accepting connections once the [`CancellationToken`] is
//! cancelled and returns after in-flight requests finish.

mod api;
mod ui;

use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app::AppContext;
use crate::error::AppError;

// ── Shared request state ──────────────────────────────────────────────────────

/// Router state injected into every handler via [`axum::extract::State`].
#[derive(Clone)]
pub(crate) struct AxumState {
    pub ctx: Arc<AppContext>,
}

// ── Server loop ───────────────────────────────────────────────────────────────

pub async fn serve(
    bind_addr: &str,
    ctx: Arc<AppContext>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| AppError::Comms(format!("bind failed on {bind_addr}: {e}")))?;

    info!(%bind_addr, "http channel listening");
    serve_on(listener, ctx, shutdown).await?;
    info!("http channel shut down");
    Ok(())
}

/// Serve on an already-bound listener. Tests bind `127.0.0.1:0` themselves.
pub async fn serve_on(
    listener: TcpListener,
    ctx: Arc<AppContext>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    axum::serve(listener, build_router(ctx))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Comms(format!("axum server error: {e}")))
}

// ── Router ────────────────────────────────────────────────────────────────────

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/chat",                         post(api::chat))
        .route("/query",                        post(api::query))
        .route("/sessions/{session_id}/history", get(api::history))
        .route("/health",                       get(api::health))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .route("/",            get(ui::root))
        .with_state(AxumState { ctx })
}
