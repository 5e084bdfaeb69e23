//! JSON handlers.
//!
//! Every error body has the shape `{"error": <code>, "detail": <text>}`.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::llm::GenerationRequest;

use super::AxumState;

// ── Request types ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct ChatRequest {
    message: String,
    context: Option<String>,
    session_id: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct QueryRequest {
    query: String,
    context: Option<String>,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn json_error(status: StatusCode, code: &str, detail: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "error": code, "detail": format!("{detail}") }))).into_response()
}

/// An undecodable body is reported as a 500 pipeline error.
fn rejected(rejection: JsonRejection) -> Response {
    warn!(error = %rejection.body_text(), "undecodable request body");
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        format!("Pipeline error: {}", rejection.body_text()),
    )
}

fn app_error(e: AppError) -> Response {
    match e {
        AppError::InvalidRequest(msg) => json_error(StatusCode::BAD_REQUEST, "bad_request", msg),
        AppError::SessionNotFound(id) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("Session not found: {id}"))
        }
        other => {
            warn!(error = %other, "request failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                format!("Pipeline error: {other}"),
            )
        }
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// POST /chat
pub(super) async fn chat(
    State(state): State<AxumState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(p) => p,
        Err(rejection) => return rejected(rejection),
    };

    let request = match GenerationRequest::new(body.message, body.context, body.session_id) {
        Ok(r) => r,
        Err(e) => return app_error(e),
    };

    match state.ctx.chat(request).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(e) => app_error(e),
    }
}

/// POST /query
pub(super) async fn query(
    State(state): State<AxumState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(p) => p,
        Err(rejection) => return rejected(rejection),
    };
    if body.query.trim().is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "bad_request", "query must not be empty");
    }

    let context = body.context.filter(|c| !c.trim().is_empty());
    let output = state.ctx.query(&body.query, context.as_deref()).await;
    (StatusCode::OK, Json(output)).into_response()
}

/// GET /sessions/{session_id}/history
pub(super) async fn history(
    State(state): State<AxumState>,
    Path(session_id): Path<String>,
) -> Response {
    debug!(%session_id, "history requested");
    match state.ctx.sessions().history(&session_id) {
        Ok(history) => (StatusCode::OK, Json(history)).into_response(),
        Err(e) => app_error(e),
    }
}

/// GET /health
pub(super) async fn health(State(state): State<AxumState>) -> Response {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "active_sessions": state.ctx.sessions().len(),
    }))
    .into_response()
}
