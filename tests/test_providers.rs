//! Provider wire behaviour against a throwaway upstream on 127.0.0.1.
//!
//! The upstream records every request it receives so tests can check headers
//! and payloads as well as the resolved reply.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{Json, Router, http::HeaderMap, http::StatusCode, routing::post};
use codex_pipeline::app::AppContext;
use codex_pipeline::config::{ApiKeys, Config};
use codex_pipeline::llm::GenerationRequest;
use codex_pipeline::resolver::Origin;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
struct Seen {
    path: &'static str,
    headers: HeaderMap,
    body: Value,
}

type Log = Arc<Mutex<Vec<Seen>>>;

fn route(log: &Log, path: &'static str, status: StatusCode, reply: Value) -> Router {
    let log = log.clone();
    Router::new().route(
        path,
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let log = log.clone();
            let reply = reply.clone();
            async move {
                log.lock().unwrap().push(Seen { path, headers, body });
                (status, Json(reply))
            }
        }),
    )
}

async fn upstream(log: &Log) -> SocketAddr {
    let router = Router::new()
        .merge(route(
            log,
            "/anthropic/ok",
            StatusCode::OK,
            json!({ "content": [{ "type": "text", "text": "Hi" }] }),
        ))
        .merge(route(log, "/anthropic/empty", StatusCode::OK, json!({ "content": [] })))
        .merge(route(
            log,
            "/anthropic/billing",
            StatusCode::BAD_REQUEST,
            json!({
                "type": "error",
                "error": { "type": "invalid_request_error", "message": "Your credit balance is too low" }
            }),
        ))
        .merge(route(
            log,
            "/openai/ok",
            StatusCode::OK,
            json!({ "choices": [{ "message": { "role": "assistant", "content": "From OpenAI" } }] }),
        ))
        .merge(route(
            log,
            "/openai/padded",
            StatusCode::OK,
            json!({ "choices": [{ "message": { "role": "assistant", "content": "  spaced out\n" } }] }),
        ))
        .merge(route(
            log,
            "/openai/quota",
            StatusCode::TOO_MANY_REQUESTS,
            json!({
                "error": { "message": "You exceeded your current quota", "code": "insufficient_quota" }
            }),
        ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn config(addr: SocketAddr, anthropic: &str, openai: &str, keys: ApiKeys) -> Config {
    let mut cfg = Config::default();
    cfg.llm.anthropic.api_base_url = format!("http://{addr}{anthropic}");
    cfg.llm.openai.api_base_url = format!("http://{addr}{openai}");
    cfg.llm.anthropic.timeout_seconds = 5;
    cfg.llm.openai.timeout_seconds = 5;
    cfg.keys = keys;
    cfg
}

fn both_keys() -> ApiKeys {
    ApiKeys::new(Some("sk-ant-test".into()), Some("sk-oai-test".into()))
}

fn request(message: &str, context: Option<&str>) -> GenerationRequest {
    GenerationRequest::new(message, context.map(str::to_string), None).unwrap()
}

#[tokio::test]
async fn anthropic_text_block_is_live_reply() {
    let log = Log::default();
    let addr = upstream(&log).await;
    let ctx = AppContext::from_config(&config(addr, "/anthropic/ok", "/openai/ok", both_keys())).unwrap();

    let reply = ctx.chat(request("Hello", None)).await.unwrap();
    assert_eq!(reply.response, "Hi");
    assert_eq!(reply.origin, Origin::Live);

    let seen = log.lock().unwrap().clone();
    assert_eq!(seen.len(), 1, "openai must not be called after a success");
    let call = &seen[0];
    assert_eq!(call.path, "/anthropic/ok");
    assert_eq!(call.headers["x-api-key"], "sk-ant-test");
    assert_eq!(call.headers["anthropic-version"], "2023-06-01");
    assert_eq!(call.body["model"], "claude-3-5-sonnet-20241022");
    assert_eq!(call.body["max_tokens"], 2000);
    assert_eq!(call.body["messages"][0]["role"], "user");
    assert_eq!(call.body["messages"][0]["content"][0]["type"], "text");
    assert_eq!(call.body["messages"][0]["content"][0]["text"], "Hello");
}

#[tokio::test]
async fn context_is_prepended_to_prompt() {
    let log = Log::default();
    let addr = upstream(&log).await;
    let ctx = AppContext::from_config(&config(addr, "/anthropic/ok", "/openai/ok", both_keys())).unwrap();

    ctx.chat(request("Hello", Some("The user likes Rust"))).await.unwrap();

    let seen = log.lock().unwrap().clone();
    assert_eq!(
        seen[0].body["messages"][0]["content"][0]["text"],
        "Context: The user likes Rust\n\nUser: Hello"
    );
}

#[tokio::test]
async fn anthropic_body_without_text_is_stringified() {
    let log = Log::default();
    let addr = upstream(&log).await;
    let ctx = AppContext::from_config(&config(addr, "/anthropic/empty", "/openai/ok", both_keys())).unwrap();

    let reply = ctx.chat(request("Hello", None)).await.unwrap();
    assert_eq!(reply.origin, Origin::Live);
    assert_eq!(reply.response, r#"{"content":[]}"#);
}

#[tokio::test]
async fn anthropic_error_falls_through_to_openai() {
    let log = Log::default();
    let addr = upstream(&log).await;
    let ctx = AppContext::from_config(&config(addr, "/anthropic/billing", "/openai/ok", both_keys())).unwrap();

    let reply = ctx.chat(request("Hello", None)).await.unwrap();
    assert_eq!(reply.response, "From OpenAI");
    assert_eq!(reply.origin, Origin::Live);

    let seen = log.lock().unwrap().clone();
    let paths: Vec<_> = seen.iter().map(|s| s.path).collect();
    assert_eq!(paths, vec!["/anthropic/billing", "/openai/ok"]);

    let openai = &seen[1];
    assert_eq!(openai.headers["authorization"], "Bearer sk-oai-test");
    assert_eq!(openai.body["model"], "gpt-4o");
    let messages = openai.body["messages"].as_array().unwrap();
    assert_eq!(messages.last().unwrap()["content"], "Hello");
}

#[tokio::test]
async fn openai_content_is_returned_verbatim() {
    let log = Log::default();
    let addr = upstream(&log).await;
    let keys = ApiKeys::new(None, Some("sk-oai-test".into()));
    let ctx = AppContext::from_config(&config(addr, "/anthropic/ok", "/openai/padded", keys)).unwrap();

    let reply = ctx.chat(request("Hello", None)).await.unwrap();
    assert_eq!(reply.origin, Origin::Live);
    assert_eq!(reply.response, "  spaced out\n");
}

#[tokio::test]
async fn provider_without_key_is_never_called() {
    let log = Log::default();
    let addr = upstream(&log).await;
    let keys = ApiKeys::new(None, Some("sk-oai-test".into()));
    let ctx = AppContext::from_config(&config(addr, "/anthropic/ok", "/openai/ok", keys)).unwrap();

    let reply = ctx.chat(request("Hello", None)).await.unwrap();
    assert_eq!(reply.response, "From OpenAI");

    let seen = log.lock().unwrap().clone();
    assert!(seen.iter().all(|s| s.path != "/anthropic/ok"));
}

#[tokio::test]
async fn both_failing_with_keys_explains_quota() {
    let log = Log::default();
    let addr = upstream(&log).await;
    let ctx =
        AppContext::from_config(&config(addr, "/anthropic/billing", "/openai/quota", both_keys())).unwrap();

    let reply = ctx.chat(request("What is AI?", None)).await.unwrap();
    assert_eq!(reply.origin, Origin::FallbackExplained);
    assert!(reply.response.contains("What is AI?"));
    assert!(reply.response.contains("Anthropic"));
    assert!(reply.response.contains("OpenAI"));
    assert!(reply.response.contains("quota"));
    assert!(!reply.response.contains("Mock AI response for:"));

    let history = ctx.sessions().history(&reply.session_id).unwrap();
    assert_eq!(history.messages.len(), 2);
    assert_eq!(history.messages[1].text, reply.response);
}

#[tokio::test]
async fn chat_over_tcp_then_graceful_shutdown() {
    let log = Log::default();
    let addr = upstream(&log).await;
    let ctx = AppContext::from_config(&config(addr, "/anthropic/ok", "/openai/ok", both_keys())).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let app_addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(codex_pipeline::comms::serve_on(listener, Arc::new(ctx), shutdown.clone()));

    let body: Value = reqwest::Client::new()
        .post(format!("http://{app_addr}/chat"))
        .json(&json!({ "message": "Hello", "session_id": "tcp-session" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["response"], "Hi");
    assert_eq!(body["session_id"], "tcp-session");
    assert_eq!(body["origin"], "live");

    shutdown.cancel();
    server.await.unwrap().unwrap();
}
