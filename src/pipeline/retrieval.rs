//! Document retrieval against an external index.

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::PipelineError;

pub enum Retriever {
    /// One canned document echoing the query.
    Stub,
    Http(HttpRetriever),
}

impl Retriever {
    pub fn name(&self) -> &'static str {
        match self {
            Retriever::Stub => "stub",
            Retriever::Http(_) => "http",
        }
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<String>, PipelineError> {
        match self {
            Retriever::Stub => Ok(vec![format!("Mock document for: {query}")]),
            Retriever::Http(r) => r.retrieve(query).await,
        }
    }
}

/// Queries a document index over HTTP.
///
/// Request: `{"query_texts": [query], "n_results": n}`. The `documents` field
/// of the reply may be a list of strings, a list of lists of strings (one per
/// query text), or a list of `{"document": ...}` objects.
pub struct HttpRetriever {
    client: Client,
    url: String,
    n_results: usize,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query_texts: [&'a str; 1],
    n_results: usize,
}

impl HttpRetriever {
    pub fn new(url: &str, n_results: usize) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| PipelineError::Retrieval(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, url: url.to_string(), n_results })
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<String>, PipelineError> {
        let body = QueryRequest { query_texts: [query], n_results: self.n_results };
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Retrieval(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Retrieval(format!("index returned HTTP {status}")));
        }

        let raw = response
            .json::<Value>()
            .await
            .map_err(|e| PipelineError::Retrieval(format!("failed to parse index reply: {e}")))?;

        let docs = parse_documents(&raw)?;
        debug!(count = docs.len(), "retrieved documents");
        Ok(docs)
    }
}

fn parse_documents(raw: &Value) -> Result<Vec<String>, PipelineError> {
    let items = raw
        .get("documents")
        .and_then(Value::as_array)
        .ok_or_else(|| PipelineError::Retrieval("index reply has no documents list".into()))?;

    let mut docs = Vec::new();
    for item in items {
        match item {
            Value::String(s) => docs.push(s.clone()),
            Value::Array(inner) => docs.extend(inner.iter().filter_map(Value::as_str).map(str::to_string)),
            Value::Object(obj) => {
                if let Some(doc) = obj.get("document").and_then(Value::as_str) {
                    docs.push(doc.to_string());
                }
            }
            _ => {}
        }
    }
    Ok(docs)
}
