//! Elasticsearch `/_bulk` sink over HTTP.
//!
//! Uses async reqwest on a runtime owned by the sink, but presents the sync
//! [`BulkSink`] interface expected by flush worker threads.

use std::io;
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::document::Document;
use crate::error::TransportError;
use crate::sink::{BulkReport, BulkSink, ItemFailure};

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest slice of an error body kept in a transport error message
const ERROR_BODY_LIMIT: usize = 512;

/// Connection settings for [`ElasticsearchSink`]
#[derive(Debug, Clone)]
pub struct ElasticsearchConfig {
    pub host: String,
    pub port: u16,
    /// Prepended to every partition key as `<prefix>-<key>`; empty for none
    pub index_prefix: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9200,
            index_prefix: "heapstats".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl ElasticsearchConfig {
    pub fn bulk_url(&self) -> String {
        format!("http://{}:{}/_bulk", self.host, self.port)
    }

    /// Index a partition key is routed to.
    pub fn index_name(&self, partition_key: &str) -> String {
        if self.index_prefix.is_empty() {
            partition_key.to_string()
        } else {
            format!("{}-{partition_key}", self.index_prefix)
        }
    }
}

pub struct ElasticsearchSink {
    config: ElasticsearchConfig,
    url: String,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl std::fmt::Debug for ElasticsearchSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchSink")
            .field("url", &self.url)
            .field("index_prefix", &self.config.index_prefix)
            .finish_non_exhaustive()
    }
}

impl ElasticsearchSink {
    pub fn new(config: ElasticsearchConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| TransportError::from_reqwest(&e))?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("hsloader-http")
            .enable_all()
            .build()?;
        let url = config.bulk_url();
        Ok(Self {
            config,
            url,
            client,
            runtime,
        })
    }
}

impl BulkSink for ElasticsearchSink {
    fn submit_batch(&self, documents: &[Document]) -> Result<BulkReport, TransportError> {
        let body = render_bulk_body(documents, |key| self.config.index_name(key))?;

        self.runtime.block_on(async {
            let response = self
                .client
                .post(&self.url)
                .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
                .timeout(self.config.timeout)
                .body(body)
                .send()
                .await
                .map_err(|e| TransportError::from_reqwest(&e))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| TransportError::from_reqwest(&e))?;

            if !status.is_success() {
                return Err(TransportError::Http {
                    status: Some(status.as_u16()),
                    message: truncate(&text, ERROR_BODY_LIMIT).to_string(),
                });
            }
            parse_bulk_response(&text, documents)
        })
    }
}

/// NDJSON bulk body: an action line and a source line per document,
/// each terminated by `\n`.
pub fn render_bulk_body(
    documents: &[Document],
    index_name: impl Fn(&str) -> String,
) -> Result<String, TransportError> {
    let mut payload = Vec::with_capacity(documents.len() * 256);
    for doc in documents {
        let action = serde_json::json!({ "index": { "_index": index_name(doc.partition_key()) } });
        serde_json::to_writer(&mut payload, &action).map_err(io::Error::other)?;
        payload.push(b'\n');
        serde_json::to_writer(&mut payload, doc.body()).map_err(io::Error::other)?;
        payload.push(b'\n');
    }
    String::from_utf8(payload).map_err(|e| TransportError::Io(io::Error::other(e)))
}

#[derive(Debug, Deserialize)]
struct BulkResponseBody {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Option<Vec<FxHashMap<String, BulkItem>>>,
    /// Request-level failure, e.g. `{"error":{...},"status":400}`
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    status: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl BulkItem {
    fn failure_reason(&self) -> Option<String> {
        match &self.error {
            Some(err) => Some(error_reason(err)),
            None if self.status >= 300 => Some(format!("status {}", self.status)),
            None => None,
        }
    }
}

fn error_reason(err: &serde_json::Value) -> String {
    err.get("reason")
        .and_then(|r| r.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string())
}

/// Decode a delivered `/_bulk` response into per-document outcomes.
///
/// An unparsable body, a request-level `error` or a body without `items` is
/// a transport failure. Documents without a matching item count as failed,
/// and so does the whole batch when `errors` is set but no item says why.
pub fn parse_bulk_response(
    body: &str,
    documents: &[Document],
) -> Result<BulkReport, TransportError> {
    let parsed: BulkResponseBody = serde_json::from_str(body)
        .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

    if let Some(err) = &parsed.error {
        return Err(TransportError::Http {
            status: parsed.status,
            message: truncate(&error_reason(err), ERROR_BODY_LIMIT).to_string(),
        });
    }
    let items = parsed
        .items
        .ok_or_else(|| TransportError::MalformedResponse("bulk response has no items".to_string()))?;
    if items.len() != documents.len() {
        log::warn!(
            "bulk response has {} items for {} documents",
            items.len(),
            documents.len()
        );
    }

    let failure = |position: usize, reason: String| ItemFailure {
        position,
        partition_key: documents[position].partition_key().to_string(),
        reason,
    };

    let mut failures: Vec<ItemFailure> = (0..documents.len())
        .filter_map(|position| {
            let reason = match items.get(position) {
                Some(item) => match item.values().next() {
                    Some(result) => result.failure_reason()?,
                    None => "empty bulk response item".to_string(),
                },
                None => "no bulk response item".to_string(),
            };
            Some(failure(position, reason))
        })
        .collect();

    if parsed.errors && failures.is_empty() {
        failures = (0..documents.len())
            .map(|position| {
                failure(
                    position,
                    "bulk response reported errors without a failed item".to_string(),
                )
            })
            .collect();
    }

    Ok(BulkReport {
        total: documents.len(),
        failures,
    })
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
