//! Bulk-write sink interface and the in-memory sink

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::document::Document;
use crate::error::TransportError;

/// One document the store refused inside an otherwise delivered bulk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Position of the document within its batch
    pub position: usize,
    pub partition_key: String,
    pub reason: String,
}

/// Per-document outcome of a delivered bulk request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub total: usize,
    pub failures: Vec<ItemFailure>,
}

impl BulkReport {
    /// Every document accepted
    pub fn accepted(total: usize) -> Self {
        Self {
            total,
            failures: Vec::new(),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// One line per failed document, capped at `limit` lines.
    pub fn failure_message(&self, limit: usize) -> String {
        let mut msg = format!(
            "{} of {} documents failed",
            self.failures.len(),
            self.total
        );
        for failure in self.failures.iter().take(limit) {
            msg.push_str(&format!(
                "\n  [{}] {}: {}",
                failure.position, failure.partition_key, failure.reason
            ));
        }
        if self.failures.len() > limit {
            msg.push_str(&format!("\n  ... {} more", self.failures.len() - limit));
        }
        msg
    }
}

/// Destination of bulk requests.
///
/// Called from flush worker threads; implementations must be shareable.
/// `Ok` means the request was delivered, even if the report lists
/// per-document failures. `Err` is a transport failure.
pub trait BulkSink: Send + Sync {
    fn submit_batch(&self, documents: &[Document]) -> Result<BulkReport, TransportError>;
}

/// Scripted reaction of [`MemorySink`] to a given batch number.
#[derive(Debug, Clone)]
enum Scripted {
    RejectFirst(usize),
    Transport(String),
}

#[derive(Default)]
struct MemoryState {
    attempts: usize,
    batches: Vec<Vec<Document>>,
}

/// In-process sink that records every delivered batch.
///
/// Batches are numbered from 0 in arrival order. Individual batches can be
/// scripted to report rejected documents or to fail at the transport level.
#[derive(Default)]
pub struct MemorySink {
    state: Mutex<MemoryState>,
    script: FxHashMap<usize, Scripted>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl std::fmt::Debug for MemorySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySink")
            .field("batches", &self.batch_sizes())
            .finish_non_exhaustive()
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the first `count` documents of batch `batch` as rejected.
    pub fn reject_documents(mut self, batch: usize, count: usize) -> Self {
        self.script.insert(batch, Scripted::RejectFirst(count));
        self
    }

    /// Fail batch `batch` at the transport level.
    pub fn fail_transport(mut self, batch: usize, message: &str) -> Self {
        self.script
            .insert(batch, Scripted::Transport(message.to_string()));
        self
    }

    /// Hold every request for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Batches delivered so far, in arrival order.
    pub fn batches(&self) -> Vec<Vec<Document>> {
        self.lock().batches.clone()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.lock().batches.iter().map(Vec::len).collect()
    }

    /// All delivered documents, flattened.
    pub fn documents(&self) -> Vec<Document> {
        self.lock().batches.iter().flatten().cloned().collect()
    }

    /// Requests received, including ones failed at the transport level.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    /// Highest number of requests observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BulkSink for MemorySink {
    fn submit_batch(&self, documents: &[Document]) -> Result<BulkReport, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let number = {
            let mut state = self.lock();
            state.attempts += 1;
            state.attempts - 1
        };
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let result = match self.script.get(&number) {
            Some(Scripted::Transport(message)) => Err(TransportError::Http {
                status: None,
                message: message.clone(),
            }),
            scripted => {
                let reject = match scripted {
                    Some(Scripted::RejectFirst(n)) => *n,
                    _ => 0,
                };
                let failures = documents
                    .iter()
                    .take(reject)
                    .enumerate()
                    .map(|(position, doc)| ItemFailure {
                        position,
                        partition_key: doc.partition_key().to_string(),
                        reason: "rejected by memory sink".to_string(),
                    })
                    .collect();
                self.lock().batches.push(documents.to_vec());
                Ok(BulkReport {
                    total: documents.len(),
                    failures,
                })
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
