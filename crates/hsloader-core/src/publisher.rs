//! Batching publisher: accumulates documents and flushes them as bulk
//! requests on worker threads, tracking partial failure.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crate::document::Document;
use crate::error::{PublishError, TransportError};
use crate::semaphore::{Permit, Semaphore};
use crate::sink::{BulkReport, BulkSink};

/// Documents per bulk request unless configured otherwise.
pub const DEFAULT_BULK_SIZE: usize = 1000;

/// Failed documents listed per bulk in the error log
const FAILURE_LOG_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublisherConfig {
    /// Documents per bulk request
    pub bulk_size: usize,
    /// Bulk requests allowed in flight at once
    pub concurrency: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            bulk_size: DEFAULT_BULK_SIZE,
            concurrency: cpus,
        }
    }
}

/// Terminal status of an ingestion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    pub succeeded: bool,
    /// Bulk requests completed (delivered or not)
    pub batches: usize,
    /// Documents in delivered bulk requests
    pub documents: usize,
    /// Documents the store reported as failed
    pub failed_documents: usize,
    pub transport_error: Option<String>,
}

impl RunResult {
    pub fn status_line(&self) -> &'static str {
        if self.succeeded {
            "Succeeded"
        } else {
            "Failed"
        }
    }
}

/// What a flush worker reports back on completion.
#[derive(Debug)]
pub enum FlushOutcome {
    Delivered(BulkReport),
    Transport(TransportError),
    /// The sink panicked inside `submit_batch`
    Panicked,
}

/// Aggregated flush results, written by flush workers.
#[derive(Debug, Default)]
struct RunStatus {
    failed: AtomicBool,
    transport_error: Mutex<Option<String>>,
    batches: AtomicUsize,
    documents: AtomicUsize,
    failed_documents: AtomicUsize,
}

impl RunStatus {
    fn on_flush_complete(&self, id: u64, size: usize, outcome: FlushOutcome) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        match outcome {
            FlushOutcome::Delivered(report) => {
                self.documents.fetch_add(report.total, Ordering::Relaxed);
                if report.has_failures() {
                    self.failed_documents
                        .fetch_add(report.failures.len(), Ordering::Relaxed);
                    self.failed.store(true, Ordering::Release);
                    log::error!(
                        "bulk #{id}: {}",
                        report.failure_message(FAILURE_LOG_LIMIT)
                    );
                } else {
                    log::debug!("bulk #{id}: {size} documents indexed");
                }
            }
            FlushOutcome::Transport(e) => {
                log::error!("bulk #{id} ({size} documents) failed: {e}");
                self.fatal(e.to_string());
            }
            FlushOutcome::Panicked => {
                log::error!("bulk #{id} ({size} documents): flush worker panicked");
                self.fatal("bulk flush worker panicked".to_string());
            }
        }
    }

    fn fatal(&self, message: String) {
        self.lock_transport().get_or_insert(message);
        self.failed.store(true, Ordering::Release);
    }

    fn transport_error(&self) -> Option<String> {
        self.lock_transport().clone()
    }

    fn lock_transport(&self) -> MutexGuard<'_, Option<String>> {
        self.transport_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn result(&self) -> RunResult {
        RunResult {
            succeeded: !self.failed.load(Ordering::Acquire),
            batches: self.batches.load(Ordering::Relaxed),
            documents: self.documents.load(Ordering::Relaxed),
            failed_documents: self.failed_documents.load(Ordering::Relaxed),
            transport_error: self.transport_error(),
        }
    }
}

/// Accumulates documents and flushes every `bulk_size` of them as one bulk
/// request on a worker thread.
///
/// At most `concurrency` flushes run at once; beyond that `submit` blocks.
/// Per-document failures mark the run failed but ingestion continues. A
/// transport failure is fatal: later submits fast-fail and `close()` returns
/// the error after draining whatever is in flight.
pub struct BatchPublisher {
    sink: Mutex<Option<Arc<dyn BulkSink>>>,
    bulk_size: usize,
    /// Guards both the buffer and the closed transition
    pending: Mutex<Vec<Document>>,
    closed: AtomicBool,
    permits: Arc<Semaphore>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    status: Arc<RunStatus>,
    next_batch: AtomicU64,
}

impl std::fmt::Debug for BatchPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchPublisher")
            .field("bulk_size", &self.bulk_size)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl BatchPublisher {
    pub fn new(sink: Arc<dyn BulkSink>, config: PublisherConfig) -> Self {
        let bulk_size = config.bulk_size.max(1);
        Self {
            sink: Mutex::new(Some(sink)),
            bulk_size,
            pending: Mutex::new(Vec::with_capacity(bulk_size)),
            closed: AtomicBool::new(false),
            permits: Semaphore::new(config.concurrency.max(1)),
            workers: Mutex::new(Vec::new()),
            status: Arc::new(RunStatus::default()),
            next_batch: AtomicU64::new(0),
        }
    }

    /// Append a document; dispatches a flush once `bulk_size` are pending.
    ///
    /// Blocks while `concurrency` flushes are already in flight.
    pub fn submit(&self, doc: Document) -> Result<(), PublishError> {
        if let Some(msg) = self.status.transport_error() {
            return Err(PublishError::Transport(msg));
        }
        let full = {
            let mut pending = self.lock_pending();
            if self.closed.load(Ordering::Acquire) {
                return Err(PublishError::Closed);
            }
            pending.push(doc);
            if pending.len() >= self.bulk_size {
                // Permit taken before the buffer is released so close() waits for this batch
                let permit = self.permits.acquire();
                let batch = std::mem::replace(&mut *pending, Vec::with_capacity(self.bulk_size));
                Some((batch, permit))
            } else {
                None
            }
        };
        match full {
            Some((batch, permit)) => self.dispatch(batch, permit),
            None => Ok(()),
        }
    }

    /// Dispatch whatever is pending, even if below `bulk_size`.
    pub fn flush(&self) -> Result<(), PublishError> {
        let taken = {
            let mut pending = self.lock_pending();
            if pending.is_empty() {
                None
            } else {
                let permit = self.permits.acquire();
                Some((std::mem::take(&mut *pending), permit))
            }
        };
        match taken {
            Some((batch, permit)) => self.dispatch(batch, permit),
            None => Ok(()),
        }
    }

    /// Flush the pending buffer, wait for every in-flight flush, release the
    /// sink.
    ///
    /// Safe to call repeatedly; later calls only report the outcome.
    pub fn close(&self) -> Result<RunResult, PublishError> {
        let remaining = {
            let mut pending = self.lock_pending();
            if self.closed.swap(true, Ordering::AcqRel) || pending.is_empty() {
                None
            } else {
                let permit = self.permits.acquire();
                Some((std::mem::take(&mut *pending), permit))
            }
        };

        if let Some((batch, permit)) = remaining {
            if let Err(e) = self.dispatch(batch, permit) {
                log::debug!("final flush not sent: {e}");
            }
        }

        self.permits.wait_idle();
        self.reap(true);
        self.lock_sink().take();

        let result = self.status.result();
        match &result.transport_error {
            Some(msg) => Err(PublishError::Transport(msg.clone())),
            None => Ok(result),
        }
    }

    /// False once any flush reported a per-document or transport failure.
    pub fn is_succeeded(&self) -> bool {
        !self.status.failed.load(Ordering::Acquire)
    }

    /// True once a transport failure has been recorded.
    pub fn is_aborted(&self) -> bool {
        self.status.transport_error().is_some()
    }

    /// Current aggregate status; final once `close()` returned.
    pub fn result(&self) -> RunResult {
        self.status.result()
    }

    fn dispatch(&self, batch: Vec<Document>, permit: Permit) -> Result<(), PublishError> {
        let sink = self.lock_sink().clone().ok_or(PublishError::Closed)?;
        let size = batch.len();
        // The sink may have failed while this batch waited for its permit
        if let Some(msg) = self.status.transport_error() {
            log::debug!("dropping {size} documents after transport failure");
            return Err(PublishError::Transport(msg));
        }
        let id = self.next_batch.fetch_add(1, Ordering::Relaxed);
        let status = Arc::clone(&self.status);

        let spawned = std::thread::Builder::new()
            .name(format!("hsloader-bulk-{id}"))
            .spawn(move || {
                let _permit = permit;
                log::debug!("bulk #{id}: sending {size} documents");
                // Recorded here so a panic is counted even before close() can join us
                let submitted = panic::catch_unwind(AssertUnwindSafe(|| sink.submit_batch(&batch)));
                let outcome = match submitted {
                    Ok(Ok(report)) => FlushOutcome::Delivered(report),
                    Ok(Err(e)) => FlushOutcome::Transport(e),
                    Err(_) => FlushOutcome::Panicked,
                };
                status.on_flush_complete(id, size, outcome);
            });

        match spawned {
            Ok(handle) => {
                self.reap(false);
                self.lock_workers().push(handle);
            }
            Err(e) => {
                log::error!("bulk #{id}: failed to start flush worker: {e}");
                self.status
                    .fatal(format!("failed to start flush worker: {e}"));
            }
        }
        Ok(())
    }

    /// Join finished workers (all of them when `all`), recording panics that
    /// escaped the worker as fatal failures.
    fn reap(&self, all: bool) {
        let handles: Vec<JoinHandle<()>> = {
            let mut workers = self.lock_workers();
            if all {
                std::mem::take(&mut *workers)
            } else {
                let (done, running) = std::mem::take(&mut *workers)
                    .into_iter()
                    .partition(|h| h.is_finished());
                *workers = running;
                done
            }
        };
        for handle in handles {
            if handle.join().is_err() {
                log::error!("bulk flush worker panicked");
                self.status.fatal("bulk flush worker panicked".to_string());
            }
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, Vec<Document>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_sink(&self) -> MutexGuard<'_, Option<Arc<dyn BulkSink>>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for BatchPublisher {
    fn drop(&mut self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if let Err(e) = self.close() {
            log::error!("closing bulk publisher: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use serde_json::json;
    use std::time::Duration;

    fn doc(n: usize) -> Document {
        Document::new("test-201601".to_string(), &json!({ "n": n })).unwrap()
    }

    fn publisher(sink: &Arc<MemorySink>, bulk_size: usize, concurrency: usize) -> BatchPublisher {
        BatchPublisher::new(
            Arc::clone(sink) as Arc<dyn BulkSink>,
            PublisherConfig {
                bulk_size,
                concurrency,
            },
        )
    }

    fn delivered_ids(sink: &MemorySink) -> Vec<usize> {
        let mut ids: Vec<usize> = sink
            .documents()
            .iter()
            .map(|d| d.field("n").and_then(|v| v.as_u64()).unwrap() as usize)
            .collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn batches_of_bulk_size_with_partial_tail() {
        let sink = Arc::new(MemorySink::new());
        let publisher = publisher(&sink, 3, 2);
        for n in 0..7 {
            publisher.submit(doc(n)).unwrap();
        }
        let result = publisher.close().unwrap();

        let mut sizes = sink.batch_sizes();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 3, 3]);
        assert_eq!(delivered_ids(&sink), (0..7).collect::<Vec<_>>());
        assert!(result.succeeded);
        assert_eq!(result.batches, 3);
        assert_eq!(result.documents, 7);
    }

    #[test]
    fn exact_multiple_has_no_tail_batch() {
        let sink = Arc::new(MemorySink::new());
        let publisher = publisher(&sink, 2, 1);
        for n in 0..4 {
            publisher.submit(doc(n)).unwrap();
        }
        publisher.close().unwrap();
        assert_eq!(sink.batch_sizes(), vec![2, 2]);
    }

    #[test]
    fn concurrent_submits_deliver_each_document_once() {
        let sink = Arc::new(MemorySink::new());
        let publisher = Arc::new(publisher(&sink, 10, 3));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let publisher = Arc::clone(&publisher);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        publisher.submit(doc(t * 250 + i)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        publisher.close().unwrap();

        assert!(sink.batch_sizes().iter().all(|&s| s == 10));
        assert_eq!(delivered_ids(&sink), (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn in_flight_flushes_are_bounded() {
        let sink = Arc::new(MemorySink::new().with_delay(Duration::from_millis(20)));
        let publisher = publisher(&sink, 1, 2);
        for n in 0..8 {
            publisher.submit(doc(n)).unwrap();
        }
        publisher.close().unwrap();
        assert_eq!(sink.batch_sizes().len(), 8);
        assert!(sink.peak_in_flight() <= 2);
    }

    #[test]
    fn document_failure_marks_run_failed_but_continues() {
        let sink = Arc::new(MemorySink::new().reject_documents(0, 1));
        let publisher = publisher(&sink, 2, 1);
        for n in 0..6 {
            publisher.submit(doc(n)).unwrap();
        }
        let result = publisher.close().unwrap();

        assert!(!publisher.is_succeeded());
        assert!(!result.succeeded);
        assert_eq!(result.status_line(), "Failed");
        assert_eq!(result.failed_documents, 1);
        assert_eq!(sink.batch_sizes().len(), 3);
    }

    #[test]
    fn transport_failure_is_fatal_at_close() {
        let sink = Arc::new(MemorySink::new().fail_transport(0, "connection refused"));
        let publisher = publisher(&sink, 2, 1);
        publisher.submit(doc(0)).unwrap();
        publisher.submit(doc(1)).unwrap();
        publisher.submit(doc(2)).ok();

        let err = publisher.close().unwrap_err();
        assert!(matches!(err, PublishError::Transport(ref m) if m.contains("connection refused")));
        assert!(!publisher.is_succeeded());
        assert!(publisher.is_aborted());
        assert!(publisher.result().transport_error.is_some());
    }

    #[test]
    fn submit_fast_fails_after_transport_failure() {
        let sink = Arc::new(MemorySink::new().fail_transport(0, "down"));
        let publisher = publisher(&sink, 1, 1);
        publisher.submit(doc(0)).unwrap();
        // Wait for the failing flush to complete
        publisher.permits.wait_idle();
        assert!(matches!(
            publisher.submit(doc(1)),
            Err(PublishError::Transport(_))
        ));
    }

    #[test]
    fn submit_waiting_on_permit_does_not_reach_failed_sink() {
        let sink = Arc::new(
            MemorySink::new()
                .fail_transport(0, "down")
                .with_delay(Duration::from_millis(50)),
        );
        let publisher = publisher(&sink, 1, 1);
        publisher.submit(doc(0)).unwrap();
        // Blocks on the permit until the failing flush completes
        assert!(matches!(
            publisher.submit(doc(1)),
            Err(PublishError::Transport(_))
        ));
        assert!(publisher.close().is_err());
        assert_eq!(sink.attempts(), 1);
    }

    struct PanickingSink;

    impl BulkSink for PanickingSink {
        fn submit_batch(&self, _documents: &[Document]) -> Result<BulkReport, TransportError> {
            panic!("sink exploded");
        }
    }

    #[test]
    fn worker_panic_is_recorded_as_fatal() {
        let publisher = BatchPublisher::new(
            Arc::new(PanickingSink),
            PublisherConfig {
                bulk_size: 1,
                concurrency: 1,
            },
        );
        publisher.submit(doc(0)).unwrap();
        publisher.permits.wait_idle();
        // Recorded by the worker itself, before any join
        assert!(publisher.is_aborted());
        let err = publisher.close().unwrap_err();
        assert!(matches!(err, PublishError::Transport(ref m) if m.contains("panicked")));
        assert_eq!(publisher.result().batches, 1);
        assert_eq!(publisher.result().status_line(), "Failed");
    }

    #[test]
    fn all_success_is_succeeded() {
        let sink = Arc::new(MemorySink::new());
        let publisher = publisher(&sink, 4, 2);
        for n in 0..9 {
            publisher.submit(doc(n)).unwrap();
        }
        let result = publisher.close().unwrap();
        assert!(publisher.is_succeeded());
        assert_eq!(result.status_line(), "Succeeded");
    }

    #[test]
    fn close_twice_does_not_flush_again() {
        let sink = Arc::new(MemorySink::new());
        let publisher = publisher(&sink, 10, 1);
        publisher.submit(doc(0)).unwrap();
        let first = publisher.close().unwrap();
        let second = publisher.close().unwrap();
        assert_eq!(sink.attempts(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn close_with_empty_buffer_sends_nothing() {
        let sink = Arc::new(MemorySink::new());
        let publisher = publisher(&sink, 10, 1);
        let result = publisher.close().unwrap();
        assert_eq!(sink.attempts(), 0);
        assert!(result.succeeded);
        assert_eq!(result.batches, 0);
    }

    #[test]
    fn explicit_flush_sends_partial_batch() {
        let sink = Arc::new(MemorySink::new());
        let publisher = publisher(&sink, 10, 1);
        publisher.submit(doc(0)).unwrap();
        publisher.flush().unwrap();
        publisher.flush().unwrap();
        publisher.close().unwrap();
        assert_eq!(sink.batch_sizes(), vec![1]);
    }

    #[test]
    fn submit_after_close_is_rejected() {
        let sink = Arc::new(MemorySink::new());
        let publisher = publisher(&sink, 10, 1);
        publisher.close().unwrap();
        assert!(matches!(publisher.submit(doc(0)), Err(PublishError::Closed)));
    }

    #[test]
    fn drop_drains_pending() {
        let sink = Arc::new(MemorySink::new());
        {
            let publisher = publisher(&sink, 10, 1);
            publisher.submit(doc(0)).unwrap();
            publisher.submit(doc(1)).unwrap();
        }
        assert_eq!(sink.batch_sizes(), vec![2]);
    }
}
