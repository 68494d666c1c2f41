//! hsloader core - shared infrastructure for loading HeapStats monitoring
//! records into a time-partitioned document store.
//!
//! Record transformers turn parsed records into [`Document`]s and hand them
//! to a [`BatchPublisher`], which batches them into bulk requests against a
//! [`BulkSink`].

pub mod document;
pub mod elasticsearch;
pub mod error;
pub mod logging;
pub mod progress;
pub mod publisher;
pub mod semaphore;
pub mod shutdown;
pub mod sink;
pub mod timestamp_index;
pub mod zone;

// Re-exports for convenience
pub use document::{Document, DocumentBody, DocumentKind, Tag, partition_key, partition_suffix};
pub use elasticsearch::{ElasticsearchConfig, ElasticsearchSink};
pub use error::{ParseError, PublishError, TransformError, TransportError, log_error};
pub use logging::init_logging;
pub use progress::{ProgressContext, fmt_num};
pub use publisher::{BatchPublisher, DEFAULT_BULK_SIZE, PublisherConfig, RunResult};
pub use shutdown::{install_signal_handlers, is_shutdown_requested};
pub use sink::{BulkReport, BulkSink, ItemFailure, MemorySink};
pub use timestamp_index::{TimestampIndex, Timestamped};
pub use zone::Zone;

/// Settings threaded from the binary into every transformer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Zone record timestamps were written in
    pub zone: Zone,
    /// Log full error source chains
    pub debug: bool,
}
