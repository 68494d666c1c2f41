//! hsloader snapshot - heap snapshot files to summary, object and
//! reference documents.
//!
//! A [`SnapshotParser`] pushes events into a [`SnapshotTransformer`], which
//! submits documents to a [`BatchPublisher`](hsloader_core::BatchPublisher).
//!
//! # Example
//!
//! ```ignore
//! use hsloader_snapshot::{JsonDumpParser, run};
//!
//! let summary = run(&mut JsonDumpParser::new(), &files, &publisher, options, &progress);
//! println!("{} snapshots", summary.stats.snapshots);
//! ```

pub mod handler;
pub mod parser;
pub mod record;
pub mod runner;
pub mod transform;

// Re-exports
pub use handler::{ParseResult, SnapshotEventHandler};
pub use parser::{JsonDumpParser, SnapshotParser};
pub use record::{ChildObject, ChildRecord, ObjectRecord, SnapshotHeader};
pub use runner::{Summary, run};
pub use transform::{SnapshotStats, SnapshotTransformer};
