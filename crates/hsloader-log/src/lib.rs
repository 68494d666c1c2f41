//! hsloader log - resource log samples and deltas to tagged resource
//! documents.
//!
//! A [`LogSource`] reads a whole file-set; [`LogTransformer`] correlates
//! archive points and reboot suspects by timestamp, then submits one document
//! per record.

pub mod parser;
pub mod record;
pub mod runner;
pub mod transform;

// Re-exports
pub use parser::{JsonDumpSource, LogSource};
pub use record::{DiffRecord, LogRecord};
pub use runner::{Summary, run};
pub use transform::{Correlation, LogStats, LogTransformer};
