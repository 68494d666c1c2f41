//! Main runner for resource log file-sets

use std::time::{Duration, Instant};

use hsloader_core::{BatchPublisher, ParseError, PipelineOptions, ProgressContext, is_shutdown_requested};

use crate::parser::LogSource;
use crate::transform::{LogStats, LogTransformer};

/// Log pass summary
#[derive(Debug)]
pub struct Summary {
    pub log_records: usize,
    pub diff_records: usize,
    pub stats: LogStats,
    pub elapsed: Duration,
}

/// Parse the whole file-set, then publish both record sequences.
///
/// A parse failure means nothing was published.
pub fn run(
    source: &mut dyn LogSource,
    publisher: &BatchPublisher,
    options: PipelineOptions,
    progress: &ProgressContext,
) -> Result<Summary, ParseError> {
    let start = Instant::now();

    log::info!("Parsing...");
    source.run()?;
    let logs = source.log_entries();
    let diffs = source.diff_entries();
    log::info!(
        "Parsed {} log and {} diff records",
        hsloader_core::fmt_num(logs.len()),
        hsloader_core::fmt_num(diffs.len())
    );

    let stats = if is_shutdown_requested() {
        log::warn!("Shutdown requested, nothing published");
        LogStats::default()
    } else {
        let pb = progress.file_line("resource log");
        let mut transformer = LogTransformer::new(publisher, options);
        transformer.set_progress(pb.clone());
        let stats = transformer.transform(logs, diffs);
        pb.finish_and_clear();
        stats
    };
    log::info!("Done.");

    let summary = Summary {
        log_records: logs.len(),
        diff_records: diffs.len(),
        stats,
        elapsed: start.elapsed(),
    };
    log::info!(
        "Documents: {} log, {} diff ({} skipped)",
        summary.stats.log_documents,
        summary.stats.diff_documents,
        summary.stats.skipped
    );
    log::info!(
        "Tags: {} archive points, {} reboot suspects",
        summary.stats.archive_points,
        summary.stats.reboot_points
    );
    log::info!("Time: {:.1}s", summary.elapsed.as_secs_f64());
    Ok(summary)
}
