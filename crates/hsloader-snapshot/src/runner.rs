//! Main runner for snapshot files

use std::path::PathBuf;
use std::time::{Duration, Instant};

use hsloader_core::{BatchPublisher, PipelineOptions, ProgressContext, is_shutdown_requested, log_error};

use crate::parser::SnapshotParser;
use crate::transform::{SnapshotStats, SnapshotTransformer};

/// Snapshot pass summary
#[derive(Debug)]
pub struct Summary {
    pub total_files: usize,
    pub completed_files: usize,
    /// Files the parser could not read
    pub failed_files: usize,
    /// Files abandoned after a transformation error
    pub aborted_files: usize,
    pub stats: SnapshotStats,
    pub elapsed: Duration,
}

/// Feed every file through `parser` into one transformer, in order.
///
/// Parser failures are logged and counted; the next file still runs. Stops
/// before the next file on shutdown or once the publisher has hit a fatal
/// transport failure.
pub fn run(
    parser: &mut dyn SnapshotParser,
    files: &[PathBuf],
    publisher: &BatchPublisher,
    options: PipelineOptions,
    progress: &ProgressContext,
) -> Summary {
    let start = Instant::now();
    let mut transformer = SnapshotTransformer::new(publisher, options);
    let mut completed = 0;
    let mut failed = 0;
    let mut aborted = 0;

    for path in files {
        if is_shutdown_requested() {
            log::warn!("Shutdown requested, skipping remaining files");
            break;
        }
        if publisher.is_aborted() {
            log::warn!("Bulk transport failed, skipping remaining files");
            break;
        }

        let name = path.display().to_string();
        let pb = progress.file_line(&name);
        transformer.set_progress(pb.clone());
        let before = transformer.stats().documents();

        match parser.parse(path, &mut transformer) {
            Ok(()) if transformer.is_aborted() => {
                aborted += 1;
                log::warn!("{name}: aborted");
            }
            Ok(()) => {
                completed += 1;
                log::debug!(
                    "{name}: {} documents",
                    transformer.stats().documents() - before
                );
            }
            Err(e) => {
                failed += 1;
                log_error(&name, &e, options.debug);
            }
        }
        pb.finish_and_clear();
    }

    let summary = Summary {
        total_files: files.len(),
        completed_files: completed,
        failed_files: failed,
        aborted_files: aborted,
        stats: transformer.stats(),
        elapsed: start.elapsed(),
    };

    log::info!(
        "Files: {}/{} completed ({} failed, {} aborted)",
        summary.completed_files,
        summary.total_files,
        summary.failed_files,
        summary.aborted_files
    );
    log::info!(
        "Snapshots: {}, objects: {}, references: {}",
        summary.stats.snapshots,
        hsloader_core::fmt_num(summary.stats.objects),
        hsloader_core::fmt_num(summary.stats.references)
    );
    log::info!("Time: {:.1}s", summary.elapsed.as_secs_f64());
    summary
}
