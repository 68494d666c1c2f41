//! Log and diff records → tagged resource documents

use hsloader_core::{
    BatchPublisher, Document, DocumentBody, DocumentKind, PipelineOptions, Tag, TimestampIndex,
    Timestamped, TransformError, fmt_num, log_error, partition_key,
};
use hsloader_core::progress::UPDATE_INTERVAL;
use indicatif::ProgressBar;
use serde::Serialize;

use crate::record::{DiffRecord, LogRecord};

/// Counters for one log pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogStats {
    pub log_documents: usize,
    pub diff_documents: usize,
    pub archive_points: usize,
    pub reboot_points: usize,
    /// Records whose document could not be serialized
    pub skipped: usize,
    /// The publisher refused further documents
    pub aborted: bool,
}

impl LogStats {
    pub fn documents(&self) -> usize {
        self.log_documents + self.diff_documents
    }
}

/// Correlation indices for one file-set.
///
/// Archive points come from log samples carrying an archive path; reboot
/// suspects from deltas that went negative. Both are applied to log and diff
/// documents alike.
pub struct Correlation {
    archives: TimestampIndex<String>,
    reboots: TimestampIndex,
}

impl Correlation {
    pub fn build(logs: &[LogRecord], diffs: &[DiffRecord]) -> Self {
        Self {
            archives: TimestampIndex::build(
                logs,
                |r: &LogRecord| r.archive_path.is_some(),
                |r: &LogRecord| r.archive_path.clone().unwrap_or_default(),
            ),
            reboots: TimestampIndex::marks(diffs, |r: &DiffRecord| r.has_negative_delta),
        }
    }

    pub fn archive_points(&self) -> usize {
        self.archives.len()
    }

    pub fn reboot_points(&self) -> usize {
        self.reboots.len()
    }

    /// Tag `body` by its record's timestamp.
    fn apply<'a, T: Timestamped>(&'a self, body: &mut DocumentBody<'a, T>) {
        let ts = body.record.timestamp();
        if let Some(path) = self.archives.get(ts) {
            body.tag.push(Tag::Archive);
            body.archive_path = Some(path.as_str());
        }
        if self.reboots.contains(ts) {
            body.tag.push(Tag::Reboot);
        }
    }
}

/// Single pass over a parsed file-set: build both indices, then emit every
/// log document followed by every diff document.
pub struct LogTransformer<'p> {
    publisher: &'p BatchPublisher,
    options: PipelineOptions,
    progress: ProgressBar,
}

impl<'p> LogTransformer<'p> {
    pub fn new(publisher: &'p BatchPublisher, options: PipelineOptions) -> Self {
        Self {
            publisher,
            options,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report submitted documents on `pb`.
    pub fn set_progress(&mut self, pb: ProgressBar) {
        self.progress = pb;
    }

    /// Serialization failures skip the record; a publisher refusal stops the
    /// pass and sets `aborted`.
    pub fn transform(&mut self, logs: &[LogRecord], diffs: &[DiffRecord]) -> LogStats {
        let correlation = Correlation::build(logs, diffs);
        let mut stats = LogStats {
            archive_points: correlation.archive_points(),
            reboot_points: correlation.reboot_points(),
            ..Default::default()
        };
        log::debug!(
            "{} archive points, {} reboot suspects",
            stats.archive_points,
            stats.reboot_points
        );

        log::info!("Putting log data...");
        if self.emit(DocumentKind::ResourceLog, logs, &correlation, &mut stats) {
            log::info!("Putting diff data...");
            self.emit(DocumentKind::ResourceDiff, diffs, &correlation, &mut stats);
        }
        stats
    }

    /// Returns false once the publisher refused a document.
    fn emit<T: Timestamped + Serialize>(
        &self,
        kind: DocumentKind,
        records: &[T],
        correlation: &Correlation,
        stats: &mut LogStats,
    ) -> bool {
        for record in records {
            match self.put(kind, record, correlation) {
                Ok(()) => {
                    match kind {
                        DocumentKind::ResourceDiff => stats.diff_documents += 1,
                        _ => stats.log_documents += 1,
                    }
                    let documents = stats.documents();
                    if documents % UPDATE_INTERVAL == 0 {
                        self.progress
                            .set_message(format!("{} documents", fmt_num(documents)));
                    }
                }
                Err(e @ TransformError::Publish(_)) => {
                    log_error(kind.prefix(), &e, self.options.debug);
                    stats.aborted = true;
                    return false;
                }
                Err(e) => {
                    log_error(kind.prefix(), &e, self.options.debug);
                    stats.skipped += 1;
                }
            }
        }
        true
    }

    fn put<T: Timestamped + Serialize>(
        &self,
        kind: DocumentKind,
        record: &T,
        correlation: &Correlation,
    ) -> Result<(), TransformError> {
        let local = record.timestamp();
        let timestamp = self.options.zone.timestamp(local);
        let mut body = DocumentBody::new(&timestamp, record);
        correlation.apply(&mut body);
        let doc = Document::new(partition_key(kind, local), &body)?;
        self.publisher.submit(doc)?;
        Ok(())
    }
}
