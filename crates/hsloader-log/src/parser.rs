//! Resource log sources

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use hsloader_core::ParseError;
use serde::Deserialize;

use crate::record::{DiffRecord, LogRecord};

/// Pull-style log parser: `run()` reads the whole file-set, then both
/// sequences are available.
pub trait LogSource {
    fn run(&mut self) -> Result<(), ParseError>;

    fn log_entries(&self) -> &[LogRecord];

    fn diff_entries(&self) -> &[DiffRecord];
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum DumpLine {
    Log(LogRecord),
    Diff(DiffRecord),
}

/// JSON-lines dump of log samples and deltas.
///
/// ```text
/// {"type":"log","timestamp":"2016-01-10T12:00:00","cause":"INTERVAL","javaVirtualSize":1,...}
/// {"type":"diff","timestamp":"2016-01-10T12:00:10","javaUserTime":0.5,...}
/// ```
///
/// Files are read in the given order; records keep file order.
#[derive(Debug, Default)]
pub struct JsonDumpSource {
    files: Vec<PathBuf>,
    logs: Vec<LogRecord>,
    diffs: Vec<DiffRecord>,
}

impl JsonDumpSource {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            ..Default::default()
        }
    }

    fn read_file(&mut self, path: &PathBuf) -> Result<(), ParseError> {
        let reader = BufReader::new(File::open(path)?);
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(DumpLine::Log(record)) => self.logs.push(record),
                Ok(DumpLine::Diff(record)) => self.diffs.push(record),
                Err(e) => {
                    return Err(ParseError::Format {
                        line: idx + 1,
                        message: format!("{}: {e}", path.display()),
                    });
                }
            }
        }
        Ok(())
    }
}

impl LogSource for JsonDumpSource {
    fn run(&mut self) -> Result<(), ParseError> {
        self.logs.clear();
        self.diffs.clear();
        let files = std::mem::take(&mut self.files);
        let result = files.iter().try_for_each(|path| self.read_file(path));
        self.files = files;
        result
    }

    fn log_entries(&self) -> &[LogRecord] {
        &self.logs
    }

    fn diff_entries(&self) -> &[DiffRecord] {
        &self.diffs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LOG: &str = r#"{"type":"log","timestamp":"2016-01-10T12:00:00","cause":"INTERVAL","javaVirtualSize":4096,"javaResidentSize":2048,"liveThreads":20}"#;
    const ARCHIVED: &str = r#"{"type":"log","timestamp":"2016-01-10T12:00:10","cause":"SIGNAL","javaVirtualSize":4096,"javaResidentSize":2048,"liveThreads":21,"archivePath":"/tmp/heapstats_archive.zip"}"#;
    const DIFF: &str = r#"{"type":"diff","timestamp":"2016-01-10T12:00:10","javaUserTime":0.5,"javaSysTime":0.1,"cpuUser":10.0,"cpuNice":0.0,"cpuSys":2.0,"cpuIdle":87.0,"cpuIOWait":1.0,"cpuIRQ":0.0,"cpuSoftIRQ":0.0,"cpuSteal":0.0,"cpuGuest":0.0,"jvmSyncParkTime":0.0,"jvmSafepointTime":1.5,"jvmSafepointCount":3,"hasNegativeDelta":true}"#;

    fn dump(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[test]
    fn splits_logs_and_diffs() {
        let file = dump(&[LOG, "", DIFF, ARCHIVED]);
        let mut source = JsonDumpSource::new(vec![file.path().to_path_buf()]);
        source.run().unwrap();

        assert_eq!(source.log_entries().len(), 2);
        assert_eq!(source.diff_entries().len(), 1);
        assert_eq!(source.log_entries()[0].archive_path, None);
        assert_eq!(
            source.log_entries()[1].archive_path.as_deref(),
            Some("/tmp/heapstats_archive.zip")
        );
        let diff = &source.diff_entries()[0];
        assert!(diff.has_negative_delta);
        assert_eq!(diff.cpu_io_wait, 1.0);
        assert_eq!(diff.jvm_safepoint_count, 3);
    }

    #[test]
    fn files_read_in_order() {
        let first = dump(&[LOG]);
        let second = dump(&[ARCHIVED]);
        let mut source = JsonDumpSource::new(vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);
        source.run().unwrap();
        let threads: Vec<u32> = source.log_entries().iter().map(|r| r.live_threads).collect();
        assert_eq!(threads, [20, 21]);
    }

    #[test]
    fn rerun_does_not_duplicate() {
        let file = dump(&[LOG, DIFF]);
        let mut source = JsonDumpSource::new(vec![file.path().to_path_buf()]);
        source.run().unwrap();
        source.run().unwrap();
        assert_eq!(source.log_entries().len(), 1);
        assert_eq!(source.diff_entries().len(), 1);
    }

    #[test]
    fn unknown_type_is_format_error() {
        let file = dump(&[LOG, r#"{"type":"gc"}"#]);
        let mut source = JsonDumpSource::new(vec![file.path().to_path_buf()]);
        let err = source.run().unwrap_err();
        assert!(matches!(err, ParseError::Format { line: 2, .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let mut source = JsonDumpSource::new(vec![PathBuf::from("/nonexistent/heapstats.jsonl")]);
        assert!(matches!(source.run(), Err(ParseError::Io(_))));
    }
}
