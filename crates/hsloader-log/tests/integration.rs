//! Integration tests for hsloader-log
//!
//! Dump files on disk → JsonDumpSource → LogTransformer → BatchPublisher →
//! MemorySink.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use hsloader_core::{
    BatchPublisher, BulkSink, MemorySink, PipelineOptions, ProgressContext, PublishError,
    PublisherConfig, Zone,
};
use hsloader_log::{JsonDumpSource, run};
use serde_json::{Value, json};
use tempfile::TempDir;

fn log_line(ts: &str, archive: Option<&str>) -> Value {
    let mut line = json!({
        "type": "log",
        "timestamp": ts,
        "cause": "INTERVAL",
        "javaVirtualSize": 3_221_225_472u64,
        "javaResidentSize": 536_870_912u64,
        "liveThreads": 32
    });
    if let Some(path) = archive {
        line["archivePath"] = Value::from(path);
    }
    line
}

fn diff_line(ts: &str, negative: bool) -> Value {
    json!({
        "type": "diff",
        "timestamp": ts,
        "javaUserTime": 1.5,
        "javaSysTime": 0.5,
        "cpuUser": 12.0,
        "cpuNice": 0.0,
        "cpuSys": 3.0,
        "cpuIdle": 84.0,
        "cpuIOWait": 1.0,
        "cpuIRQ": 0.0,
        "cpuSoftIRQ": 0.0,
        "cpuSteal": 0.0,
        "cpuGuest": 0.0,
        "jvmSyncParkTime": 0.0,
        "jvmSafepointTime": 2.0,
        "jvmSafepointCount": 4,
        "hasNegativeDelta": negative
    })
}

fn write_dump(dir: &TempDir, name: &str, lines: &[Value]) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    path
}

fn options() -> PipelineOptions {
    PipelineOptions {
        zone: Zone::Named(chrono_tz::UTC),
        debug: false,
    }
}

fn publisher(sink: &Arc<MemorySink>, bulk_size: usize) -> BatchPublisher {
    BatchPublisher::new(
        Arc::clone(sink) as Arc<dyn BulkSink>,
        PublisherConfig {
            bulk_size,
            concurrency: 2,
        },
    )
}

fn doc_at<'a>(
    docs: &'a [hsloader_core::Document],
    prefix: &str,
    ts: &str,
) -> &'a hsloader_core::Document {
    docs.iter()
        .find(|d| d.partition_key().starts_with(prefix) && d.field("@timestamp") == Some(&Value::from(ts)))
        .unwrap()
}

#[test]
fn three_logs_three_diffs_in_pairs() {
    let dir = TempDir::new().unwrap();
    let file = write_dump(
        &dir,
        "heapstats_log.jsonl",
        &[
            log_line("2016-01-10T12:00:00", None),
            log_line("2016-01-10T12:00:10", None),
            diff_line("2016-01-10T12:00:10", false),
            log_line("2016-01-10T12:00:20", None),
            diff_line("2016-01-10T12:00:20", false),
            diff_line("2016-01-10T12:00:30", false),
        ],
    );

    let sink = Arc::new(MemorySink::new());
    let publisher = publisher(&sink, 2);
    let summary = run(
        &mut JsonDumpSource::new(vec![file]),
        &publisher,
        options(),
        &ProgressContext::hidden(),
    )
    .unwrap();
    let result = publisher.close().unwrap();

    assert_eq!(summary.log_records, 3);
    assert_eq!(summary.diff_records, 3);
    assert_eq!(summary.stats.documents(), 6);
    assert_eq!(sink.batch_sizes(), [2, 2, 2]);
    assert!(result.succeeded);
    assert_eq!(result.batches, 3);
    assert_eq!(result.status_line(), "Succeeded");
}

#[test]
fn archive_and_reboot_tagging() {
    let dir = TempDir::new().unwrap();
    let t1 = "2016-01-10T12:00:00";
    let t2 = "2016-01-10T12:00:10";
    let t3 = "2016-01-10T12:00:20";
    let file = write_dump(
        &dir,
        "heapstats_log.jsonl",
        &[
            log_line(t1, Some("/snap1")),
            log_line(t2, None),
            log_line(t3, None),
            diff_line(t2, true),
            diff_line(t3, false),
        ],
    );

    let sink = Arc::new(MemorySink::new());
    let publisher = publisher(&sink, 100);
    let summary = run(
        &mut JsonDumpSource::new(vec![file]),
        &publisher,
        options(),
        &ProgressContext::hidden(),
    )
    .unwrap();
    publisher.close().unwrap();

    assert_eq!(summary.stats.archive_points, 1);
    assert_eq!(summary.stats.reboot_points, 1);

    let docs = sink.documents();
    let archived = doc_at(&docs, "resource-log-201601", "2016-01-10T12:00:00Z");
    assert_eq!(archived.field("tag"), Some(&json!(["archive"])));
    assert_eq!(archived.field("archivePath"), Some(&Value::from("/snap1")));

    let reboot = doc_at(&docs, "resource-diff-201601", "2016-01-10T12:00:10Z");
    assert_eq!(reboot.field("tag"), Some(&json!(["reboot"])));
    assert_eq!(reboot.field("hasNegativeDelta"), Some(&Value::from(true)));

    // The log sample at the reboot instant is marked as well
    let log_t2 = doc_at(&docs, "resource-log-201601", "2016-01-10T12:00:10Z");
    assert_eq!(log_t2.field("tag"), Some(&json!(["reboot"])));

    let tagged = docs.iter().filter(|d| d.field("tag").is_some()).count();
    assert_eq!(tagged, 3);
    let with_path = docs.iter().filter(|d| d.field("archivePath").is_some()).count();
    assert_eq!(with_path, 1);
}

#[test]
fn file_set_spans_months() {
    let dir = TempDir::new().unwrap();
    let jan = write_dump(&dir, "jan.jsonl", &[log_line("2016-01-31T23:59:50", None)]);
    let feb = write_dump(
        &dir,
        "feb.jsonl",
        &[
            log_line("2016-02-01T00:00:00", None),
            diff_line("2016-02-01T00:00:00", false),
        ],
    );

    let sink = Arc::new(MemorySink::new());
    let publisher = publisher(&sink, 10);
    run(
        &mut JsonDumpSource::new(vec![jan, feb]),
        &publisher,
        options(),
        &ProgressContext::hidden(),
    )
    .unwrap();
    publisher.close().unwrap();

    let mut keys: Vec<String> = sink
        .documents()
        .iter()
        .map(|d| d.partition_key().to_string())
        .collect();
    keys.sort();
    assert_eq!(
        keys,
        [
            "resource-diff-201602",
            "resource-log-201601",
            "resource-log-201602"
        ]
    );
}

#[test]
fn parse_failure_publishes_nothing() {
    let dir = TempDir::new().unwrap();
    let good = write_dump(&dir, "good.jsonl", &[log_line("2016-01-10T12:00:00", None)]);
    let bad = dir.path().join("bad.jsonl");
    std::fs::write(&bad, "not json\n").unwrap();

    let sink = Arc::new(MemorySink::new());
    let publisher = publisher(&sink, 10);
    let result = run(
        &mut JsonDumpSource::new(vec![good, bad]),
        &publisher,
        options(),
        &ProgressContext::hidden(),
    );
    assert!(result.is_err());
    publisher.close().unwrap();
    assert!(sink.documents().is_empty());
}

#[test]
fn transport_failure_aborts_pass() {
    let dir = TempDir::new().unwrap();
    let lines: Vec<Value> = (0..6)
        .map(|i| log_line(&format!("2016-01-10T12:00:{:02}", i * 10), None))
        .collect();
    let file = write_dump(&dir, "log.jsonl", &lines);

    let sink = Arc::new(MemorySink::new().fail_transport(0, "read timed out"));
    let publisher = BatchPublisher::new(
        Arc::clone(&sink) as Arc<dyn BulkSink>,
        PublisherConfig {
            bulk_size: 1,
            concurrency: 1,
        },
    );
    let summary = run(
        &mut JsonDumpSource::new(vec![file]),
        &publisher,
        options(),
        &ProgressContext::hidden(),
    )
    .unwrap();

    assert!(summary.stats.aborted);
    assert!(summary.stats.log_documents < 6);
    let err = publisher.close().unwrap_err();
    assert!(matches!(err, PublishError::Transport(_)));
}
