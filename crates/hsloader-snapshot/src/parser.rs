//! Snapshot file parsers feeding a [`SnapshotEventHandler`]

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use hsloader_core::ParseError;
use serde::Deserialize;

use crate::handler::{ParseResult, SnapshotEventHandler};
use crate::record::{ChildObject, ObjectRecord, SnapshotHeader};

/// Decoder for one snapshot input format.
pub trait SnapshotParser {
    /// Push every event of `path` into `handler`, starting with `on_start`.
    ///
    /// Stops early, without error, when the handler returns `Abort`.
    fn parse(&mut self, path: &Path, handler: &mut dyn SnapshotEventHandler)
        -> Result<(), ParseError>;
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum DumpLine {
    Header {
        #[serde(flatten)]
        header: SnapshotHeader,
        #[serde(default)]
        parent: Option<String>,
    },
    Object(ObjectRecord),
    Child {
        #[serde(rename = "parentTag")]
        parent_tag: u64,
        #[serde(flatten)]
        child: ChildObject,
    },
    Finish,
}

/// Parser for JSON-lines snapshot dumps.
///
/// One record per line, discriminated by `"type"`:
///
/// ```text
/// {"type":"header","timestamp":"2016-01-10T12:00:00","numClassEntries":2,...}
/// {"type":"object","classTag":1,"className":"java.lang.String",...}
/// {"type":"child","parentTag":1,"classTag":2,"instanceCount":3,"totalSizeBytes":48}
/// {"type":"finish"}
/// ```
///
/// A trailing snapshot without `finish` is closed at end of file.
#[derive(Debug, Default)]
pub struct JsonDumpParser;

impl JsonDumpParser {
    pub fn new() -> Self {
        Self
    }
}

impl SnapshotParser for JsonDumpParser {
    fn parse(
        &mut self,
        path: &Path,
        handler: &mut dyn SnapshotEventHandler,
    ) -> Result<(), ParseError> {
        let reader = BufReader::new(File::open(path)?);
        if handler.on_start() == ParseResult::Abort {
            return Ok(());
        }

        let mut open = false;
        for (idx, line) in reader.lines().enumerate() {
            let event = match decode_line(line, idx + 1) {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(e) => {
                    // Release what the open snapshot already buffered
                    if open {
                        handler.on_finish();
                    }
                    return Err(e);
                }
            };

            let verdict = match &event {
                DumpLine::Header { header, parent } => {
                    open = true;
                    handler.on_new_snapshot(header, parent.as_deref())
                }
                DumpLine::Object(object) => handler.on_entry(object),
                DumpLine::Child { parent_tag, child } => handler.on_child_entry(*parent_tag, child),
                DumpLine::Finish => {
                    open = false;
                    handler.on_finish()
                }
            };
            if verdict == ParseResult::Abort {
                log::debug!("{}: handler aborted at line {}", path.display(), idx + 1);
                return Ok(());
            }
        }

        if open {
            handler.on_finish();
        }
        Ok(())
    }
}

/// `None` for blank lines.
fn decode_line(line: std::io::Result<String>, number: usize) -> Result<Option<DumpLine>, ParseError> {
    let line = line?;
    if line.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&line)
        .map(Some)
        .map_err(|e| ParseError::Format {
            line: number,
            message: e.to_string(),
        })
}
