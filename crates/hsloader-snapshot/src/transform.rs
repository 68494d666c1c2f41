//! Snapshot events → summary, object and reference documents

use hsloader_core::{
    BatchPublisher, Document, DocumentBody, DocumentKind, PipelineOptions, TransformError,
    log_error, partition_key,
};
use hsloader_core::progress::UPDATE_INTERVAL;
use indicatif::ProgressBar;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::handler::{ParseResult, SnapshotEventHandler};
use crate::record::{ChildObject, ChildRecord, ObjectRecord, SnapshotHeader};

/// Counters for one or more files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotStats {
    pub snapshots: usize,
    pub objects: usize,
    pub references: usize,
}

impl SnapshotStats {
    pub fn documents(&self) -> usize {
        self.snapshots + self.objects + self.references
    }
}

/// State of the snapshot currently being parsed.
struct Scope {
    timestamp: String,
    objects_key: String,
    refs_key: String,
    class_names: FxHashMap<u64, String>,
    children: Vec<ChildRecord>,
}

enum State {
    Idle,
    InSnapshot(Scope),
    /// A document could not be built; ignore the rest of this file
    Aborted,
}

/// Reference document body; unresolved class names are omitted.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolvedChild<'a> {
    parent_class_tag: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_name: Option<&'a str>,
    child_class_tag: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    child_name: Option<&'a str>,
    instance_count: u64,
    total_size_bytes: u64,
}

/// Handler turning the snapshot event stream into documents.
///
/// Object documents are submitted as they arrive. Child entries are held
/// until `on_finish` because resolving both class names needs every object
/// entry of the snapshot.
pub struct SnapshotTransformer<'p> {
    publisher: &'p BatchPublisher,
    options: PipelineOptions,
    state: State,
    stats: SnapshotStats,
    progress: ProgressBar,
}

impl<'p> SnapshotTransformer<'p> {
    pub fn new(publisher: &'p BatchPublisher, options: PipelineOptions) -> Self {
        Self {
            publisher,
            options,
            state: State::Idle,
            stats: SnapshotStats::default(),
            progress: ProgressBar::hidden(),
        }
    }

    /// Report submitted documents on `pb`.
    pub fn set_progress(&mut self, pb: ProgressBar) {
        self.progress = pb;
    }

    pub fn stats(&self) -> SnapshotStats {
        self.stats
    }

    /// True when the last file was abandoned after a transformation error.
    pub fn is_aborted(&self) -> bool {
        matches!(self.state, State::Aborted)
    }

    fn put_summary(&mut self, header: &SnapshotHeader) -> Result<(), TransformError> {
        let timestamp = self.options.zone.timestamp(&header.timestamp);
        let doc = Document::new(
            partition_key(DocumentKind::SnapshotSummary, &header.timestamp),
            &DocumentBody::new(&timestamp, header),
        )?;
        self.publisher.submit(doc)?;
        self.stats.snapshots += 1;

        self.state = State::InSnapshot(Scope {
            timestamp,
            objects_key: partition_key(DocumentKind::SnapshotObjects, &header.timestamp),
            refs_key: partition_key(DocumentKind::SnapshotRefs, &header.timestamp),
            class_names: FxHashMap::default(),
            children: Vec::new(),
        });
        Ok(())
    }

    fn put_object(&mut self, object: &ObjectRecord) -> Result<(), TransformError> {
        let State::InSnapshot(scope) = &mut self.state else {
            return Err(TransformError::NoActiveSnapshot);
        };
        scope
            .class_names
            .insert(object.class_tag, object.class_name.clone());
        let doc = Document::new(
            scope.objects_key.clone(),
            &DocumentBody::new(&scope.timestamp, object),
        )?;
        self.publisher.submit(doc)?;
        self.stats.objects += 1;
        self.tick();
        Ok(())
    }

    fn push_child(&mut self, parent_tag: u64, child: &ChildObject) -> Result<(), TransformError> {
        let State::InSnapshot(scope) = &mut self.state else {
            return Err(TransformError::NoActiveSnapshot);
        };
        scope.children.push(ChildRecord::new(parent_tag, child));
        Ok(())
    }

    fn put_children(&mut self, scope: Scope) -> Result<(), TransformError> {
        for child in &scope.children {
            let resolved = ResolvedChild {
                parent_class_tag: child.parent_class_tag,
                parent_name: scope
                    .class_names
                    .get(&child.parent_class_tag)
                    .map(String::as_str),
                child_class_tag: child.child_class_tag,
                child_name: scope
                    .class_names
                    .get(&child.child_class_tag)
                    .map(String::as_str),
                instance_count: child.instance_count,
                total_size_bytes: child.total_size_bytes,
            };
            let doc = Document::new(
                scope.refs_key.clone(),
                &DocumentBody::new(&scope.timestamp, &resolved),
            )?;
            self.publisher.submit(doc)?;
            self.stats.references += 1;
            self.tick();
        }
        Ok(())
    }

    fn tick(&self) {
        let documents = self.stats.documents();
        if documents % UPDATE_INTERVAL == 0 {
            self.progress
                .set_message(format!("{} documents", hsloader_core::fmt_num(documents)));
        }
    }

    fn settle(&mut self, result: Result<(), TransformError>) -> ParseResult {
        match result {
            Ok(()) => ParseResult::Continue,
            Err(e) => {
                log_error("snapshot", &e, self.options.debug);
                self.state = State::Aborted;
                ParseResult::Abort
            }
        }
    }
}

impl SnapshotEventHandler for SnapshotTransformer<'_> {
    fn on_start(&mut self) -> ParseResult {
        // Each file starts clean, including after an aborted one
        if let State::InSnapshot(scope) = std::mem::replace(&mut self.state, State::Idle) {
            if !scope.children.is_empty() {
                log::warn!(
                    "previous file ended inside a snapshot; dropping {} references",
                    scope.children.len()
                );
            }
        }
        ParseResult::Continue
    }

    fn on_new_snapshot(&mut self, header: &SnapshotHeader, parent: Option<&str>) -> ParseResult {
        if matches!(self.state, State::Aborted) {
            return ParseResult::Abort;
        }
        log::info!("Parse snapshot at {}", header.timestamp);
        if let Some(parent) = parent {
            log::debug!("snapshot from {parent}");
        }
        if let State::InSnapshot(scope) = &self.state {
            if !scope.children.is_empty() {
                log::warn!(
                    "snapshot ended without finish event; dropping {} references",
                    scope.children.len()
                );
            }
        }
        let result = self.put_summary(header);
        self.settle(result)
    }

    fn on_entry(&mut self, object: &ObjectRecord) -> ParseResult {
        if matches!(self.state, State::Aborted) {
            return ParseResult::Abort;
        }
        let result = self.put_object(object);
        self.settle(result)
    }

    fn on_child_entry(&mut self, parent_tag: u64, child: &ChildObject) -> ParseResult {
        if matches!(self.state, State::Aborted) {
            return ParseResult::Abort;
        }
        let result = self.push_child(parent_tag, child);
        self.settle(result)
    }

    fn on_finish(&mut self) -> ParseResult {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::InSnapshot(scope) => {
                let result = self.put_children(scope);
                self.settle(result)
            }
            State::Idle => ParseResult::Continue,
            State::Aborted => {
                self.state = State::Aborted;
                ParseResult::Abort
            }
        }
    }
}
