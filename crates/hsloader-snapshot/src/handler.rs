//! Event protocol between a snapshot parser and its sink

use crate::record::{ChildObject, ObjectRecord, SnapshotHeader};

/// Verdict returned from every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseResult {
    Continue,
    /// Stop delivering events for the current file
    Abort,
}

/// Receiver of the push-style event stream a [`SnapshotParser`] produces.
///
/// Events for one file arrive in order: `on_start`, then per snapshot
/// `on_new_snapshot`, its `on_entry`/`on_child_entry` events and
/// `on_finish`. A parser stops calling into the handler after `Abort`.
///
/// [`SnapshotParser`]: crate::parser::SnapshotParser
pub trait SnapshotEventHandler {
    fn on_start(&mut self) -> ParseResult;

    /// `parent` is the enclosing archive path when the snapshot came from one.
    fn on_new_snapshot(&mut self, header: &SnapshotHeader, parent: Option<&str>) -> ParseResult;

    fn on_entry(&mut self, object: &ObjectRecord) -> ParseResult;

    fn on_child_entry(&mut self, parent_tag: u64, child: &ChildObject) -> ParseResult;

    fn on_finish(&mut self) -> ParseResult;
}
