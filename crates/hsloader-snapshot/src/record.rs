//! Snapshot records delivered by the parser

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One heap snapshot capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotHeader {
    /// Local capture time; rendered as `@timestamp`
    #[serde(skip_serializing)]
    pub timestamp: NaiveDateTime,
    pub num_class_entries: u64,
    pub num_instances: u64,
    pub cause: String,
    pub gc_cause: String,
    pub full_gc_count: u64,
    pub young_gc_count: u64,
    pub gc_time_ms: u64,
    pub new_heap_bytes: u64,
    pub old_heap_bytes: u64,
    pub total_capacity_bytes: u64,
    pub metaspace_used_bytes: u64,
    pub metaspace_capacity_bytes: u64,
    pub safepoint_time_ms: u64,
}

/// Per-class statistics; `class_tag` is unique within one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRecord {
    pub class_tag: u64,
    pub class_name: String,
    pub class_loader_name: String,
    pub class_loader_tag: u64,
    pub instance_count: u64,
    pub total_size_bytes: u64,
}

/// Referenced class as reported under its parent object entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildObject {
    pub class_tag: u64,
    pub instance_count: u64,
    pub total_size_bytes: u64,
}

/// Reference-graph edge between two classes of one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRecord {
    pub parent_class_tag: u64,
    pub child_class_tag: u64,
    pub instance_count: u64,
    pub total_size_bytes: u64,
}

impl ChildRecord {
    pub fn new(parent_class_tag: u64, child: &ChildObject) -> Self {
        Self {
            parent_class_tag,
            child_class_tag: child.class_tag,
            instance_count: child.instance_count,
            total_size_bytes: child.total_size_bytes,
        }
    }
}
