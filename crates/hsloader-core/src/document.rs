//! Indexable documents and their monthly partition keys

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{Map, Value};

/// Record family a document was derived from; fixes the partition prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    ResourceLog,
    ResourceDiff,
    SnapshotSummary,
    SnapshotObjects,
    SnapshotRefs,
}

impl DocumentKind {
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::ResourceLog => "resource-log",
            Self::ResourceDiff => "resource-diff",
            Self::SnapshotSummary => "snapshot-summary",
            Self::SnapshotObjects => "snapshot-objects",
            Self::SnapshotRefs => "snapshot-refs",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// `YYYYMM` of a zone-less local timestamp.
pub fn partition_suffix(local: &NaiveDateTime) -> String {
    local.format("%Y%m").to_string()
}

/// `<type-prefix>-<YYYYMM>`
pub fn partition_key(kind: DocumentKind, local: &NaiveDateTime) -> String {
    format!("{}-{}", kind.prefix(), partition_suffix(local))
}

/// Annotation attached to resource documents by timestamp correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Archive,
    Reboot,
}

/// Record fields plus `@timestamp` and the optional correlation fields.
///
/// The record's own timestamp field must be `#[serde(skip_serializing)]`;
/// it is rendered as `@timestamp` instead.
#[derive(Debug, Serialize)]
pub struct DocumentBody<'a, T> {
    #[serde(rename = "@timestamp")]
    pub timestamp: &'a str,
    #[serde(flatten)]
    pub record: &'a T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tag: Vec<Tag>,
    #[serde(rename = "archivePath", skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<&'a str>,
}

impl<'a, T> DocumentBody<'a, T> {
    /// Untagged body
    pub fn new(timestamp: &'a str, record: &'a T) -> Self {
        Self {
            timestamp,
            record,
            tag: Vec::new(),
            archive_path: None,
        }
    }
}

/// Immutable (partition key, body) pair ready for bulk submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    partition_key: String,
    body: Map<String, Value>,
}

impl Document {
    /// Serialize `body` (must serialize to a JSON object) under `partition_key`.
    pub fn new(partition_key: String, body: &impl Serialize) -> Result<Self, serde_json::Error> {
        match serde_json::to_value(body)? {
            Value::Object(body) => Ok(Self {
                partition_key,
                body,
            }),
            other => Err(serde::ser::Error::custom(format!(
                "document body must be an object, got {other}"
            ))),
        }
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Shorthand for `body().get(name)`
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }
}
