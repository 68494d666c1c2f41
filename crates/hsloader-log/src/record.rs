//! Resource log samples and their per-interval deltas

use chrono::NaiveDateTime;
use hsloader_core::Timestamped;
use serde::{Deserialize, Serialize};

/// One sample line of the resource log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    #[serde(skip_serializing)]
    pub timestamp: NaiveDateTime,
    /// What triggered the sample (interval, signal, resource exhaustion, ...)
    pub cause: String,
    pub java_virtual_size: u64,
    pub java_resident_size: u64,
    pub live_threads: u32,
    /// Set when a troubleshooting archive was written at this sample
    #[serde(default, skip_serializing)]
    pub archive_path: Option<String>,
}

impl Timestamped for LogRecord {
    fn timestamp(&self) -> &NaiveDateTime {
        &self.timestamp
    }
}

/// Rates between two consecutive samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffRecord {
    #[serde(skip_serializing)]
    pub timestamp: NaiveDateTime,
    pub java_user_time: f64,
    pub java_sys_time: f64,
    pub cpu_user: f64,
    pub cpu_nice: f64,
    pub cpu_sys: f64,
    pub cpu_idle: f64,
    #[serde(rename = "cpuIOWait")]
    pub cpu_io_wait: f64,
    #[serde(rename = "cpuIRQ")]
    pub cpu_irq: f64,
    #[serde(rename = "cpuSoftIRQ")]
    pub cpu_soft_irq: f64,
    pub cpu_steal: f64,
    pub cpu_guest: f64,
    pub jvm_sync_park_time: f64,
    pub jvm_safepoint_time: f64,
    pub jvm_safepoint_count: i64,
    /// A rate went negative: a counter was reset between the two samples
    #[serde(default)]
    pub has_negative_delta: bool,
}

impl Timestamped for DiffRecord {
    fn timestamp(&self) -> &NaiveDateTime {
        &self.timestamp
    }
}
