//! Progress telemetry and the forensic result record handed off from the
//! orchestrator to the certificate builder. Grounded on the teacher's
//! `core::types::WipeProgress`, trimmed to the fields this pipeline actually
//! produces.

use serde::{Deserialize, Serialize};

/// `(percent, message)` posted on the orchestrator's progress channel.
/// Never blocks the worker thread; the UI holds the receiver.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub percent: u8,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(percent: u8, message: impl Into<String>) -> Self {
        Self { percent, message: message.into() }
    }
}

/// The forensic record of a completed wipe, consumed by the certificate
/// builder. Unix timestamps match the reference implementation's
/// `time.time()`-based `start_time`/`end_time` fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WipeResult {
    pub device_id: String,
    pub model: String,
    pub serial_number: String,
    pub size_bytes: u64,
    pub operator: String,

    pub method: String,
    pub passes: u32,
    pub nist_standard: String,

    pub pre_hash_sha256: String,
    pub post_hash_sha256: String,
    pub start_time_unix: u64,
    pub end_time_unix: u64,
    pub status: String,
}
