//! Telemetry sink port.
//!
//! Receives latency samples, warning-level events and error records.
//! Every method is best-effort: callers log and drop sink errors, they never
//! let them replace the primary result.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::resilience::FailureKind;

/// Severity of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warning,
    Error,
}

/// A diagnostic event, e.g. a high-latency warning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticEvent {
    pub level: EventLevel,
    pub message: String,
    pub endpoint: Option<String>,
    pub duration_ms: Option<u64>,
    pub at: DateTime<Utc>,
}

/// A terminal failure kept for later inspection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub endpoint: String,
    pub kind: FailureKind,
    /// User-presentable message.
    pub message: String,
    /// Raw error text.
    pub raw: String,
    pub at: DateTime<Utc>,
}

pub trait TelemetrySink: Send + Sync {
    fn record_latency(&self, endpoint: &str, duration: Duration, success: bool) -> Result<()>;

    fn log_event(&self, event: DiagnosticEvent) -> Result<()>;

    fn record_error(&self, record: ErrorRecord) -> Result<()>;
}
