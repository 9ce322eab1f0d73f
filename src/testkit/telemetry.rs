use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::port::{DiagnosticEvent, ErrorRecord, TelemetrySink};

/// A latency sample as handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencySample {
    pub endpoint: String,
    pub duration: Duration,
    pub success: bool,
}

/// Telemetry sink that keeps everything it receives.
///
/// After [`fail_all`](Self::fail_all) every method records nothing and
/// returns an error.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    latencies: Mutex<Vec<LatencySample>>,
    events: Mutex<Vec<DiagnosticEvent>>,
    errors: Mutex<Vec<ErrorRecord>>,
    failing: AtomicBool,
}

impl RecordingTelemetry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn latencies(&self) -> Vec<LatencySample> {
        self.latencies.lock().clone()
    }

    #[must_use]
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().clone()
    }

    #[must_use]
    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.errors.lock().clone()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Telemetry("sink unavailable".into()));
        }
        Ok(())
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn record_latency(&self, endpoint: &str, duration: Duration, success: bool) -> Result<()> {
        self.check()?;
        self.latencies.lock().push(LatencySample {
            endpoint: endpoint.to_string(),
            duration,
            success,
        });
        Ok(())
    }

    fn log_event(&self, event: DiagnosticEvent) -> Result<()> {
        self.check()?;
        self.events.lock().push(event);
        Ok(())
    }

    fn record_error(&self, record: ErrorRecord) -> Result<()> {
        self.check()?;
        self.errors.lock().push(record);
        Ok(())
    }
}
