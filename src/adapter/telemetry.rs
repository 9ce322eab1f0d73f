//! In-memory telemetry sink.
//!
//! Keeps bounded rings of diagnostic events and error records for later
//! inspection. Latency samples are aggregated by the latency registry and
//! only logged here.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::trace;

use crate::error::Result;
use crate::port::{DiagnosticEvent, ErrorRecord, TelemetrySink};

/// Default number of events and records retained.
pub const DEFAULT_CAPACITY: usize = 200;

pub struct DiagnosticLog {
    capacity: usize,
    events: RwLock<VecDeque<DiagnosticEvent>>,
    errors: RwLock<VecDeque<ErrorRecord>>,
}

impl DiagnosticLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: RwLock::new(VecDeque::new()),
            errors: RwLock::new(VecDeque::new()),
        }
    }

    /// Events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.read().iter().cloned().collect()
    }

    /// Error records, oldest first.
    #[must_use]
    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.errors.read().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.events.write().clear();
        self.errors.write().clear();
    }
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn push_bounded<T>(ring: &mut VecDeque<T>, item: T, capacity: usize) {
    ring.push_back(item);
    while ring.len() > capacity {
        ring.pop_front();
    }
}

impl TelemetrySink for DiagnosticLog {
    fn record_latency(&self, endpoint: &str, duration: Duration, success: bool) -> Result<()> {
        trace!(endpoint, duration_ms = duration.as_millis() as u64, success, "Latency sample");
        Ok(())
    }

    fn log_event(&self, event: DiagnosticEvent) -> Result<()> {
        push_bounded(&mut self.events.write(), event, self.capacity);
        Ok(())
    }

    fn record_error(&self, record: ErrorRecord) -> Result<()> {
        push_bounded(&mut self.errors.write(), record, self.capacity);
        Ok(())
    }
}
