//! Resilient call wrapper.
//!
//! [`ResilientClient::call`] wraps any remote call returning
//! [`RemoteResult`] with, in order:
//!
//! 1. an offline short-circuit (no attempt, no breaker penalty),
//! 2. the per-endpoint circuit breaker gate,
//! 3. a timeout race per attempt, sized by [`OperationClass`],
//! 4. bounded retry over retryable (network) failures only,
//! 5. breaker/connectivity/latency bookkeeping and one user notification
//!    per terminal failure.
//!
//! Telemetry and notification side effects are best-effort and never replace
//! the primary result.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use crate::error::RemoteError;
use crate::port::{
    Clock, DiagnosticEvent, ErrorRecord, EventLevel, Notification, Notifier, NullNotifier,
    RemoteResult, SystemClock, TelemetrySink,
};

use super::breaker::{Admission, CircuitBreakerRegistry};
use super::classify::{
    is_retryable, user_message, CONNECTION_LOST_MESSAGE, OFFLINE_MESSAGE, RECONNECTING_MESSAGE,
};
use super::connectivity::Connectivity;
use super::latency::LatencyRegistry;
use super::retry::{retry, Retried, RetryFailure, RetryPolicy};

/// Shown for timeouts instead of the raw timeout text.
pub const TIMEOUT_MESSAGE: &str = "The server took too long to respond. Please try again.";

/// Kind of remote operation. Selects the timeout budget and the latency
/// warning threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationClass {
    /// List and get calls.
    Read,
    /// Create, update and delete calls. Multi-step writes are slower.
    Write,
    /// Long-running exports.
    Report,
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Report => write!(f, "report"),
        }
    }
}

/// One duration per operation class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassDurations {
    pub read: Duration,
    pub write: Duration,
    pub report: Duration,
}

impl ClassDurations {
    #[must_use]
    pub fn for_class(&self, class: OperationClass) -> Duration {
        match class {
            OperationClass::Read => self.read,
            OperationClass::Write => self.write,
            OperationClass::Report => self.report,
        }
    }
}

/// Tunables for [`ResilientClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSettings {
    pub retry: RetryPolicy,
    /// Per-attempt timeout budget.
    pub timeouts: ClassDurations,
    /// Calls slower than this emit a high-latency warning.
    pub latency_warnings: ClassDurations,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            timeouts: ClassDurations {
                read: Duration::from_millis(10_000),
                write: Duration::from_millis(12_000),
                report: Duration::from_millis(20_000),
            },
            latency_warnings: ClassDurations {
                read: Duration::from_millis(3_000),
                write: Duration::from_millis(5_000),
                report: Duration::from_millis(10_000),
            },
        }
    }
}

/// Why a wrapped call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Known offline; nothing was attempted.
    Offline,
    /// Rejected by the circuit breaker; nothing was attempted.
    CircuitOpen,
    /// An attempt exceeded its budget. Never retried.
    Timeout,
    /// Transport failure that survived every retry.
    Network,
    /// The backend answered with a terminal error (validation, auth, conflict).
    Rejected,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offline => write!(f, "offline"),
            Self::CircuitOpen => write!(f, "circuit_open"),
            Self::Timeout => write!(f, "timeout"),
            Self::Network => write!(f, "network"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Terminal failure of a wrapped call.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct CallFailure {
    pub kind: FailureKind,
    /// User-presentable message.
    pub message: String,
    /// Raw error text.
    pub error: String,
    /// Retries performed before giving up.
    pub retries: u32,
    /// Remaining wait for circuit rejects.
    pub retry_after: Option<Duration>,
    pub next_attempt_time: Option<DateTime<Utc>>,
}

impl CallFailure {
    fn new(kind: FailureKind, message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            error: error.into(),
            retries: 0,
            retry_after: None,
            next_attempt_time: None,
        }
    }

    #[must_use]
    pub fn circuit_breaker_open(&self) -> bool {
        self.kind == FailureKind::CircuitOpen
    }

    #[must_use]
    pub fn is_offline(&self) -> bool {
        matches!(self.kind, FailureKind::Offline | FailureKind::Network)
    }
}

enum AttemptError {
    TimedOut(Duration),
    Remote(RemoteError),
}

impl AttemptError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::TimedOut(_) => false,
            Self::Remote(error) => is_retryable(error),
        }
    }
}

/// Settles an admitted breaker attempt if the call future is dropped early,
/// so a half-open probe never stays in flight forever.
struct AttemptGuard<'a> {
    breakers: &'a CircuitBreakerRegistry,
    endpoint: &'a str,
    settled: bool,
}

impl AttemptGuard<'_> {
    fn settle(&mut self) {
        self.settled = true;
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breakers.record_failure(self.endpoint, "call cancelled");
        }
    }
}

/// Composes timeout, retry, circuit breaking, error normalization, latency
/// tracking and connectivity awareness around a remote call.
///
/// Cheap to clone; clones share registries, connectivity and sinks.
#[derive(Clone)]
pub struct ResilientClient {
    settings: ClientSettings,
    breakers: Arc<CircuitBreakerRegistry>,
    latency: Arc<LatencyRegistry>,
    connectivity: Connectivity,
    notifier: Arc<dyn Notifier>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    clock: Arc<dyn Clock>,
}

impl ResilientClient {
    #[must_use]
    pub fn new(
        settings: ClientSettings,
        breakers: Arc<CircuitBreakerRegistry>,
        latency: Arc<LatencyRegistry>,
        connectivity: Connectivity,
    ) -> Self {
        Self {
            settings,
            breakers,
            latency,
            connectivity,
            notifier: Arc::new(NullNotifier),
            telemetry: None,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Clock used to timestamp telemetry.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    #[must_use]
    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    #[must_use]
    pub fn latency(&self) -> &Arc<LatencyRegistry> {
        &self.latency
    }

    #[must_use]
    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    #[must_use]
    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    #[must_use]
    pub fn telemetry(&self) -> Option<&Arc<dyn TelemetrySink>> {
        self.telemetry.as_ref()
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Run `operation` against `endpoint` with the full resilience stack.
    ///
    /// `operation` is invoked once per attempt. Every terminal failure sends
    /// exactly one error notification; retries in progress send at most one
    /// "reconnecting" notification.
    pub async fn call<T, F, Fut>(
        &self,
        endpoint: &str,
        class: OperationClass,
        mut operation: F,
    ) -> Result<T, CallFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        if !self.connectivity.is_online() {
            debug!(endpoint, "Skipping call while offline");
            self.notifier.notify(Notification::error(OFFLINE_MESSAGE));
            return Err(CallFailure::new(
                FailureKind::Offline,
                OFFLINE_MESSAGE,
                "offline",
            ));
        }

        if let Admission::Denied {
            reason,
            retry_after,
            next_attempt_time,
        } = self.breakers.can_attempt(endpoint)
        {
            warn!(endpoint, %reason, "Call rejected by circuit breaker");
            self.notifier.notify(Notification::error(reason.clone()));
            let mut failure = CallFailure::new(FailureKind::CircuitOpen, reason.clone(), reason);
            failure.retry_after = Some(retry_after);
            failure.next_attempt_time = next_attempt_time;
            return Err(failure);
        }

        let mut guard = AttemptGuard {
            breakers: &self.breakers,
            endpoint,
            settled: false,
        };
        let budget = self.settings.timeouts.for_class(class);
        let started = Instant::now();
        let mut reconnecting_shown = false;

        let outcome = retry(
            &self.settings.retry,
            || {
                let attempt = operation();
                async move {
                    match timeout(budget, attempt).await {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(error)) => Err(AttemptError::Remote(error)),
                        Err(_) => Err(AttemptError::TimedOut(budget)),
                    }
                }
            },
            |error: &AttemptError| {
                let retryable = error.is_retryable();
                if retryable && !reconnecting_shown {
                    reconnecting_shown = true;
                    self.notifier.notify(Notification::info(RECONNECTING_MESSAGE));
                }
                retryable
            },
        )
        .await;

        let elapsed = started.elapsed();
        guard.settle();

        match outcome {
            Ok(Retried { value, retries }) => {
                self.breakers.record_success(endpoint);
                self.connectivity.set_online(true);
                if retries > 0 {
                    debug!(endpoint, retries, "Call succeeded after retries");
                }
                self.observe(endpoint, class, elapsed, true);
                Ok(value)
            }
            Err(RetryFailure {
                error,
                retries,
                exhausted,
            }) => {
                let failure = self.normalize(error, retries, exhausted);
                self.breakers.record_failure(endpoint, &failure.error);

                warn!(
                    endpoint,
                    kind = %failure.kind,
                    retries,
                    error = %failure.error,
                    "Call failed"
                );

                self.observe(endpoint, class, elapsed, false);
                self.notifier.notify(Notification::error(failure.message.clone()));
                self.report_error(endpoint, &failure);
                Err(failure)
            }
        }
    }

    fn normalize(&self, error: AttemptError, retries: u32, exhausted: bool) -> CallFailure {
        let mut failure = match error {
            AttemptError::TimedOut(budget) => CallFailure::new(
                FailureKind::Timeout,
                TIMEOUT_MESSAGE,
                format!("Timeout: operation took longer than {}ms", budget.as_millis()),
            ),
            AttemptError::Remote(error) if is_retryable(&error) => {
                if exhausted {
                    self.connectivity.set_online(false);
                }
                CallFailure::new(FailureKind::Network, CONNECTION_LOST_MESSAGE, error.message())
            }
            AttemptError::Remote(error) => CallFailure::new(
                FailureKind::Rejected,
                user_message(error.message()),
                error.message(),
            ),
        };
        failure.retries = retries;
        failure
    }

    fn observe(&self, endpoint: &str, class: OperationClass, elapsed: Duration, success: bool) {
        self.latency.record(endpoint, elapsed, success);
        if let Some(telemetry) = &self.telemetry {
            if let Err(e) = telemetry.record_latency(endpoint, elapsed, success) {
                warn!(endpoint, error = %e, "Failed to record latency");
            }
        }

        if elapsed <= self.settings.latency_warnings.for_class(class) {
            return;
        }

        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        warn!(endpoint, duration_ms, %class, "High latency");
        if let Some(telemetry) = &self.telemetry {
            let event = DiagnosticEvent {
                level: EventLevel::Warning,
                message: format!("High latency: {endpoint} ({duration_ms}ms)"),
                endpoint: Some(endpoint.to_string()),
                duration_ms: Some(duration_ms),
                at: self.clock.now(),
            };
            if let Err(e) = telemetry.log_event(event) {
                warn!(endpoint, error = %e, "Failed to log latency event");
            }
        }
    }

    fn report_error(&self, endpoint: &str, failure: &CallFailure) {
        let Some(telemetry) = &self.telemetry else {
            return;
        };
        let record = ErrorRecord {
            endpoint: endpoint.to_string(),
            kind: failure.kind,
            message: failure.message.clone(),
            raw: failure.error.clone(),
            at: self.clock.now(),
        };
        if let Err(e) = telemetry.record_error(record) {
            warn!(endpoint, error = %e, "Failed to record error");
        }
    }
}
