//! Per-endpoint circuit breaker registry.
//!
//! Each endpoint gets its own three-state breaker:
//!
//! ```text
//! [Closed] --failures in window reach threshold--> [Open]
//! [Open]   --reset timeout elapsed, next attempt--> [HalfOpen]
//! [HalfOpen] --probe succeeds--> [Closed]
//! [HalfOpen] --probe fails-----> [Open]
//! ```
//!
//! Failure windows are evaluated against wall-clock timestamps from the
//! injected [`Clock`] and pruned lazily on every read and write; there are no
//! background timers.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::port::{Clock, SystemClock};

/// Upper bound on retained failure entries per endpoint, whatever the window.
const MAX_HISTORY: usize = 256;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation; attempts are allowed.
    Closed,
    /// Too many recent failures; attempts are rejected until the reset timeout.
    Open,
    /// Cooldown elapsed; a single probe decides the next state.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Thresholds for one endpoint's breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerPolicy {
    /// Failures within `monitoring_period` that open the circuit.
    pub failure_threshold: u32,
    /// Time the circuit stays open before a probe is allowed.
    pub reset_timeout: Duration,
    /// Width of the rolling failure window.
    pub monitoring_period: Duration,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            monitoring_period: Duration::from_secs(60),
        }
    }
}

/// Answer of [`CircuitBreakerRegistry::can_attempt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied {
        reason: String,
        /// Time left before the circuit will admit a probe.
        retry_after: Duration,
        next_attempt_time: Option<DateTime<Utc>>,
    },
}

impl Admission {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Allowed => None,
            Self::Denied { reason, .. } => Some(reason),
        }
    }
}

/// Point-in-time view of one endpoint's breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    /// Failures inside the monitoring window, not the lifetime total.
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub next_attempt_time: Option<DateTime<Utc>>,
    /// Most recent failure message still inside the window.
    pub last_error: Option<String>,
    #[serde(skip)]
    pub policy: BreakerPolicy,
}

#[derive(Debug, Clone)]
struct FailureEntry {
    at: DateTime<Utc>,
    error: String,
}

#[derive(Debug)]
struct Circuit {
    policy: BreakerPolicy,
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<DateTime<Utc>>,
    next_attempt_time: Option<DateTime<Utc>>,
    history: VecDeque<FailureEntry>,
    probe_in_flight: bool,
}

impl Circuit {
    fn new(policy: BreakerPolicy) -> Self {
        Self {
            policy,
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
            next_attempt_time: None,
            history: VecDeque::new(),
            probe_in_flight: false,
        }
    }

    /// Drop failures older than the monitoring window and refresh the count.
    fn prune(&mut self, now: DateTime<Utc>) {
        let window = span(self.policy.monitoring_period);
        while let Some(front) = self.history.front() {
            if now - front.at >= window {
                self.history.pop_front();
            } else {
                break;
            }
        }
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
        self.failure_count = self.history.len() as u32;
    }

    fn clear(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.success_count = 0;
        self.last_failure_time = None;
        self.next_attempt_time = None;
        self.history.clear();
        self.probe_in_flight = false;
    }

    fn open(&mut self, now: DateTime<Utc>) {
        self.state = CircuitState::Open;
        self.next_attempt_time = Some(add(now, self.policy.reset_timeout));
        self.probe_in_flight = false;
    }

    fn snapshot(&self) -> CircuitSnapshot {
        CircuitSnapshot {
            state: self.state,
            failure_count: self.failure_count,
            success_count: self.success_count,
            last_failure_time: self.last_failure_time,
            next_attempt_time: self.next_attempt_time,
            last_error: self.history.back().map(|entry| entry.error.clone()),
            policy: self.policy,
        }
    }
}

/// Registry of circuit breakers keyed by endpoint name.
///
/// Construct one per process (or one per test) and share it behind an `Arc`.
/// Every operation is a single synchronous map mutation under a short lock.
pub struct CircuitBreakerRegistry {
    default_policy: BreakerPolicy,
    clock: Arc<dyn Clock>,
    circuits: Mutex<HashMap<String, Circuit>>,
}

impl CircuitBreakerRegistry {
    /// Create a registry driven by the system clock.
    #[must_use]
    pub fn new(default_policy: BreakerPolicy) -> Self {
        Self::with_clock(default_policy, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(default_policy: BreakerPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            default_policy,
            clock,
            circuits: Mutex::new(HashMap::new()),
        }
    }

    /// Override the policy for one endpoint.
    ///
    /// Applies to an existing circuit immediately; counters are kept.
    pub fn configure(&self, endpoint: &str, policy: BreakerPolicy) {
        let mut circuits = self.circuits.lock();
        circuits
            .entry(endpoint.to_string())
            .and_modify(|circuit| circuit.policy = policy)
            .or_insert_with(|| Circuit::new(policy));
    }

    /// Gate a single attempt against `endpoint`.
    ///
    /// When the circuit is open and its reset timeout has elapsed, this moves
    /// it to half-open and admits exactly one probe. Call it once per attempt,
    /// never speculatively.
    pub fn can_attempt(&self, endpoint: &str) -> Admission {
        let now = self.clock.now();
        let mut circuits = self.circuits.lock();
        let circuit = self.circuit(&mut circuits, endpoint);

        match circuit.state {
            CircuitState::Closed => Admission::Allowed,
            CircuitState::Open => {
                let next = circuit
                    .next_attempt_time
                    .unwrap_or_else(|| add(now, circuit.policy.reset_timeout));
                if now >= next {
                    circuit.state = CircuitState::HalfOpen;
                    circuit.success_count = 0;
                    circuit.probe_in_flight = true;
                    info!(endpoint, "Circuit breaker half-open, allowing probe");
                    return Admission::Allowed;
                }

                let retry_after = (next - now).to_std().unwrap_or(Duration::ZERO);
                let wait_secs = retry_after.as_millis().div_ceil(1000);
                Admission::Denied {
                    reason: format!("Circuit open. Retry in {wait_secs}s"),
                    retry_after,
                    next_attempt_time: Some(next),
                }
            }
            CircuitState::HalfOpen => {
                if circuit.probe_in_flight {
                    return Admission::Denied {
                        reason: "Circuit half-open. Probe in progress".to_string(),
                        retry_after: Duration::ZERO,
                        next_attempt_time: None,
                    };
                }
                circuit.probe_in_flight = true;
                Admission::Allowed
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self, endpoint: &str) {
        let mut circuits = self.circuits.lock();
        let circuit = self.circuit(&mut circuits, endpoint);

        match circuit.state {
            CircuitState::HalfOpen => {
                circuit.clear();
                info!(endpoint, "Circuit breaker closed after successful probe");
            }
            CircuitState::Closed => {
                circuit.failure_count = 0;
                circuit.success_count = circuit.success_count.saturating_add(1);
                circuit.history.clear();
            }
            CircuitState::Open => {
                debug!(endpoint, "Ignoring success reported while circuit is open");
            }
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self, endpoint: &str, error: &str) {
        let now = self.clock.now();
        let mut circuits = self.circuits.lock();
        let circuit = self.circuit(&mut circuits, endpoint);

        circuit.history.push_back(FailureEntry {
            at: now,
            error: error.to_string(),
        });
        circuit.prune(now);
        circuit.last_failure_time = Some(now);

        match circuit.state {
            CircuitState::Closed if circuit.failure_count >= circuit.policy.failure_threshold => {
                circuit.open(now);
                warn!(
                    endpoint,
                    failures = circuit.failure_count,
                    reset_timeout_ms = circuit.policy.reset_timeout.as_millis() as u64,
                    "Circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                circuit.open(now);
                warn!(endpoint, "Circuit breaker probe failed, reopening");
            }
            _ => {}
        }
    }

    /// Force an endpoint back to closed with cleared counters.
    pub fn reset(&self, endpoint: &str) {
        let mut circuits = self.circuits.lock();
        if let Some(circuit) = circuits.get_mut(endpoint) {
            circuit.clear();
            info!(endpoint, "Circuit breaker reset manually");
        }
    }

    /// Current state of one endpoint, creating it if unseen.
    pub fn get_state(&self, endpoint: &str) -> CircuitSnapshot {
        let now = self.clock.now();
        let mut circuits = self.circuits.lock();
        let circuit = self.circuit(&mut circuits, endpoint);
        circuit.prune(now);
        circuit.snapshot()
    }

    /// Current state of every known endpoint.
    pub fn all_states(&self) -> BTreeMap<String, CircuitSnapshot> {
        let now = self.clock.now();
        let mut circuits = self.circuits.lock();
        circuits
            .iter_mut()
            .map(|(endpoint, circuit)| {
                circuit.prune(now);
                (endpoint.clone(), circuit.snapshot())
            })
            .collect()
    }

    fn circuit<'a>(
        &self,
        circuits: &'a mut HashMap<String, Circuit>,
        endpoint: &str,
    ) -> &'a mut Circuit {
        circuits
            .entry(endpoint.to_string())
            .or_insert_with(|| Circuit::new(self.default_policy))
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerPolicy::default())
    }
}

fn span(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

fn add(at: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    at.checked_add_signed(span(duration))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
