//! Retry, circuit breaker, timeout and latency configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::resilience::latency::DEFAULT_WINDOW;
use crate::resilience::{BreakerPolicy, ClassDurations, RetryPolicy};

/// Retry bounds applied to every wrapped call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_initial_delay_ms() -> u64 {
    300
}

fn default_retry_max_delay_ms() -> u64 {
    1200
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_retry_initial_delay_ms(),
            max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.initial_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_delay_ms",
                reason: "must be >= initial_delay_ms".to_string(),
            });
        }
        Ok(())
    }
}

/// Default breaker thresholds, with optional per-endpoint overrides.
///
/// ```toml
/// [circuit_breaker]
/// failure_threshold = 5
///
/// [circuit_breaker.endpoints.createProperty]
/// failure_threshold = 3
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
    #[serde(default = "default_monitoring_period_ms")]
    pub monitoring_period_ms: u64,
    #[serde(default)]
    pub endpoints: BTreeMap<String, BreakerOverride>,
}

/// Fields left out fall back to the defaults of [`CircuitBreakerConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BreakerOverride {
    pub failure_threshold: Option<u32>,
    pub reset_timeout_ms: Option<u64>,
    pub monitoring_period_ms: Option<u64>,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_timeout_ms() -> u64 {
    60_000
}

fn default_monitoring_period_ms() -> u64 {
    60_000
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_ms: default_reset_timeout_ms(),
            monitoring_period_ms: default_monitoring_period_ms(),
            endpoints: BTreeMap::new(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Policy applied to endpoints without an override.
    #[must_use]
    pub fn policy(&self) -> BreakerPolicy {
        BreakerPolicy {
            failure_threshold: self.failure_threshold,
            reset_timeout: Duration::from_millis(self.reset_timeout_ms),
            monitoring_period: Duration::from_millis(self.monitoring_period_ms),
        }
    }

    /// Per-endpoint policies, each merged over the defaults.
    pub fn overrides(&self) -> impl Iterator<Item = (&str, BreakerPolicy)> + '_ {
        self.endpoints.iter().map(|(endpoint, o)| {
            let policy = BreakerPolicy {
                failure_threshold: o.failure_threshold.unwrap_or(self.failure_threshold),
                reset_timeout: Duration::from_millis(
                    o.reset_timeout_ms.unwrap_or(self.reset_timeout_ms),
                ),
                monitoring_period: Duration::from_millis(
                    o.monitoring_period_ms.unwrap_or(self.monitoring_period_ms),
                ),
            };
            (endpoint.as_str(), policy)
        })
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 || self.overrides().any(|(_, p)| p.failure_threshold == 0)
        {
            return Err(ConfigError::InvalidValue {
                field: "circuit_breaker.failure_threshold",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.monitoring_period_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "circuit_breaker.monitoring_period_ms",
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Per-attempt timeout budgets by operation class.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_read_ms")]
    pub read_ms: u64,
    #[serde(default = "default_write_ms")]
    pub write_ms: u64,
    #[serde(default = "default_report_ms")]
    pub report_ms: u64,
}

fn default_read_ms() -> u64 {
    10_000
}

fn default_write_ms() -> u64 {
    12_000
}

fn default_report_ms() -> u64 {
    20_000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_ms: default_read_ms(),
            write_ms: default_write_ms(),
            report_ms: default_report_ms(),
        }
    }
}

impl TimeoutConfig {
    #[must_use]
    pub fn durations(&self) -> ClassDurations {
        ClassDurations {
            read: Duration::from_millis(self.read_ms),
            write: Duration::from_millis(self.write_ms),
            report: Duration::from_millis(self.report_ms),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.read_ms == 0 || self.write_ms == 0 || self.report_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeouts",
                reason: "timeouts must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// High-latency warning thresholds and the stats sample window.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LatencyConfig {
    #[serde(default = "default_read_warn_ms")]
    pub read_warn_ms: u64,
    #[serde(default = "default_write_warn_ms")]
    pub write_warn_ms: u64,
    #[serde(default = "default_report_warn_ms")]
    pub report_warn_ms: u64,
    /// Samples kept per endpoint for percentiles.
    #[serde(default = "default_window")]
    pub window: usize,
}

fn default_read_warn_ms() -> u64 {
    3_000
}

fn default_write_warn_ms() -> u64 {
    5_000
}

fn default_report_warn_ms() -> u64 {
    10_000
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            read_warn_ms: default_read_warn_ms(),
            write_warn_ms: default_write_warn_ms(),
            report_warn_ms: default_report_warn_ms(),
            window: default_window(),
        }
    }
}

impl LatencyConfig {
    #[must_use]
    pub fn warnings(&self) -> ClassDurations {
        ClassDurations {
            read: Duration::from_millis(self.read_warn_ms),
            write: Duration::from_millis(self.write_warn_ms),
            report: Duration::from_millis(self.report_warn_ms),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.window == 0 {
            return Err(ConfigError::InvalidValue {
                field: "latency.window",
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}
