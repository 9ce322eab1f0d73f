//! Realtime reconnect and store configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::sync::BackoffPolicy;

/// Resubscribe backoff after a channel error.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Fraction of the delay added or removed at random, in `[0, 1]`.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.2
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl RealtimeConfig {
    #[must_use]
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.backoff_multiplier,
            jitter: self.jitter,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_delay_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "realtime.initial_delay_ms",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "realtime.max_delay_ms",
                reason: "must be >= initial_delay_ms".to_string(),
            });
        }
        if self.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "realtime.backoff_multiplier",
                reason: "must be >= 1.0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::InvalidValue {
                field: "realtime.jitter",
                reason: "must be between 0 and 1".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoresConfig {
    /// Non-forced fetches within this window of the last success are skipped.
    #[serde(default = "default_fetch_cache_ms")]
    pub fetch_cache_ms: u64,
}

fn default_fetch_cache_ms() -> u64 {
    5_000
}

impl Default for StoresConfig {
    fn default() -> Self {
        Self {
            fetch_cache_ms: default_fetch_cache_ms(),
        }
    }
}
