//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings. Every
//! section is optional; missing sections and fields take their defaults.
//!
//! # Example
//!
//! ```no_run
//! use rentsync::infrastructure::config::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("rentsync.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::logging::LoggingConfig;
use super::realtime::{RealtimeConfig, StoresConfig};
use super::resilience::{CircuitBreakerConfig, LatencyConfig, RetryConfig, TimeoutConfig};
use crate::error::{ConfigError, Result};
use crate::resilience::ClientSettings;
use crate::store::StoreSettings;

/// Environment variable that overrides `logging.level`.
pub const LOG_LEVEL_ENV: &str = "RENTSYNC_LOG_LEVEL";

/// Main application configuration.
///
/// Load from a TOML file using [`Config::load`] or parse directly with
/// [`Config::parse_toml`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub retry: RetryConfig,

    /// Default breaker thresholds and per-endpoint overrides.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub latency: LatencyConfig,

    /// Change-feed resubscribe backoff.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    #[serde(default)]
    pub stores: StoresConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// Applies the `RENTSYNC_LOG_LEVEL` override, then validates.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML content is malformed or validation fails.
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.apply_overrides(std::env::var(LOG_LEVEL_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML content is
    /// malformed, or validation fails.
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Check that values are within acceptable ranges.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        self.retry.validate()?;
        self.circuit_breaker.validate()?;
        self.timeouts.validate()?;
        self.latency.validate()?;
        self.realtime.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    fn apply_overrides(&mut self, log_level: Option<String>) {
        if let Some(level) = log_level.filter(|l| !l.trim().is_empty()) {
            self.logging.level = level;
        }
    }

    /// Settings for the resilient call wrapper.
    #[must_use]
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            retry: self.retry.policy(),
            timeouts: self.timeouts.durations(),
            latency_warnings: self.latency.warnings(),
        }
    }

    #[must_use]
    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            fetch_cache: Duration::from_millis(self.stores.fetch_cache_ms),
            realtime: self.realtime.backoff(),
        }
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}
