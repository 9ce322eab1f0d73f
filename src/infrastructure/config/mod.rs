//! Configuration loading, validation and logging setup.

pub mod logging;
pub mod realtime;
pub mod resilience;
pub mod settings;

pub use logging::LoggingConfig;
pub use realtime::{RealtimeConfig, StoresConfig};
pub use resilience::{CircuitBreakerConfig, LatencyConfig, RetryConfig, TimeoutConfig};
pub use settings::Config;
