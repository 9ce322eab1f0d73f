//! Implementations of ports (hexagonal adapters).

pub mod memory;
pub mod notifier;
pub mod telemetry;
