//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`clock`] - [`ManualClock`](clock::ManualClock), advanced explicitly.
//! - [`notifier`] - Notifier that records every notification.
//! - [`telemetry`] - Telemetry sink that records samples and can be made to fail.
//! - [`domain`] - Builders for actors, drafts and records.

pub mod clock;
pub mod domain;
pub mod notifier;
pub mod telemetry;
