//! Rentsync - resilient remote calls and optimistic collection sync.
//!
//! This crate keeps local collections of a property-management dashboard
//! (properties, payments) in step with a remote store that can fail, stall
//! or push changes at any time.
//!
//! # Architecture
//!
//! - **`resilience`** - Every remote call goes through one wrapper
//!   - Connectivity gate, per-endpoint circuit breaker, bounded retry
//!   - Per-class timeouts, latency tracking, one user notification per failure
//!
//! - **`sync`** - Local collections and how they change
//!   - Optimistic create/update/delete with rollback
//!   - Change-feed reconciler with cancellable, self-healing subscriptions
//!
//! - **`store`** - The properties and payments stores built on both
//!
//! # Modules
//!
//! - [`adapter`] - In-memory backend, log notifier, diagnostic telemetry
//! - [`cli`] - The `rentsync` binary's commands
//! - [`domain`] - Identifiers, records, change events, endpoint names
//! - [`error`] - Error types for the crate
//! - [`infrastructure`] - Configuration, logging and runtime wiring
//! - [`port`] - Traits at the capability boundary
//! - [`redact`] - Masking of identifiers in logs
//!
//! # Features
//!
//! - `testkit` - Expose [`testkit`] helpers to integration tests
//!
//! # Example
//!
//! ```no_run
//! use rentsync::infrastructure::bootstrap::Runtime;
//! use rentsync::infrastructure::config::Config;
//! use rentsync::domain::ActorId;
//!
//! # async fn demo(actor: ActorId) -> rentsync::error::Result<()> {
//! let runtime = Runtime::in_memory(&Config::default(), actor);
//! runtime.properties.fetch(false).await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod cli;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;
pub mod redact;
pub mod resilience;
pub mod store;
pub mod sync;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
