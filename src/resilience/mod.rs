//! Fault tolerance around remote calls.
//!
//! - [`retry`]: bounded attempts with capped exponential backoff
//! - [`breaker`]: per-endpoint circuit breaker registry
//! - [`classify`]: retryability and friendly error phrasing
//! - [`latency`]: per-endpoint latency statistics
//! - [`connectivity`]: online/offline signal
//! - [`client`]: the wrapper composing all of the above

pub mod breaker;
pub mod classify;
pub mod client;
pub mod connectivity;
pub mod latency;
pub mod retry;

pub use breaker::{Admission, BreakerPolicy, CircuitBreakerRegistry, CircuitSnapshot, CircuitState};
pub use client::{
    CallFailure, ClassDurations, ClientSettings, FailureKind, OperationClass, ResilientClient,
};
pub use connectivity::Connectivity;
pub use latency::{LatencyRegistry, LatencyStats};
pub use retry::{retry, Retried, RetryFailure, RetryPolicy};
