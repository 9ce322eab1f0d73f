//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! Ports are the capability boundary between the sync core and everything
//! outside it: the remote backend, its push channel, the user notification
//! sink, the telemetry sink, and the clock.
//!
//! # Architecture
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │   Stores (sync core)    │
//!                    │                         │
//!     ┌──────────────┤  Resilience + Sync      ├──────────────┐
//!     │              │                         │              │
//!     │              └─────────────────────────┘              │
//!     │                         │                             │
//!     ▼                         ▼                             ▼
//! ┌─────────┐            ┌─────────────┐              ┌───────────┐
//! │ Backend │            │ Change Feed │              │ Notifier  │
//! │ Adapter │            │   Adapter   │              │ Telemetry │
//! └─────────┘            └─────────────┘              └───────────┘
//! ```

mod backend;
mod clock;
mod feed;
mod notifier;
mod telemetry;

pub use backend::{PaymentBackend, PropertyBackend, RemoteResult, TenantBackend};
pub use clock::{Clock, SystemClock};
pub use feed::{ChangeFeed, FeedMessage, FeedSubscription, FeedTopic};
pub use notifier::{Notification, NotificationLevel, Notifier, NotifierRegistry, NullNotifier};
pub use telemetry::{DiagnosticEvent, ErrorRecord, EventLevel, TelemetrySink};
