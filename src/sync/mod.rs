//! Local collection synchronization.
//!
//! A store owns one [`SyncedCollection`] per remote table and two writers
//! for it: the [`OptimisticController`] for the user's own mutations and the
//! [`ChangeFeedReconciler`] for pushed changes. Both honor the collection's
//! liveness flag.

pub mod backoff;
pub mod collection;
pub mod optimistic;
pub mod reconciler;
pub mod sequencer;

pub use backoff::{BackoffPolicy, ReconnectBackoff};
pub use collection::SyncedCollection;
pub use optimistic::OptimisticController;
pub use reconciler::{ApplyOutcome, ChangeFeedReconciler, RowLoader, SubscriptionHandle};
pub use sequencer::{MutationSequencer, SequenceGuard};
