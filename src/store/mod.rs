//! Collection stores.
//!
//! Each store mirrors one remote table for the signed-in actor: a cached
//! collection, optimistic mutations through the resilient wrapper, and an
//! optional realtime subscription feeding the change-feed reconciler.

mod payments;
mod properties;

use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;

use crate::domain::ActorId;
use crate::error::{Error, Result};
use crate::sync::{BackoffPolicy, SubscriptionHandle};

pub use payments::PaymentsStore;
pub use properties::PropertiesStore;

/// Shown when a fetch fails offline and cached rows are kept.
pub const CACHED_DATA_MESSAGE: &str = "Showing cached data (connection lost)";

/// Store tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoreSettings {
    /// A non-forced fetch younger than this is skipped.
    pub fetch_cache: Duration,
    pub realtime: BackoffPolicy,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            fetch_cache: Duration::from_millis(5_000),
            realtime: BackoffPolicy::default(),
        }
    }
}

/// Result of a fetch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Rows were loaded; carries the row count.
    Fetched(usize),
    /// Skipped: a fetch is running or the cache is fresh.
    Skipped,
    /// The fetch failed offline; the cached rows were kept.
    Stale,
}

/// The signed-in actor, if any.
#[derive(Default)]
struct ActorSlot(RwLock<Option<ActorId>>);

impl ActorSlot {
    fn set(&self, actor: Option<ActorId>) {
        *self.0.write() = actor;
    }

    fn require(&self) -> Result<ActorId> {
        (*self.0.read()).ok_or(Error::Unauthenticated)
    }
}

#[derive(Default)]
struct FetchState {
    in_flight: bool,
    last_success: Option<Instant>,
}

/// Deduplicates and rate-limits fetches.
struct FetchGate {
    cache: Duration,
    state: Mutex<FetchState>,
}

impl FetchGate {
    fn new(cache: Duration) -> Self {
        Self {
            cache,
            state: Mutex::new(FetchState::default()),
        }
    }

    /// Claim the fetch slot, or `None` when the fetch should be skipped.
    fn begin(&self, force: bool, has_data: bool) -> Option<FetchTicket<'_>> {
        let mut state = self.state.lock();
        if state.in_flight {
            return None;
        }
        let fresh = state
            .last_success
            .is_some_and(|at| at.elapsed() < self.cache);
        if !force && fresh && has_data {
            return None;
        }
        state.in_flight = true;
        Some(FetchTicket { gate: self })
    }
}

struct FetchTicket<'a> {
    gate: &'a FetchGate,
}

impl FetchTicket<'_> {
    fn succeeded(&self) {
        self.gate.state.lock().last_success = Some(Instant::now());
    }
}

impl Drop for FetchTicket<'_> {
    fn drop(&mut self) {
        self.gate.state.lock().in_flight = false;
    }
}

/// At most one running realtime subscription.
#[derive(Default)]
struct RealtimeSlot(Mutex<Option<SubscriptionHandle>>);

impl RealtimeSlot {
    fn is_running(&self) -> bool {
        self.0.lock().as_ref().is_some_and(|h| !h.is_finished())
    }

    fn install(&self, handle: SubscriptionHandle) {
        if let Some(previous) = self.0.lock().replace(handle) {
            previous.close();
        }
    }

    fn stop(&self) -> bool {
        match self.0.lock().take() {
            Some(handle) => {
                handle.close();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fetch_gate_skips_fresh_cache() {
        let gate = FetchGate::new(Duration::from_millis(5_000));

        let ticket = gate.begin(false, false).unwrap();
        ticket.succeeded();
        drop(ticket);

        assert!(gate.begin(false, true).is_none());
        // Empty collections always refetch
        assert!(gate.begin(false, false).is_some());
        assert!(gate.begin(true, true).is_some());

        tokio::time::advance(Duration::from_millis(5_001)).await;
        assert!(gate.begin(false, true).is_some());
    }

    #[test]
    fn test_fetch_gate_skips_while_in_flight() {
        let gate = FetchGate::new(Duration::ZERO);

        let ticket = gate.begin(true, false).unwrap();
        assert!(gate.begin(true, false).is_none());

        drop(ticket);
        assert!(gate.begin(true, false).is_some());
    }

    #[test]
    fn test_actor_slot_requires_actor() {
        let slot = ActorSlot::default();
        assert!(matches!(slot.require(), Err(Error::Unauthenticated)));

        let actor = ActorId::new(uuid::Uuid::new_v4());
        slot.set(Some(actor));
        assert_eq!(slot.require().unwrap(), actor);
    }
}
