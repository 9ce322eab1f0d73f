//! Per-identifier mutation ordering.
//!
//! Two mutations on the same identifier run one after the other; mutations on
//! different identifiers never wait on each other. Lock entries are dropped
//! as soon as no mutation holds or awaits them.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::EntityId;

#[derive(Default)]
pub struct MutationSequencer {
    locks: DashMap<EntityId, Arc<Mutex<()>>>,
}

impl MutationSequencer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for every earlier mutation on `id` to finish, then hold the slot
    /// until the returned guard is dropped.
    pub async fn acquire(&self, id: &EntityId) -> SequenceGuard<'_> {
        let lock = Arc::clone(self.locks.entry(id.clone()).or_default().value());
        let guard = lock.lock_owned().await;
        SequenceGuard {
            sequencer: self,
            id: id.clone(),
            guard: Some(guard),
        }
    }

    /// Identifiers with a mutation running or queued.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.locks.len()
    }
}

/// Holds the mutation slot of one identifier.
pub struct SequenceGuard<'a> {
    sequencer: &'a MutationSequencer,
    id: EntityId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl fmt::Debug for SequenceGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceGuard")
            .field("id", &self.id)
            .field("held", &self.guard.is_some())
            .finish()
    }
}

impl Drop for SequenceGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: nobody is waiting.
        self.sequencer
            .locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready, task};

    #[tokio::test]
    async fn test_same_id_is_serialized() {
        let sequencer = Arc::new(MutationSequencer::new());
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let id = EntityId::from("a");

        let first = sequencer.acquire(&id).await;

        let task = {
            let sequencer = sequencer.clone();
            let order = order.clone();
            let id = id.clone();
            tokio::spawn(async move {
                let _guard = sequencer.acquire(&id).await;
                order.lock().push("second");
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        order.lock().push("first");
        drop(first);
        task.await.unwrap();

        assert_eq!(*order.lock(), vec!["first", "second"]);
        assert_eq!(sequencer.pending(), 0);
    }

    #[tokio::test]
    async fn test_distinct_ids_do_not_contend() {
        let sequencer = MutationSequencer::new();

        let _a = sequencer.acquire(&EntityId::from("a")).await;
        let _b = tokio::time::timeout(
            Duration::from_millis(50),
            sequencer.acquire(&EntityId::from("b")),
        )
        .await
        .expect("distinct identifiers must not block");

        assert_eq!(sequencer.pending(), 2);
    }

    #[test]
    fn test_waiter_is_woken_on_release() {
        let sequencer = MutationSequencer::new();
        let id = EntityId::from("a");
        let first = tokio_test::block_on(sequencer.acquire(&id));

        let mut second = task::spawn(sequencer.acquire(&id));
        assert_pending!(second.poll());

        drop(first);
        assert!(second.is_woken());
        let guard = assert_ready!(second.poll());
        assert_eq!(format!("{guard:?}"), r#"SequenceGuard { id: EntityId("a"), held: true }"#);
        drop(guard);

        assert_eq!(sequencer.pending(), 0);
    }
}
