//! Optimistic mutation protocol.
//!
//! Each mutation writes the tentative state into the collection first, then
//! awaits the remote commit, then reconciles or rolls back:
//!
//! | Mutation | Tentative write          | On success              | On failure                 |
//! |----------|--------------------------|-------------------------|----------------------------|
//! | create   | placeholder at the front | replace placeholder     | restore full snapshot      |
//! | update   | patch entry in place     | replace with server row | restore the single entry   |
//! | delete   | remove entry             | nothing                 | restore full snapshot      |
//!
//! A full snapshot is only put back when nothing else has written since the
//! tentative write; otherwise just that write is undone, so mutations on
//! different identifiers never clobber each other.
//!
//! Updates and deletes on the same identifier are sequenced. Once the
//! collection is closed, late completions pass their result through but
//! leave the collection untouched.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::domain::{EntityId, Record};
use crate::error::{Error, Result};
use crate::port::Clock;
use crate::resilience::CallFailure;

use super::collection::SyncedCollection;
use super::sequencer::MutationSequencer;

pub struct OptimisticController<T: Record> {
    collection: SyncedCollection<T>,
    sequencer: MutationSequencer,
    clock: Arc<dyn Clock>,
}

impl<T: Record> OptimisticController<T> {
    #[must_use]
    pub fn new(collection: SyncedCollection<T>, clock: Arc<dyn Clock>) -> Self {
        Self {
            collection,
            sequencer: MutationSequencer::new(),
            clock,
        }
    }

    #[must_use]
    pub fn collection(&self) -> &SyncedCollection<T> {
        &self.collection
    }

    /// Insert a placeholder built by `placeholder`, then await `commit`.
    ///
    /// `commit` is not polled until the placeholder is in the collection.
    pub async fn create<P, Fut>(&self, placeholder: P, commit: Fut) -> Result<T>
    where
        P: FnOnce(EntityId) -> T,
        Fut: Future<Output = std::result::Result<T, CallFailure>>,
    {
        if !self.collection.is_live() {
            return Err(Error::Inactive);
        }

        let temp_id = EntityId::temporary(self.clock.now());
        let snapshot = self.collection.snapshot();
        let placeholder = placeholder(temp_id.clone());
        let mut tentative = snapshot.clone();
        tentative.insert(0, placeholder.clone());
        if !self.collection.insert_front(placeholder) {
            return Err(Error::Inactive);
        }

        match commit.await {
            Ok(entry) => {
                // A concurrent rollback or fetch may have dropped the placeholder
                if !self.collection.replace(&temp_id, entry.clone())
                    && !self.collection.insert_front(entry.clone())
                {
                    debug!(kind = T::KIND, id = %entry.id(), "Entry not reconciled");
                }
                Ok(entry)
            }
            Err(failure) => {
                self.collection.rollback(&tentative, snapshot, |entries| {
                    entries.retain(|e| e.id() != &temp_id);
                });
                debug!(kind = T::KIND, "Create failed, collection restored");
                Err(failure.into())
            }
        }
    }

    /// Patch the entry in place with `patch`, then await `commit`.
    pub async fn update<P, Fut>(&self, id: &EntityId, patch: P, commit: Fut) -> Result<T>
    where
        P: FnOnce(&mut T),
        Fut: Future<Output = std::result::Result<T, CallFailure>>,
    {
        let _slot = self.sequencer.acquire(id).await;
        if !self.collection.is_live() {
            return Err(Error::Inactive);
        }

        let Some(previous) = self.collection.update_with(id, patch) else {
            return Err(Error::NotFound {
                kind: T::KIND,
                id: id.clone(),
            });
        };

        match commit.await {
            Ok(entry) => {
                self.collection.replace(id, entry.clone());
                Ok(entry)
            }
            Err(failure) => {
                self.collection.replace(id, previous);
                debug!(kind = T::KIND, %id, "Update failed, entry restored");
                Err(failure.into())
            }
        }
    }

    /// Remove the entry, then await `commit`.
    pub async fn delete<Fut>(&self, id: &EntityId, commit: Fut) -> Result<T>
    where
        Fut: Future<Output = std::result::Result<(), CallFailure>>,
    {
        let _slot = self.sequencer.acquire(id).await;
        if !self.collection.is_live() {
            return Err(Error::Inactive);
        }

        let snapshot = self.collection.snapshot();
        let Some(removed) = self.collection.remove(id) else {
            return Err(Error::NotFound {
                kind: T::KIND,
                id: id.clone(),
            });
        };
        let position = snapshot.iter().position(|e| e.id() == id).unwrap_or(0);
        let anchor = position
            .checked_sub(1)
            .map(|before| snapshot[before].id().clone());
        let mut tentative = snapshot.clone();
        tentative.retain(|e| e.id() != id);

        match commit.await {
            Ok(()) => Ok(removed),
            Err(failure) => {
                let entry = removed;
                self.collection.rollback(&tentative, snapshot, move |entries| {
                    if entries.iter().any(|e| e.id() == entry.id()) {
                        return;
                    }
                    // Back behind the entry that preceded it
                    let at = match &anchor {
                        None => 0,
                        Some(anchor) => entries
                            .iter()
                            .position(|e| e.id() == anchor)
                            .map_or(position.min(entries.len()), |p| p + 1),
                    };
                    entries.insert(at, entry);
                });
                debug!(kind = T::KIND, %id, "Delete failed, collection restored");
                Err(failure.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::SystemClock;
    use crate::resilience::FailureKind;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: EntityId,
        value: u32,
    }

    impl Record for Item {
        const KIND: &'static str = "item";

        fn id(&self) -> &EntityId {
            &self.id
        }
    }

    fn item(id: &str, value: u32) -> Item {
        Item {
            id: EntityId::from(id),
            value,
        }
    }

    fn controller(entries: Vec<Item>) -> OptimisticController<Item> {
        OptimisticController::new(SyncedCollection::from_entries(entries), Arc::new(SystemClock))
    }

    fn rejected() -> CallFailure {
        CallFailure {
            kind: FailureKind::Rejected,
            message: "Invalid input".into(),
            error: "Invalid input".into(),
            retries: 0,
            retry_after: None,
            next_attempt_time: None,
        }
    }

    #[tokio::test]
    async fn test_create_failure_leaves_collection_unchanged() {
        let controller = controller(vec![item("a", 1)]);

        let result = controller
            .create(|id| Item { id, value: 0 }, async { Err(rejected()) })
            .await;

        assert!(matches!(result, Err(Error::Call(_))));
        assert_eq!(controller.collection().snapshot(), vec![item("a", 1)]);
    }

    #[tokio::test]
    async fn test_create_success_replaces_placeholder_at_front() {
        let controller = controller(vec![item("a", 1)]);
        let collection = controller.collection().clone();

        let created = controller
            .create(|id| Item { id, value: 2 }, async move {
                // The placeholder is visible while the commit is pending
                let first = collection.snapshot()[0].clone();
                assert!(first.id.is_temporary());
                Ok(item("b", 2))
            })
            .await
            .unwrap();

        assert_eq!(created, item("b", 2));
        assert_eq!(
            controller.collection().snapshot(),
            vec![item("b", 2), item("a", 1)]
        );
    }

    #[tokio::test]
    async fn test_update_failure_restores_entry() {
        let controller = controller(vec![item("a", 1), item("b", 2)]);

        let result = controller
            .update(&"a".into(), |i| i.value = 10, async { Err(rejected()) })
            .await;

        assert!(result.is_err());
        assert_eq!(
            controller.collection().snapshot(),
            vec![item("a", 1), item("b", 2)]
        );
    }

    #[tokio::test]
    async fn test_update_success_takes_server_echo() {
        let controller = controller(vec![item("a", 1)]);

        let updated = controller
            .update(&"a".into(), |i| i.value = 10, async { Ok(item("a", 11)) })
            .await
            .unwrap();

        assert_eq!(updated.value, 11);
        assert_eq!(controller.collection().snapshot(), vec![item("a", 11)]);
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let controller = controller(vec![item("a", 1)]);

        let result = controller
            .update(&"zzz".into(), |i| i.value = 10, async { Ok(item("zzz", 1)) })
            .await;

        assert!(matches!(result, Err(Error::NotFound { kind: "item", .. })));
    }

    #[tokio::test]
    async fn test_delete_failure_restores_order() {
        let controller = controller(vec![item("a", 1), item("b", 2), item("c", 3)]);

        let result = controller
            .delete(&"b".into(), async { Err(rejected()) })
            .await;

        assert!(result.is_err());
        assert_eq!(
            controller.collection().snapshot(),
            vec![item("a", 1), item("b", 2), item("c", 3)]
        );
    }

    #[tokio::test]
    async fn test_delete_success() {
        let controller = controller(vec![item("a", 1), item("b", 2)]);

        let removed = controller.delete(&"a".into(), async { Ok(()) }).await.unwrap();

        assert_eq!(removed, item("a", 1));
        assert_eq!(controller.collection().snapshot(), vec![item("b", 2)]);
    }

    #[tokio::test]
    async fn test_late_completion_after_close_is_ignored() {
        let controller = controller(vec![item("a", 1)]);
        let collection = controller.collection().clone();

        let created = controller
            .create(|id| Item { id, value: 2 }, async move {
                collection.close();
                Ok(item("b", 2))
            })
            .await
            .unwrap();

        // The result still reaches the caller
        assert_eq!(created, item("b", 2));
        assert_eq!(controller.collection().len(), 2);
        assert!(controller.collection().snapshot()[0].id.is_temporary());
    }

    #[tokio::test]
    async fn test_mutations_on_closed_collection_fail_fast() {
        let controller = controller(vec![item("a", 1)]);
        controller.collection().close();

        let result = controller
            .create(|id| Item { id, value: 2 }, async { Ok(item("b", 2)) })
            .await;

        assert!(matches!(result, Err(Error::Inactive)));
    }

    #[tokio::test]
    async fn test_same_id_updates_apply_in_order() {
        let controller = Arc::new(controller(vec![item("a", 1)]));

        let slow = {
            let controller = controller.clone();
            tokio::spawn(async move {
                controller
                    .update(&"a".into(), |i| i.value = 2, async {
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Ok(item("a", 2))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;

        // Queued behind the slow update; its echo lands last
        controller
            .update(&"a".into(), |i| i.value = 3, async { Ok(item("a", 3)) })
            .await
            .unwrap();
        slow.await.unwrap().unwrap();

        assert_eq!(controller.collection().snapshot(), vec![item("a", 3)]);
    }

    #[tokio::test]
    async fn test_overlapping_creates_keep_committed_entry() {
        let controller = controller(vec![item("a", 1)]);

        let failing = controller.create(|id| Item { id, value: 0 }, async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Err(rejected())
        });
        let succeeding = controller.create(|id| Item { id, value: 2 }, async {
            tokio::time::sleep(Duration::from_millis(40)).await;
            Ok(item("b", 2))
        });
        let (failed, created) = tokio::join!(failing, succeeding);

        assert!(failed.is_err());
        assert_eq!(created.unwrap(), item("b", 2));
        assert_eq!(
            controller.collection().snapshot(),
            vec![item("b", 2), item("a", 1)]
        );
    }

    #[tokio::test]
    async fn test_failed_create_after_other_commit_keeps_it() {
        let controller = controller(vec![item("a", 1)]);

        let failing = controller.create(|id| Item { id, value: 0 }, async {
            tokio::time::sleep(Duration::from_millis(40)).await;
            Err(rejected())
        });
        let succeeding = controller.create(|id| Item { id, value: 2 }, async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(item("b", 2))
        });
        let (failed, created) = tokio::join!(failing, succeeding);

        assert!(failed.is_err());
        assert!(created.is_ok());
        assert_eq!(
            controller.collection().snapshot(),
            vec![item("b", 2), item("a", 1)]
        );
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_concurrent_create() {
        let controller = controller(vec![item("a", 1), item("c", 3)]);

        let c_id: EntityId = "c".into();
        let deleting = controller.delete(&c_id, async {
            tokio::time::sleep(Duration::from_millis(40)).await;
            Err(rejected())
        });
        let creating = controller.create(|id| Item { id, value: 2 }, async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(item("b", 2))
        });
        let (deleted, created) = tokio::join!(deleting, creating);

        assert!(deleted.is_err());
        assert!(created.is_ok());
        assert_eq!(
            controller.collection().snapshot(),
            vec![item("b", 2), item("a", 1), item("c", 3)]
        );
    }

    #[tokio::test]
    async fn test_create_survives_concurrent_refresh() {
        let controller = controller(vec![item("a", 1)]);
        let collection = controller.collection().clone();

        let created = controller
            .create(|id| Item { id, value: 2 }, async move {
                // A fetch lands while the commit is pending
                collection.replace_all(vec![item("a", 1), item("z", 26)]);
                Ok(item("b", 2))
            })
            .await
            .unwrap();

        assert_eq!(created, item("b", 2));
        assert_eq!(
            controller.collection().snapshot(),
            vec![item("b", 2), item("a", 1), item("z", 26)]
        );
    }
}
