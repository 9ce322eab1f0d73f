//! Change-feed reconciliation.
//!
//! Merges push events into the same [`SyncedCollection`] the optimistic
//! controller writes to. Push payloads are partial, so inserts and updates
//! reload the full row through a [`RowLoader`] before touching the
//! collection. Every event is applied idempotently:
//!
//! - INSERT of a present identifier is ignored
//! - UPDATE of an absent identifier is ignored
//! - DELETE of an absent identifier is ignored

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{ChangeEvent, ChangeKind, ChannelStatus, EntityId, Record};
use crate::error::Result;
use crate::port::{ChangeFeed, FeedMessage, FeedTopic};
use crate::resilience::Connectivity;

use super::backoff::ReconnectBackoff;
use super::collection::SyncedCollection;

/// Loads the authoritative version of one row.
#[async_trait]
pub trait RowLoader<T: Record>: Send + Sync {
    async fn load(&self, id: &EntityId) -> Result<T>;
}

/// What applying one event did to the collection.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome<T> {
    Inserted(T),
    Replaced(T),
    Removed(T),
    /// Nothing to do (duplicate insert, update or delete of an absent id,
    /// or an event without an identifier).
    Ignored,
    /// The reconciler or its collection has been shut down.
    Inactive,
    /// The authoritative row could not be loaded.
    LoadFailed,
}

pub struct ChangeFeedReconciler<T: Record> {
    collection: SyncedCollection<T>,
    loader: Arc<dyn RowLoader<T>>,
    active: Arc<AtomicBool>,
    connectivity: Option<Connectivity>,
}

impl<T: Record> ChangeFeedReconciler<T> {
    #[must_use]
    pub fn new(collection: SyncedCollection<T>, loader: Arc<dyn RowLoader<T>>) -> Self {
        Self {
            collection,
            loader,
            active: Arc::new(AtomicBool::new(true)),
            connectivity: None,
        }
    }

    /// Mark `connectivity` online whenever the feed confirms a subscription.
    #[must_use]
    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) && self.collection.is_live()
    }

    /// Apply one change event.
    pub async fn apply(&self, event: ChangeEvent) -> ApplyOutcome<T> {
        if !self.is_active() {
            return ApplyOutcome::Inactive;
        }
        let Some(id) = event.subject_id() else {
            debug!(kind = T::KIND, event = %event.kind, "Change event without identifier");
            return ApplyOutcome::Ignored;
        };

        match event.kind {
            ChangeKind::Insert => {
                if self.collection.contains(&id) {
                    return ApplyOutcome::Ignored;
                }
                let row = match self.load(&id).await {
                    Ok(row) => row,
                    Err(outcome) => return outcome,
                };
                if self.collection.insert_front(row.clone()) {
                    ApplyOutcome::Inserted(row)
                } else {
                    self.ignored_or_inactive()
                }
            }
            ChangeKind::Update => {
                if !self.collection.contains(&id) {
                    return ApplyOutcome::Ignored;
                }
                let row = match self.load(&id).await {
                    Ok(row) => row,
                    Err(outcome) => return outcome,
                };
                if self.collection.replace(&id, row.clone()) {
                    ApplyOutcome::Replaced(row)
                } else {
                    self.ignored_or_inactive()
                }
            }
            ChangeKind::Delete => match self.collection.remove(&id) {
                Some(removed) => ApplyOutcome::Removed(removed),
                None => self.ignored_or_inactive(),
            },
        }
    }

    async fn load(&self, id: &EntityId) -> std::result::Result<T, ApplyOutcome<T>> {
        let row = self.loader.load(id).await.map_err(|e| {
            warn!(kind = T::KIND, %id, error = %e, "Failed to load changed row");
            ApplyOutcome::LoadFailed
        })?;
        // Teardown may have begun while the row was loading
        if !self.is_active() {
            return Err(ApplyOutcome::Inactive);
        }
        Ok(row)
    }

    fn ignored_or_inactive(&self) -> ApplyOutcome<T> {
        if self.is_active() {
            ApplyOutcome::Ignored
        } else {
            ApplyOutcome::Inactive
        }
    }

    /// Subscribe to `topic` and apply its events until the handle is closed.
    ///
    /// A `CHANNEL_ERROR` status or a dropped stream triggers a resubscribe
    /// after the next backoff delay; the backoff resets on every confirmed
    /// `SUBSCRIBED`, which also brings an attached [`Connectivity`] back
    /// online. A `CLOSED` status ends the loop. `on_applied` observes every
    /// outcome.
    pub fn spawn<F>(
        self,
        feed: Arc<dyn ChangeFeed>,
        topic: FeedTopic,
        mut backoff: ReconnectBackoff,
        on_applied: F,
    ) -> SubscriptionHandle
    where
        F: Fn(&ApplyOutcome<T>) + Send + Sync + 'static,
    {
        let (shutdown_tx, mut shutdown) = watch::channel(false);
        let active = Arc::clone(&self.active);
        let channel = topic.channel_name();

        let task = tokio::spawn(async move {
            'session: loop {
                if !self.is_active() {
                    break;
                }

                let subscribed = tokio::select! {
                    _ = stopped(&mut shutdown) => break,
                    result = feed.subscribe(&topic) => result,
                };

                match subscribed {
                    Ok(mut subscription) => loop {
                        let message = tokio::select! {
                            _ = stopped(&mut shutdown) => break 'session,
                            message = subscription.next() => message,
                        };

                        match message {
                            Some(FeedMessage::Status(ChannelStatus::Subscribed)) => {
                                backoff.reset();
                                if let Some(connectivity) = &self.connectivity {
                                    connectivity.set_online(true);
                                }
                                info!(channel = %channel, actor = %topic.actor, "Realtime subscribed");
                            }
                            Some(FeedMessage::Status(ChannelStatus::ChannelError)) => {
                                warn!(channel = %channel, "Realtime channel error");
                                break;
                            }
                            Some(FeedMessage::Status(ChannelStatus::Closed)) => {
                                info!(channel = %channel, "Realtime channel closed");
                                break 'session;
                            }
                            Some(FeedMessage::Change(event)) => {
                                let outcome = self.apply(event).await;
                                on_applied(&outcome);
                                if outcome == ApplyOutcome::Inactive {
                                    break 'session;
                                }
                            }
                            None => {
                                warn!(channel = %channel, "Realtime stream ended");
                                break;
                            }
                        }
                    },
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "Realtime subscribe failed");
                    }
                }

                let delay = backoff.next_delay();
                debug!(
                    channel = %channel,
                    attempt = backoff.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "Resubscribing after delay"
                );
                tokio::select! {
                    _ = stopped(&mut shutdown) => break,
                    () = tokio::time::sleep(delay) => {}
                }
            }
            debug!(channel = %channel, "Realtime loop stopped");
        });

        SubscriptionHandle {
            active,
            shutdown: shutdown_tx,
            task: Mutex::new(Some(task)),
        }
    }
}

/// Resolves once shutdown is requested or the handle is gone.
fn stopped(shutdown: &mut watch::Receiver<bool>) -> impl Future<Output = ()> + '_ {
    async move {
        loop {
            let stop = *shutdown.borrow_and_update();
            if stop || shutdown.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Cancellable handle to a running subscription loop.
///
/// Dropping the handle closes it.
pub struct SubscriptionHandle {
    active: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SubscriptionHandle {
    /// Stop applying events and detach from the channel. Idempotent.
    pub fn close(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        let _ = self.shutdown.send(true);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        !self.active.load(Ordering::Acquire)
    }

    /// Close and wait for the loop to finish.
    pub async fn shutdown(&self) {
        self.close();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Realtime task ended abnormally");
            }
        }
    }

    /// True once the loop has exited on its own or after `close`.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.lock().as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;
    use std::collections::HashMap;

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

    struct MapLoader(parking_lot::Mutex<HashMap<String, u32>>);

    impl MapLoader {
        fn new(rows: &[(&str, u32)]) -> Arc<Self> {
            Arc::new(Self(parking_lot::Mutex::new(
                rows.iter().map(|(k, v)| ((*k).to_string(), *v)).collect(),
            )))
        }
    }

    #[async_trait]
    impl RowLoader<Item> for MapLoader {
        async fn load(&self, id: &EntityId) -> Result<Item> {
            self.0
                .lock()
                .get(id.as_str())
                .map(|value| item(id.as_str(), *value))
                .ok_or_else(|| Error::NotFound {
                    kind: "item",
                    id: id.clone(),
                })
        }
    }

    fn reconciler(entries: Vec<Item>, loader: Arc<MapLoader>) -> ChangeFeedReconciler<Item> {
        ChangeFeedReconciler::new(SyncedCollection::from_entries(entries), loader)
    }

    #[tokio::test]
    async fn test_insert_of_present_id_is_noop() {
        let r = reconciler(vec![item("a", 1)], MapLoader::new(&[("a", 9)]));

        let outcome = r.apply(ChangeEvent::insert(json!({"id": "a"}))).await;

        assert_eq!(outcome, ApplyOutcome::Ignored);
        assert_eq!(r.collection.snapshot(), vec![item("a", 1)]);
    }

    #[tokio::test]
    async fn test_insert_loads_full_row() {
        let r = reconciler(vec![item("a", 1)], MapLoader::new(&[("b", 2)]));

        let outcome = r.apply(ChangeEvent::insert(json!({"id": "b"}))).await;

        assert_eq!(outcome, ApplyOutcome::Inserted(item("b", 2)));
        assert_eq!(r.collection.snapshot(), vec![item("b", 2), item("a", 1)]);
    }

    #[tokio::test]
    async fn test_update_of_absent_id_is_noop() {
        let r = reconciler(vec![item("a", 1)], MapLoader::new(&[("b", 2)]));

        let outcome = r
            .apply(ChangeEvent::update(json!({"id": "b"}), None))
            .await;

        assert_eq!(outcome, ApplyOutcome::Ignored);
        assert_eq!(r.collection.len(), 1);
    }

    #[tokio::test]
    async fn test_update_replaces_in_place() {
        let r = reconciler(
            vec![item("a", 1), item("b", 2)],
            MapLoader::new(&[("a", 7)]),
        );

        let outcome = r
            .apply(ChangeEvent::update(json!({"id": "a"}), None))
            .await;

        assert_eq!(outcome, ApplyOutcome::Replaced(item("a", 7)));
        assert_eq!(r.collection.snapshot(), vec![item("a", 7), item("b", 2)]);
    }

    #[tokio::test]
    async fn test_delete_tolerates_absence() {
        let r = reconciler(vec![item("a", 1)], MapLoader::new(&[]));

        assert_eq!(
            r.apply(ChangeEvent::delete(json!({"id": "zzz"}))).await,
            ApplyOutcome::Ignored
        );
        assert_eq!(
            r.apply(ChangeEvent::delete(json!({"id": "a"}))).await,
            ApplyOutcome::Removed(item("a", 1))
        );
        assert!(r.collection.is_empty());
    }

    #[tokio::test]
    async fn test_load_failure_leaves_collection_alone() {
        let r = reconciler(vec![], MapLoader::new(&[]));

        let outcome = r.apply(ChangeEvent::insert(json!({"id": "b"}))).await;

        assert_eq!(outcome, ApplyOutcome::LoadFailed);
        assert!(r.collection.is_empty());
    }

    #[tokio::test]
    async fn test_closed_collection_makes_apply_inactive() {
        let r = reconciler(vec![item("a", 1)], MapLoader::new(&[("b", 2)]));
        r.collection.close();

        let outcome = r.apply(ChangeEvent::insert(json!({"id": "b"}))).await;

        assert_eq!(outcome, ApplyOutcome::Inactive);
        assert_eq!(r.collection.snapshot(), vec![item("a", 1)]);
    }
}
