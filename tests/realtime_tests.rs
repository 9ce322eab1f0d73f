//! Pushed changes merged into store collections.

mod support;

use std::time::Duration;

use rentsync::adapter::memory::Fault;
use rentsync::domain::{ChangeEvent, ChannelStatus, PropertyPatch};
use rentsync::port::{NotificationLevel, PropertyBackend};
use rentsync::testkit::domain;
use serde_json::json;
use support::{eventually, Harness};

const SUBSCRIBE: &str = "subscribe:properties";

async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

#[tokio::test]
async fn test_external_insert_appears_at_front() {
    let h = Harness::new();
    h.backend.seed_property(h.actor, &domain::property_draft("A"));
    let store = h.properties();
    store.fetch(true).await.unwrap();
    store.start_realtime(h.feed()).unwrap();
    h.subscribed("properties").await;

    let row = h
        .backend
        .insert_external_property(h.actor, &domain::property_draft("Annex"));

    assert!(eventually(|| {
        let front = store.properties().first().map(|p| p.id.clone());
        let id = row.id.clone();
        async move { front == Some(id) }
    })
    .await);
    assert_eq!(store.properties().len(), 2);
    assert!(h
        .notifier
        .messages(NotificationLevel::Info)
        .contains(&"New property: Annex".to_string()));
    store.teardown();
}

#[tokio::test]
async fn test_duplicate_insert_is_ignored() {
    let h = Harness::new();
    let a = h.backend.seed_property(h.actor, &domain::property_draft("A"));
    let store = h.properties();
    store.fetch(true).await.unwrap();
    store.start_realtime(h.feed()).unwrap();
    h.subscribed("properties").await;

    h.backend
        .emit("properties", h.actor, ChangeEvent::insert(json!({ "id": a.id })));
    h.backend
        .insert_external_property(h.actor, &domain::property_draft("C"));

    assert!(eventually(|| {
        let len = store.properties().len();
        async move { len == 2 }
    })
    .await);
    let names: Vec<_> = store.properties().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["C", "A"]);
    assert_eq!(
        h.notifier.messages(NotificationLevel::Info),
        vec!["New property: C".to_string()]
    );
    store.teardown();
}

#[tokio::test]
async fn test_external_update_and_delete_are_applied() {
    let h = Harness::new();
    let a = h.backend.seed_property(h.actor, &domain::property_draft("A"));
    let store = h.properties();
    store.fetch(true).await.unwrap();
    store.start_realtime(h.feed()).unwrap();
    h.subscribed("properties").await;

    let patch = PropertyPatch {
        name: Some("A prime".into()),
        ..PropertyPatch::default()
    };
    h.backend.update_property(h.actor, &a.id, &patch).await.unwrap();
    assert!(eventually(|| {
        let name = store.get(&a.id).map(|p| p.name);
        async move { name.as_deref() == Some("A prime") }
    })
    .await);

    h.backend.delete_property(h.actor, &a.id).await.unwrap();
    assert!(eventually(|| {
        let empty = store.properties().is_empty();
        async move { empty }
    })
    .await);

    let info = h.notifier.messages(NotificationLevel::Info);
    assert!(info.contains(&"Property updated: A prime".to_string()));
    assert!(info.contains(&"Property removed: A prime".to_string()));
    store.teardown();
}

#[tokio::test]
async fn test_own_create_is_not_duplicated_by_its_echo() {
    let h = Harness::new();
    let store = h.properties();
    store.start_realtime(h.feed()).unwrap();
    h.subscribed("properties").await;

    let created = store.add(domain::property_draft("B")).await.unwrap();
    settle().await;

    let ids: Vec<_> = store.properties().into_iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![created.id]);
    store.teardown();
}

#[tokio::test]
async fn test_channel_error_resubscribes() {
    let h = Harness::new();
    let store = h.properties();
    store.start_realtime(h.feed()).unwrap();
    h.subscribed("properties").await;

    h.backend.emit_status("properties", ChannelStatus::ChannelError);
    assert_eq!(h.backend.subscriber_count("properties"), 0);
    h.subscribed("properties").await;
    assert_eq!(h.backend.calls(SUBSCRIBE), 2);

    h.backend
        .insert_external_property(h.actor, &domain::property_draft("After"));
    assert!(eventually(|| {
        let len = store.properties().len();
        async move { len == 1 }
    })
    .await);
    store.teardown();
}

#[tokio::test]
async fn test_confirmed_subscription_restores_connectivity() {
    let h = Harness::new();
    h.client.connectivity().set_online(false);
    let store = h.properties();

    store.start_realtime(h.feed()).unwrap();
    h.subscribed("properties").await;
    assert!(eventually(|| {
        let online = h.client.connectivity().is_online();
        async move { online }
    })
    .await);

    // Row loads go through the client again
    h.backend
        .insert_external_property(h.actor, &domain::property_draft("Annex"));
    assert!(eventually(|| {
        let len = store.properties().len();
        async move { len == 1 }
    })
    .await);
    store.teardown();
}

#[tokio::test]
async fn test_failed_subscribe_is_retried() {
    let h = Harness::new();
    h.backend.inject_times(SUBSCRIBE, Fault::Network, 2);
    let store = h.properties();

    store.start_realtime(h.feed()).unwrap();
    h.subscribed("properties").await;

    assert_eq!(h.backend.calls(SUBSCRIBE), 3);
    store.teardown();
}

#[tokio::test]
async fn test_closed_channel_ends_subscription() {
    let h = Harness::new();
    let store = h.properties();
    store.start_realtime(h.feed()).unwrap();
    h.subscribed("properties").await;

    h.backend.emit_status("properties", ChannelStatus::Closed);
    settle().await;

    assert_eq!(h.backend.subscriber_count("properties"), 0);
    assert_eq!(h.backend.calls(SUBSCRIBE), 1);

    // A stopped loop can be started again.
    store.start_realtime(h.feed()).unwrap();
    h.subscribed("properties").await;
    store.teardown();
}

#[tokio::test]
async fn test_stop_realtime_detaches() {
    let h = Harness::new();
    let store = h.properties();
    store.start_realtime(h.feed()).unwrap();
    h.subscribed("properties").await;

    store.stop_realtime();
    assert!(eventually(|| {
        let count = h.backend.subscriber_count("properties");
        async move { count == 0 }
    })
    .await);

    h.backend
        .insert_external_property(h.actor, &domain::property_draft("Ignored"));
    settle().await;
    assert!(store.properties().is_empty());
}

#[tokio::test]
async fn test_start_realtime_twice_keeps_one_subscription() {
    let h = Harness::new();
    let store = h.properties();

    store.start_realtime(h.feed()).unwrap();
    store.start_realtime(h.feed()).unwrap();
    h.subscribed("properties").await;
    settle().await;

    assert_eq!(h.backend.subscriber_count("properties"), 1);
    store.teardown();
}

#[tokio::test]
async fn test_payment_insert_notifies_amount() {
    let h = Harness::new();
    let properties = h.properties();
    let payments = h.payments(&properties);
    payments.start_realtime(h.feed()).unwrap();
    h.subscribed("payments").await;

    let other = h.payments(&properties);
    other.add(domain::payment_draft(None, 750)).await.unwrap();

    assert!(eventually(|| {
        let len = payments.payments().len();
        async move { len == 1 }
    })
    .await);
    assert!(h
        .notifier
        .messages(NotificationLevel::Info)
        .contains(&"New payment: 750".to_string()));
    payments.teardown();
}

#[tokio::test]
async fn test_realtime_requires_actor() {
    let h = Harness::new();
    let store = h.properties();
    store.set_actor(None);

    assert!(matches!(
        store.start_realtime(h.feed()),
        Err(rentsync::error::Error::Unauthenticated)
    ));
}
