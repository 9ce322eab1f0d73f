//! Optimistic mutations through a store, against the in-memory backend.

mod support;

use std::time::Duration;

use rentsync::adapter::memory::Fault;
use rentsync::domain::endpoint::{CREATE_PROPERTY, DELETE_PROPERTY, UPDATE_PROPERTY};
use rentsync::domain::{EntityId, PropertyPatch};
use rentsync::error::Error;
use rentsync::resilience::FailureKind;
use rentsync::testkit::domain;
use rust_decimal::Decimal;
use support::{eventually, Harness};

fn names(store: &rentsync::store::PropertiesStore) -> Vec<String> {
    store.properties().into_iter().map(|p| p.name).collect()
}

#[tokio::test]
async fn test_failed_create_leaves_collection_as_before() {
    let h = Harness::new();
    h.backend.seed_property(h.actor, &domain::property_draft("A"));
    let store = h.properties();
    store.fetch(true).await.unwrap();
    h.backend
        .inject(CREATE_PROPERTY, Fault::Rejected("Invalid input".into()));

    let err = store.add(domain::property_draft("B")).await.unwrap_err();

    assert_eq!(err.call_failure().map(|f| f.kind), Some(FailureKind::Rejected));
    assert_eq!(names(&store), vec!["A"]);
}

#[tokio::test]
async fn test_create_shows_placeholder_then_server_row_at_front() {
    let h = Harness::new();
    h.backend.seed_property(h.actor, &domain::property_draft("A"));
    let store = h.properties();
    store.fetch(true).await.unwrap();
    h.backend
        .inject(CREATE_PROPERTY, Fault::Delay(Duration::from_millis(50)));
    let collection = store.collection().clone();

    let (created, saw_placeholder) = tokio::join!(store.add(domain::property_draft("B")), async {
        eventually(|| {
            let front = collection.snapshot().first().cloned();
            async move { front.is_some_and(|p| p.id.is_temporary() && p.name == "B") }
        })
        .await
    });

    let created = created.unwrap();
    assert!(saw_placeholder);
    assert!(!created.id.is_temporary());
    assert_eq!(names(&store), vec!["B", "A"]);
    assert_eq!(store.properties()[0].id, created.id);
}

#[tokio::test]
async fn test_failed_update_restores_the_entry() {
    let h = Harness::new();
    let row = h.backend.seed_property(h.actor, &domain::property_draft("A"));
    let store = h.properties();
    store.fetch(true).await.unwrap();
    let before = store.get(&row.id).unwrap();
    h.backend
        .inject(UPDATE_PROPERTY, Fault::Rejected("Invalid input".into()));

    let patch = PropertyPatch {
        name: Some("Renamed".into()),
        ..PropertyPatch::default()
    };
    let err = store.update(&row.id, patch).await.unwrap_err();

    assert!(matches!(err, Error::Call(_)));
    assert_eq!(store.get(&row.id), Some(before));
}

#[tokio::test]
async fn test_update_is_visible_before_commit() {
    let h = Harness::new();
    let row = h.backend.seed_property(h.actor, &domain::property_draft("A"));
    let store = h.properties();
    store.fetch(true).await.unwrap();
    h.backend
        .inject(UPDATE_PROPERTY, Fault::Delay(Duration::from_millis(50)));
    let collection = store.collection().clone();

    let patch = PropertyPatch {
        rent: Some(Decimal::from(1200)),
        ..PropertyPatch::default()
    };
    let (updated, saw_patch) = tokio::join!(store.update(&row.id, patch), async {
        eventually(|| {
            let rent = collection.get(&row.id).map(|p| p.rent);
            async move { rent == Some(Decimal::from(1200)) }
        })
        .await
    });

    assert!(saw_patch);
    assert_eq!(updated.unwrap().rent, Decimal::from(1200));
}

#[tokio::test]
async fn test_failed_delete_restores_order() {
    let h = Harness::new();
    let a = h.backend.seed_property(h.actor, &domain::property_draft("A"));
    h.backend.seed_property(h.actor, &domain::property_draft("B"));
    let store = h.properties();
    store.fetch(true).await.unwrap();
    assert_eq!(names(&store), vec!["B", "A"]);
    h.backend.inject_times(DELETE_PROPERTY, Fault::Network, 3);

    let err = store.remove(&a.id).await.unwrap_err();

    assert_eq!(err.call_failure().map(|f| f.kind), Some(FailureKind::Network));
    assert_eq!(names(&store), vec!["B", "A"]);
    h.client.connectivity().set_online(true);

    store.remove(&a.id).await.unwrap();
    assert_eq!(names(&store), vec!["B"]);
}

#[tokio::test]
async fn test_unknown_id_is_not_found() {
    let h = Harness::new();
    let store = h.properties();
    let missing = EntityId::from("missing");

    let update = store.update(&missing, PropertyPatch::default()).await;
    let remove = store.remove(&missing).await;

    assert!(matches!(update, Err(Error::NotFound { kind: "property", .. })));
    assert!(matches!(remove, Err(Error::NotFound { kind: "property", .. })));
    assert_eq!(h.backend.calls(UPDATE_PROPERTY), 0);
    assert_eq!(h.backend.calls(DELETE_PROPERTY), 0);
}

#[tokio::test]
async fn test_mutations_after_teardown_are_inactive() {
    let h = Harness::new();
    let row = h.backend.seed_property(h.actor, &domain::property_draft("A"));
    let store = h.properties();
    store.fetch(true).await.unwrap();

    store.teardown();

    assert!(matches!(
        store.add(domain::property_draft("B")).await,
        Err(Error::Inactive)
    ));
    assert!(matches!(store.remove(&row.id).await, Err(Error::Inactive)));
    assert_eq!(h.backend.calls(CREATE_PROPERTY), 0);
    assert_eq!(names(&store), vec!["A"]);
}

#[tokio::test]
async fn test_late_completion_after_teardown_leaves_collection_alone() {
    let h = Harness::new();
    h.backend.seed_property(h.actor, &domain::property_draft("A"));
    let store = h.properties();
    store.fetch(true).await.unwrap();
    h.backend
        .inject(CREATE_PROPERTY, Fault::Delay(Duration::from_millis(30)));
    let collection = store.collection().clone();

    let (created, ()) = tokio::join!(store.add(domain::property_draft("B")), async {
        eventually(|| {
            let len = collection.len();
            async move { len == 2 }
        })
        .await;
        store.teardown();
    });

    let created = created.unwrap();
    assert!(!store.collection().contains(&created.id));
    assert_eq!(store.collection().len(), 2);
}

#[tokio::test]
async fn test_overlapping_creates_keep_the_committed_row() {
    let h = Harness::new();
    h.backend.seed_property(h.actor, &domain::property_draft("A"));
    let store = h.properties();
    store.fetch(true).await.unwrap();
    // First add exhausts its retries while the second is still in flight
    h.backend.inject(CREATE_PROPERTY, Fault::Network);
    h.backend
        .inject(CREATE_PROPERTY, Fault::Delay(Duration::from_millis(50)));
    h.backend.inject_times(CREATE_PROPERTY, Fault::Network, 2);

    let (failed, created) = tokio::join!(
        store.add(domain::property_draft("B")),
        store.add(domain::property_draft("C")),
    );

    assert!(failed.is_err());
    let created = created.unwrap();
    assert_eq!(names(&store), vec!["C", "A"]);
    assert!(store.collection().contains(&created.id));
}

#[tokio::test]
async fn test_failed_delete_keeps_a_concurrent_create() {
    let h = Harness::new();
    let a = h.backend.seed_property(h.actor, &domain::property_draft("A"));
    h.backend.seed_property(h.actor, &domain::property_draft("B"));
    let store = h.properties();
    store.fetch(true).await.unwrap();
    h.backend.inject_times(DELETE_PROPERTY, Fault::Network, 3);

    let (removed, created) = tokio::join!(
        store.remove(&a.id),
        store.add(domain::property_draft("C")),
    );

    assert!(removed.is_err());
    assert!(created.is_ok());
    assert_eq!(names(&store), vec!["C", "B", "A"]);
}

#[tokio::test]
async fn test_create_survives_a_refresh_while_in_flight() {
    let h = Harness::new();
    h.backend.seed_property(h.actor, &domain::property_draft("A"));
    let store = h.properties();
    store.fetch(true).await.unwrap();
    h.backend
        .inject(CREATE_PROPERTY, Fault::Delay(Duration::from_millis(30)));
    let collection = store.collection().clone();

    let (created, refreshed) = tokio::join!(store.add(domain::property_draft("B")), async {
        eventually(|| {
            let len = collection.len();
            async move { len == 2 }
        })
        .await;
        // The backend does not hold the new row yet
        store.fetch(true).await
    });

    refreshed.unwrap();
    let created = created.unwrap();
    assert_eq!(names(&store), vec!["B", "A"]);
    assert_eq!(store.properties()[0].id, created.id);
}
