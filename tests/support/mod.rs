//! Shared wiring for integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rentsync::adapter::memory::InMemoryBackend;
use rentsync::domain::ActorId;
use rentsync::port::ChangeFeed;
use rentsync::resilience::{
    BreakerPolicy, CircuitBreakerRegistry, ClientSettings, Connectivity, LatencyRegistry,
    ResilientClient, RetryPolicy,
};
use rentsync::store::{PaymentsStore, PropertiesStore, StoreSettings};
use rentsync::sync::BackoffPolicy;
use rentsync::testkit::clock::ManualClock;
use rentsync::testkit::domain;
use rentsync::testkit::notifier::RecordingNotifier;
use rentsync::testkit::telemetry::RecordingTelemetry;

/// Retries in single milliseconds; default timeouts.
pub fn fast_settings() -> ClientSettings {
    ClientSettings {
        retry: RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2)),
        ..ClientSettings::default()
    }
}

pub fn fast_store_settings() -> StoreSettings {
    StoreSettings {
        realtime: BackoffPolicy {
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            multiplier: 2.0,
            jitter: 0.0,
        },
        ..StoreSettings::default()
    }
}

/// One backend, one client, recording sinks and a manual breaker clock.
pub struct Harness {
    pub backend: Arc<InMemoryBackend>,
    pub client: ResilientClient,
    pub notifier: Arc<RecordingNotifier>,
    pub telemetry: Arc<RecordingTelemetry>,
    pub clock: ManualClock,
    pub actor: ActorId,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(fast_settings())
    }

    pub fn with_settings(settings: ClientSettings) -> Self {
        let clock = ManualClock::default();
        let notifier = Arc::new(RecordingNotifier::new());
        let telemetry = Arc::new(RecordingTelemetry::new());
        let breakers = Arc::new(CircuitBreakerRegistry::with_clock(
            BreakerPolicy::default(),
            Arc::new(clock.clone()),
        ));
        let client = ResilientClient::new(
            settings,
            breakers,
            Arc::new(LatencyRegistry::default()),
            Connectivity::default(),
        )
        .with_notifier(notifier.clone())
        .with_telemetry(telemetry.clone())
        .with_clock(Arc::new(clock.clone()));

        Self {
            backend: Arc::new(InMemoryBackend::new()),
            client,
            notifier,
            telemetry,
            clock,
            actor: domain::actor(),
        }
    }

    pub fn feed(&self) -> Arc<dyn ChangeFeed> {
        self.backend.clone()
    }

    /// Properties store signed in as the harness actor.
    pub fn properties(&self) -> PropertiesStore {
        let store = PropertiesStore::new(
            self.client.clone(),
            self.backend.clone(),
            self.backend.clone(),
            fast_store_settings(),
        );
        store.set_actor(Some(self.actor));
        store
    }

    /// Payments store signed in as the harness actor, resolving tenants
    /// from `properties`.
    pub fn payments(&self, properties: &PropertiesStore) -> PaymentsStore {
        let store = PaymentsStore::new(self.client.clone(), self.backend.clone(), fast_store_settings())
            .with_properties(properties.collection().clone());
        store.set_actor(Some(self.actor));
        store
    }

    pub async fn subscribed(&self, table: &str) {
        assert!(
            self.backend
                .wait_for_subscribers(table, 1, Duration::from_secs(2))
                .await,
            "no subscriber on {table}"
        );
    }
}

/// Poll `check` every millisecond until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..2000 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    false
}
