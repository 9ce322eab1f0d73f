//! Composition root: builds the resilient client and stores from [`Config`].

use std::sync::Arc;

use tracing::{debug, info};

use crate::adapter::memory::InMemoryBackend;
use crate::adapter::notifier::LogNotifier;
use crate::adapter::telemetry::DiagnosticLog;
use crate::domain::ActorId;
use crate::infrastructure::config::Config;
use crate::port::{Notifier, NotifierRegistry, PaymentBackend, PropertyBackend, TenantBackend};
use crate::resilience::{CircuitBreakerRegistry, Connectivity, LatencyRegistry, ResilientClient};
use crate::store::{PaymentsStore, PropertiesStore};

/// Breaker registry with the configured defaults and per-endpoint overrides.
#[must_use]
pub fn build_breakers(config: &Config) -> CircuitBreakerRegistry {
    let registry = CircuitBreakerRegistry::new(config.circuit_breaker.policy());
    for (endpoint, policy) in config.circuit_breaker.overrides() {
        debug!(endpoint, threshold = policy.failure_threshold, "Breaker override");
        registry.configure(endpoint, policy);
    }
    registry
}

/// Notifier registry with the log notifier.
#[must_use]
pub fn build_notifier_registry() -> NotifierRegistry {
    let mut registry = NotifierRegistry::new();
    registry.register(Box::new(LogNotifier));
    registry
}

/// Resilient client wired to fresh registries.
#[must_use]
pub fn build_client(
    config: &Config,
    notifier: Arc<dyn Notifier>,
    telemetry: Arc<DiagnosticLog>,
) -> ResilientClient {
    ResilientClient::new(
        config.client_settings(),
        Arc::new(build_breakers(config)),
        Arc::new(LatencyRegistry::new(config.latency.window)),
        Connectivity::default(),
    )
    .with_notifier(notifier)
    .with_telemetry(telemetry)
}

/// Both stores over one set of backends, sharing one client.
///
/// The payments store resolves tenants from the properties collection.
#[must_use]
pub fn build_stores(
    config: &Config,
    client: &ResilientClient,
    properties: Arc<dyn PropertyBackend>,
    tenants: Arc<dyn TenantBackend>,
    payments: Arc<dyn PaymentBackend>,
) -> (PropertiesStore, PaymentsStore) {
    let settings = config.store_settings();
    let property_store = PropertiesStore::new(client.clone(), properties, tenants, settings);
    let payment_store = PaymentsStore::new(client.clone(), payments, settings)
        .with_properties(property_store.collection().clone());
    (property_store, payment_store)
}

/// A fully wired session against the in-memory backend.
pub struct Runtime {
    pub backend: Arc<InMemoryBackend>,
    pub client: ResilientClient,
    pub diagnostics: Arc<DiagnosticLog>,
    pub properties: PropertiesStore,
    pub payments: PaymentsStore,
}

impl Runtime {
    /// Wire every component and sign `actor` in on both stores.
    #[must_use]
    pub fn in_memory(config: &Config, actor: ActorId) -> Self {
        let backend = Arc::new(InMemoryBackend::new());
        let diagnostics = Arc::new(DiagnosticLog::default());
        let client = build_client(
            config,
            Arc::new(build_notifier_registry()),
            Arc::clone(&diagnostics),
        );
        let (properties, payments) = build_stores(
            config,
            &client,
            backend.clone(),
            backend.clone(),
            backend.clone(),
        );
        properties.set_actor(Some(actor));
        payments.set_actor(Some(actor));
        info!(actor = %actor, "In-memory runtime ready");

        Self {
            backend,
            client,
            diagnostics,
            properties,
            payments,
        }
    }

    /// Stop realtime on both stores and close their collections.
    pub fn teardown(&self) {
        self.properties.teardown();
        self.payments.teardown();
    }
}
