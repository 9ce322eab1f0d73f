//! Payments store.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{ActorSlot, FetchGate, FetchOutcome, RealtimeSlot, StoreSettings, CACHED_DATA_MESSAGE};
use crate::domain::endpoint::{
    CREATE_PAYMENT, DELETE_PAYMENT, GET_PAYMENT, GET_PAYMENTS, UPDATE_PAYMENT,
};
use crate::domain::{
    ActorId, EntityId, NewPayment, Payment, PaymentDraft, PaymentPatch, Property,
};
use crate::error::Result;
use crate::port::{ChangeFeed, FeedTopic, Notification, NullNotifier, PaymentBackend};
use crate::resilience::{OperationClass, ResilientClient};
use crate::sync::{
    ApplyOutcome, ChangeFeedReconciler, OptimisticController, ReconnectBackoff, RowLoader,
    SyncedCollection,
};

const TABLE: &str = "payments";

/// Cached, optimistically mutated mirror of the actor's payments.
pub struct PaymentsStore {
    client: ResilientClient,
    backend: Arc<dyn PaymentBackend>,
    /// Used to resolve the tenant of a new payment.
    properties: Option<SyncedCollection<Property>>,
    settings: StoreSettings,
    actor: ActorSlot,
    controller: OptimisticController<Payment>,
    fetch: FetchGate,
    realtime: RealtimeSlot,
}

impl PaymentsStore {
    #[must_use]
    pub fn new(
        client: ResilientClient,
        backend: Arc<dyn PaymentBackend>,
        settings: StoreSettings,
    ) -> Self {
        Self {
            controller: OptimisticController::new(
                SyncedCollection::new(),
                Arc::clone(client.clock()),
            ),
            fetch: FetchGate::new(settings.fetch_cache),
            client,
            backend,
            properties: None,
            settings,
            actor: ActorSlot::default(),
            realtime: RealtimeSlot::default(),
        }
    }

    /// Resolve tenants of new payments from this properties collection.
    #[must_use]
    pub fn with_properties(mut self, properties: SyncedCollection<Property>) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn set_actor(&self, actor: Option<ActorId>) {
        self.actor.set(actor);
    }

    #[must_use]
    pub fn collection(&self) -> &SyncedCollection<Payment> {
        self.controller.collection()
    }

    #[must_use]
    pub fn payments(&self) -> Vec<Payment> {
        self.collection().snapshot()
    }

    pub async fn fetch(&self, force: bool) -> Result<FetchOutcome> {
        let actor = self.actor.require()?;
        let Some(ticket) = self.fetch.begin(force, !self.collection().is_empty()) else {
            debug!("Skipping payments fetch");
            return Ok(FetchOutcome::Skipped);
        };

        let result = self
            .client
            .call(GET_PAYMENTS, OperationClass::Read, || {
                self.backend.list_payments(actor)
            })
            .await;

        match result {
            Ok(rows) => {
                let count = rows.len();
                self.collection()
                    .replace_all(rows.into_iter().map(Payment::from).collect());
                ticket.succeeded();
                debug!(count, "Payments fetched");
                Ok(FetchOutcome::Fetched(count))
            }
            Err(failure) if failure.is_offline() && !self.collection().is_empty() => {
                self.client.notifier().notify(Notification::info(CACHED_DATA_MESSAGE));
                Ok(FetchOutcome::Stale)
            }
            Err(failure) => Err(failure.into()),
        }
    }

    pub async fn add(&self, draft: PaymentDraft) -> Result<Payment> {
        let actor = self.actor.require()?;
        let payment = NewPayment {
            tenant_id: self.tenant_of(draft.property_id.as_ref()),
            draft,
        };

        let created = self
            .controller
            .create(
                |id| payment.draft.to_placeholder(id),
                async {
                    self.client
                        .call(CREATE_PAYMENT, OperationClass::Write, || {
                            self.backend.create_payment(actor, &payment)
                        })
                        .await
                        .map(Payment::from)
                },
            )
            .await?;

        info!(id = %created.id, "Payment added");
        self.client.notifier().notify(Notification::success("Payment added"));
        Ok(created)
    }

    pub async fn update(&self, id: &EntityId, patch: PaymentPatch) -> Result<Payment> {
        let actor = self.actor.require()?;

        let updated = self
            .controller
            .update(
                id,
                |payment| patch.apply(payment),
                async {
                    self.client
                        .call(UPDATE_PAYMENT, OperationClass::Write, || {
                            self.backend.update_payment(actor, id, &patch)
                        })
                        .await
                        .map(Payment::from)
                },
            )
            .await?;

        info!(%id, "Payment updated");
        self.client.notifier().notify(Notification::success("Payment updated"));
        Ok(updated)
    }

    pub async fn remove(&self, id: &EntityId) -> Result<Payment> {
        let actor = self.actor.require()?;

        let removed = self
            .controller
            .delete(id, async {
                self.client
                    .call(DELETE_PAYMENT, OperationClass::Write, || {
                        self.backend.delete_payment(actor, id)
                    })
                    .await
            })
            .await?;

        info!(%id, "Payment deleted");
        self.client.notifier().notify(Notification::success("Payment deleted"));
        Ok(removed)
    }

    pub fn start_realtime(&self, feed: Arc<dyn ChangeFeed>) -> Result<()> {
        let actor = self.actor.require()?;
        if self.realtime.is_running() {
            return Ok(());
        }

        let loader = Arc::new(PaymentLoader {
            client: self.client.clone().with_notifier(Arc::new(NullNotifier)),
            backend: Arc::clone(&self.backend),
            actor,
        });
        let notifier = Arc::clone(self.client.notifier());
        let reconciler = ChangeFeedReconciler::new(self.collection().clone(), loader)
            .with_connectivity(self.client.connectivity().clone());

        let handle = reconciler.spawn(
            feed,
            FeedTopic::new(TABLE, actor),
            ReconnectBackoff::new(self.settings.realtime),
            move |outcome| {
                let message = match outcome {
                    ApplyOutcome::Inserted(p) => format!("New payment: {}", p.amount),
                    ApplyOutcome::Replaced(_) => "Payment updated".to_string(),
                    ApplyOutcome::Removed(_) => "Payment removed".to_string(),
                    _ => return,
                };
                notifier.notify(Notification::info(message));
            },
        );
        self.realtime.install(handle);
        info!(actor = %actor, "Payments realtime started");
        Ok(())
    }

    pub fn stop_realtime(&self) {
        if self.realtime.stop() {
            info!("Payments realtime stopped");
        }
    }

    pub fn teardown(&self) {
        self.stop_realtime();
        self.collection().close();
    }

    fn tenant_of(&self, property_id: Option<&EntityId>) -> Option<EntityId> {
        let property = self.properties.as_ref()?.get(property_id?)?;
        property.tenant.map(|tenant| tenant.id)
    }
}

struct PaymentLoader {
    client: ResilientClient,
    backend: Arc<dyn PaymentBackend>,
    actor: ActorId,
}

#[async_trait]
impl RowLoader<Payment> for PaymentLoader {
    async fn load(&self, id: &EntityId) -> Result<Payment> {
        let row = self
            .client
            .call(GET_PAYMENT, OperationClass::Read, || {
                self.backend.get_payment(self.actor, id)
            })
            .await?;
        Ok(Payment::from(row))
    }
}
