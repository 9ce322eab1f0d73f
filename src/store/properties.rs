//! Properties store.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{ActorSlot, FetchGate, FetchOutcome, RealtimeSlot, StoreSettings, CACHED_DATA_MESSAGE};
use crate::domain::endpoint::{
    CREATE_PROPERTY, CREATE_TENANT, DELETE_PROPERTY, DELETE_TENANT, GET_PROPERTIES, GET_PROPERTY,
    UPDATE_PROPERTY, UPDATE_TENANT,
};
use crate::domain::{
    ActorId, EntityId, NewTenant, Property, PropertyDraft, PropertyPatch, PropertyStatus, Record,
    TenantDraft,
};
use crate::error::Result;
use crate::port::{ChangeFeed, FeedTopic, Notification, NullNotifier, PropertyBackend, TenantBackend};
use crate::resilience::{CallFailure, OperationClass, ResilientClient};
use crate::sync::{
    ApplyOutcome, ChangeFeedReconciler, OptimisticController, ReconnectBackoff, RowLoader,
    SyncedCollection,
};

const TABLE: &str = "properties";

/// Cached, optimistically mutated mirror of the actor's properties.
pub struct PropertiesStore {
    client: ResilientClient,
    properties: Arc<dyn PropertyBackend>,
    tenants: Arc<dyn TenantBackend>,
    settings: StoreSettings,
    actor: ActorSlot,
    controller: OptimisticController<Property>,
    fetch: FetchGate,
    realtime: RealtimeSlot,
}

impl PropertiesStore {
    #[must_use]
    pub fn new(
        client: ResilientClient,
        properties: Arc<dyn PropertyBackend>,
        tenants: Arc<dyn TenantBackend>,
        settings: StoreSettings,
    ) -> Self {
        Self {
            controller: OptimisticController::new(
                SyncedCollection::new(),
                Arc::clone(client.clock()),
            ),
            fetch: FetchGate::new(settings.fetch_cache),
            client,
            properties,
            tenants,
            settings,
            actor: ActorSlot::default(),
            realtime: RealtimeSlot::default(),
        }
    }

    /// Set or clear the signed-in actor.
    pub fn set_actor(&self, actor: Option<ActorId>) {
        self.actor.set(actor);
    }

    /// Shared handle to the underlying collection.
    #[must_use]
    pub fn collection(&self) -> &SyncedCollection<Property> {
        self.controller.collection()
    }

    #[must_use]
    pub fn properties(&self) -> Vec<Property> {
        self.collection().snapshot()
    }

    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<Property> {
        self.collection().get(id)
    }

    /// Load every property of the actor.
    ///
    /// Without `force`, skipped while another fetch runs or while the last
    /// successful fetch is fresh and the collection holds rows.
    pub async fn fetch(&self, force: bool) -> Result<FetchOutcome> {
        let actor = self.actor.require()?;
        let Some(ticket) = self.fetch.begin(force, !self.collection().is_empty()) else {
            debug!("Skipping properties fetch");
            return Ok(FetchOutcome::Skipped);
        };

        let result = self
            .client
            .call(GET_PROPERTIES, OperationClass::Read, || {
                self.properties.list_properties(actor)
            })
            .await;

        match result {
            Ok(rows) => {
                let count = rows.len();
                self.collection()
                    .replace_all(rows.into_iter().map(Property::from).collect());
                ticket.succeeded();
                debug!(count, "Properties fetched");
                Ok(FetchOutcome::Fetched(count))
            }
            Err(failure) if failure.is_offline() && !self.collection().is_empty() => {
                self.client.notifier().notify(Notification::info(CACHED_DATA_MESSAGE));
                Ok(FetchOutcome::Stale)
            }
            Err(failure) => Err(failure.into()),
        }
    }

    /// Create a property, then its tenant when the draft is occupied.
    pub async fn add(&self, draft: PropertyDraft) -> Result<Property> {
        let actor = self.actor.require()?;

        let created = self
            .controller
            .create(
                |id| draft.to_placeholder(id),
                async {
                    self.client
                        .call(CREATE_PROPERTY, OperationClass::Write, || {
                            self.properties.create_property(actor, &draft)
                        })
                        .await
                        .map(Property::from)
                },
            )
            .await?;

        info!(id = %created.id, "Property added");
        self.client.notifier().notify(Notification::success("Property added"));

        let Some(tenant) = draft.tenant.as_ref().filter(|_| draft.needs_tenant()) else {
            return Ok(created);
        };
        let new_tenant = NewTenant {
            property_id: created.id.clone(),
            rent: draft.rent,
            draft: tenant.clone(),
        };
        match self
            .client
            .call(CREATE_TENANT, OperationClass::Write, || {
                self.tenants.create_tenant(actor, &new_tenant)
            })
            .await
        {
            Ok(_) => Ok(self.reload(actor, &created.id).await.unwrap_or(created)),
            Err(failure) => {
                warn!(id = %created.id, error = %failure.error, "Tenant creation failed after property commit");
                Ok(created)
            }
        }
    }

    /// Patch a property, then reconcile its tenant with the new status.
    pub async fn update(&self, id: &EntityId, patch: PropertyPatch) -> Result<Property> {
        let actor = self.actor.require()?;

        let updated = self
            .controller
            .update(
                id,
                |property| patch.apply(property),
                async {
                    self.client
                        .call(UPDATE_PROPERTY, OperationClass::Write, || {
                            self.properties.update_property(actor, id, &patch)
                        })
                        .await
                        .map(Property::from)
                },
            )
            .await?;

        info!(%id, "Property updated");
        self.client.notifier().notify(Notification::success("Property updated"));

        let secondary = match (patch.status, patch.tenant.as_ref()) {
            (Some(PropertyStatus::Occupied), Some(tenant)) => {
                let rent = patch.rent.unwrap_or(updated.rent);
                self.upsert_tenant(actor, id, rent, tenant).await
            }
            (Some(PropertyStatus::Vacant), _) => self.clear_tenants(actor, id).await,
            _ => return Ok(updated),
        };
        if let Err(failure) = secondary {
            warn!(%id, error = %failure.error, "Tenant update failed after property commit");
        }

        Ok(self.reload(actor, id).await.unwrap_or(updated))
    }

    /// Delete a property.
    pub async fn remove(&self, id: &EntityId) -> Result<Property> {
        let actor = self.actor.require()?;

        let removed = self
            .controller
            .delete(id, async {
                self.client
                    .call(DELETE_PROPERTY, OperationClass::Write, || {
                        self.properties.delete_property(actor, id)
                    })
                    .await
            })
            .await?;

        info!(%id, "Property deleted");
        self.client.notifier().notify(Notification::success("Property deleted"));
        Ok(removed)
    }

    /// Subscribe to pushed changes of the actor's properties.
    ///
    /// No-op while a subscription is already running.
    pub fn start_realtime(&self, feed: Arc<dyn ChangeFeed>) -> Result<()> {
        let actor = self.actor.require()?;
        if self.realtime.is_running() {
            return Ok(());
        }

        let loader = Arc::new(PropertyLoader {
            client: self.client.clone().with_notifier(Arc::new(NullNotifier)),
            backend: Arc::clone(&self.properties),
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
                    ApplyOutcome::Inserted(p) => format!("New property: {}", p.label()),
                    ApplyOutcome::Replaced(p) => format!("Property updated: {}", p.label()),
                    ApplyOutcome::Removed(p) => format!("Property removed: {}", p.label()),
                    _ => return,
                };
                notifier.notify(Notification::info(message));
            },
        );
        self.realtime.install(handle);
        info!(actor = %actor, "Properties realtime started");
        Ok(())
    }

    /// Close the realtime subscription, if any.
    pub fn stop_realtime(&self) {
        if self.realtime.stop() {
            info!("Properties realtime stopped");
        }
    }

    /// Stop realtime and close the collection. Later writes are ignored.
    pub fn teardown(&self) {
        self.stop_realtime();
        self.collection().close();
    }

    async fn upsert_tenant(
        &self,
        actor: ActorId,
        id: &EntityId,
        rent: rust_decimal::Decimal,
        tenant: &TenantDraft,
    ) -> std::result::Result<(), CallFailure> {
        let row = self
            .client
            .call(GET_PROPERTY, OperationClass::Read, || {
                self.properties.get_property(actor, id)
            })
            .await?;

        match row.tenants.first() {
            Some(existing) => {
                self.client
                    .call(UPDATE_TENANT, OperationClass::Write, || {
                        self.tenants.update_tenant(actor, &existing.id, tenant)
                    })
                    .await?;
            }
            None => {
                let new_tenant = NewTenant {
                    property_id: id.clone(),
                    rent,
                    draft: tenant.clone(),
                };
                self.client
                    .call(CREATE_TENANT, OperationClass::Write, || {
                        self.tenants.create_tenant(actor, &new_tenant)
                    })
                    .await?;
            }
        }
        Ok(())
    }

    async fn clear_tenants(
        &self,
        actor: ActorId,
        id: &EntityId,
    ) -> std::result::Result<(), CallFailure> {
        let row = self
            .client
            .call(GET_PROPERTY, OperationClass::Read, || {
                self.properties.get_property(actor, id)
            })
            .await?;

        for tenant in &row.tenants {
            self.client
                .call(DELETE_TENANT, OperationClass::Write, || {
                    self.tenants.delete_tenant(actor, &tenant.id)
                })
                .await?;
        }
        Ok(())
    }

    /// Refresh one entry from the backend after secondary writes.
    async fn reload(&self, actor: ActorId, id: &EntityId) -> Option<Property> {
        let row = self
            .client
            .call(GET_PROPERTY, OperationClass::Read, || {
                self.properties.get_property(actor, id)
            })
            .await
            .ok()?;
        let property = Property::from(row);
        self.collection().replace(id, property.clone());
        Some(property)
    }
}

struct PropertyLoader {
    client: ResilientClient,
    backend: Arc<dyn PropertyBackend>,
    actor: ActorId,
}

#[async_trait]
impl RowLoader<Property> for PropertyLoader {
    async fn load(&self, id: &EntityId) -> Result<Property> {
        let row = self
            .client
            .call(GET_PROPERTY, OperationClass::Read, || {
                self.backend.get_property(self.actor, id)
            })
            .await?;
        Ok(Property::from(row))
    }
}
