//! In-memory backend.
//!
//! Implements every record backend and the change feed over plain vectors,
//! with the row ownership, constraint errors and change events of the hosted
//! backend. Faults can be scripted per endpoint to exercise the resilience
//! layer.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::endpoint::{
    CREATE_PAYMENT, CREATE_PROPERTY, CREATE_TENANT, DELETE_PAYMENT, DELETE_PROPERTY,
    DELETE_TENANT, GET_PAYMENT, GET_PAYMENTS, GET_PROPERTIES, GET_PROPERTY, UPDATE_PAYMENT,
    UPDATE_PROPERTY, UPDATE_TENANT,
};
use crate::domain::{
    ActorId, ChangeEvent, ChannelStatus, EntityId, NewPayment, NewTenant, PaymentPatch,
    PaymentRow, PropertyDraft, PropertyPatch, PropertyRow, Tenant, TenantDraft,
};
use crate::error::RemoteError;
use crate::port::{
    ChangeFeed, FeedMessage, FeedSubscription, FeedTopic, PaymentBackend, PropertyBackend,
    RemoteResult, TenantBackend,
};

const FEED_BUFFER: usize = 64;

/// A scripted fault, consumed by the next call to its endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Transport failure (retryable).
    Network,
    /// Backend error with the given raw message (terminal).
    Rejected(String),
    /// Answer normally after a delay.
    Delay(Duration),
}

#[derive(Default)]
struct Tables {
    properties: Vec<(ActorId, PropertyRow)>,
    tenants: Vec<(ActorId, Tenant)>,
    payments: Vec<(ActorId, PaymentRow)>,
}

impl Tables {
    fn property(&self, actor: ActorId, id: &EntityId) -> Option<PropertyRow> {
        self.properties
            .iter()
            .find(|(owner, row)| *owner == actor && &row.id == id)
            .map(|(_, row)| self.with_tenants(row.clone()))
    }

    fn with_tenants(&self, mut row: PropertyRow) -> PropertyRow {
        row.tenants = self
            .tenants
            .iter()
            .filter(|(_, tenant)| tenant.property_id == row.id)
            .map(|(_, tenant)| tenant.clone())
            .collect();
        row
    }

    fn with_names(&self, mut row: PaymentRow) -> PaymentRow {
        row.property_name = row.property_id.as_ref().and_then(|id| {
            self.properties
                .iter()
                .find(|(_, p)| &p.id == id)
                .map(|(_, p)| p.name.clone())
        });
        row.tenant_name = row.tenant_id.as_ref().and_then(|id| {
            self.tenants
                .iter()
                .find(|(_, t)| &t.id == id)
                .map(|(_, t)| t.name.clone())
        });
        row
    }

    fn payment(&self, actor: ActorId, id: &EntityId) -> Option<PaymentRow> {
        self.payments
            .iter()
            .find(|(owner, row)| *owner == actor && &row.id == id)
            .map(|(_, row)| self.with_names(row.clone()))
    }
}

struct Subscriber {
    table: &'static str,
    actor: ActorId,
    tx: mpsc::Sender<FeedMessage>,
}

/// Backend and change feed held in process memory.
#[derive(Default)]
pub struct InMemoryBackend {
    tables: Mutex<Tables>,
    faults: Mutex<HashMap<String, VecDeque<Fault>>>,
    calls: Mutex<HashMap<String, u64>>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `fault` for the next call to `endpoint`.
    ///
    /// Subscriptions use the endpoint `subscribe:<table>`.
    pub fn inject(&self, endpoint: &str, fault: Fault) {
        self.inject_times(endpoint, fault, 1);
    }

    /// Queue `fault` for the next `times` calls to `endpoint`.
    pub fn inject_times(&self, endpoint: &str, fault: Fault, times: usize) {
        let mut faults = self.faults.lock();
        let queue = faults.entry(endpoint.to_string()).or_default();
        queue.extend(std::iter::repeat(fault).take(times));
    }

    /// Drop every pending fault.
    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Calls made to `endpoint`, faulted ones included.
    #[must_use]
    pub fn calls(&self, endpoint: &str) -> u64 {
        self.calls.lock().get(endpoint).copied().unwrap_or(0)
    }

    /// Insert a property without emitting a change event.
    pub fn seed_property(&self, actor: ActorId, draft: &PropertyDraft) -> PropertyRow {
        let row = new_property_row(draft);
        self.tables.lock().properties.insert(0, (actor, row.clone()));
        row
    }

    /// Insert a property as another device of the same actor would,
    /// emitting an INSERT event.
    pub fn insert_external_property(&self, actor: ActorId, draft: &PropertyDraft) -> PropertyRow {
        let row = self.seed_property(actor, draft);
        self.emit("properties", actor, ChangeEvent::insert(json!({ "id": row.id })));
        row
    }

    /// Deliver a change event to matching subscribers.
    pub fn emit(&self, table: &str, actor: ActorId, event: ChangeEvent) {
        self.broadcast(table, actor, FeedMessage::Change(event));
    }

    /// Deliver a channel status to every subscriber of `table`.
    ///
    /// `CHANNEL_ERROR` and `CLOSED` detach the subscribers afterwards.
    pub fn emit_status(&self, table: &str, status: ChannelStatus) {
        let mut subscribers = self.subscribers.lock();
        for sub in subscribers.iter().filter(|s| s.table == table) {
            let _ = sub.tx.try_send(FeedMessage::Status(status));
        }
        if status != ChannelStatus::Subscribed {
            subscribers.retain(|s| s.table != table);
        }
    }

    /// Live subscriptions on `table`.
    #[must_use]
    pub fn subscriber_count(&self, table: &str) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|s| !s.tx.is_closed());
        subscribers.iter().filter(|s| s.table == table).count()
    }

    /// Wait until `table` has at least `count` live subscribers.
    ///
    /// Returns false if `limit` elapses first.
    pub async fn wait_for_subscribers(&self, table: &str, count: usize, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while self.subscriber_count(table) < count {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        true
    }

    fn broadcast(&self, table: &str, actor: ActorId, message: FeedMessage) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|s| !s.tx.is_closed());
        for sub in subscribers
            .iter()
            .filter(|s| s.table == table && s.actor == actor)
        {
            if sub.tx.try_send(message.clone()).is_err() {
                debug!(table, "Dropping change event for a full subscriber");
            }
        }
    }

    /// Count the call and apply the next scripted fault, if any.
    async fn gate(&self, endpoint: &str) -> RemoteResult<()> {
        *self.calls.lock().entry(endpoint.to_string()).or_default() += 1;
        let fault = self
            .faults
            .lock()
            .get_mut(endpoint)
            .and_then(VecDeque::pop_front);

        match fault {
            None => Ok(()),
            Some(Fault::Network) => Err(RemoteError::network("connection refused")),
            Some(Fault::Rejected(message)) => Err(RemoteError::new(message)),
            Some(Fault::Delay(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

fn new_id() -> EntityId {
    EntityId::from(Uuid::new_v4())
}

fn new_property_row(draft: &PropertyDraft) -> PropertyRow {
    PropertyRow {
        id: new_id(),
        name: draft.name.clone(),
        address: draft.address.clone(),
        city: draft.city.clone(),
        status: draft.status,
        rent: draft.rent,
        tenants: Vec::new(),
    }
}

fn no_rows() -> RemoteError {
    RemoteError::new("JSON object requested, multiple (or no) rows returned").with_code("PGRST116")
}

fn not_null(column: &str) -> RemoteError {
    RemoteError::new(format!(
        "null value in column \"{column}\" violates not-null constraint"
    ))
    .with_code("23502")
}

fn row_json<T: serde::Serialize>(row: &T) -> serde_json::Value {
    serde_json::to_value(row).unwrap_or_else(|_| json!({}))
}

#[async_trait]
impl PropertyBackend for InMemoryBackend {
    async fn list_properties(&self, actor: ActorId) -> RemoteResult<Vec<PropertyRow>> {
        self.gate(GET_PROPERTIES).await?;
        let tables = self.tables.lock();
        Ok(tables
            .properties
            .iter()
            .filter(|(owner, _)| *owner == actor)
            .map(|(_, row)| tables.with_tenants(row.clone()))
            .collect())
    }

    async fn get_property(&self, actor: ActorId, id: &EntityId) -> RemoteResult<PropertyRow> {
        self.gate(GET_PROPERTY).await?;
        self.tables.lock().property(actor, id).ok_or_else(no_rows)
    }

    async fn create_property(
        &self,
        actor: ActorId,
        draft: &PropertyDraft,
    ) -> RemoteResult<PropertyRow> {
        self.gate(CREATE_PROPERTY).await?;
        if draft.name.trim().is_empty() {
            return Err(not_null("name"));
        }

        let row = {
            let mut tables = self.tables.lock();
            let duplicate = tables
                .properties
                .iter()
                .any(|(owner, p)| *owner == actor && p.name == draft.name);
            if duplicate {
                return Err(RemoteError::new(
                    "duplicate key value violates unique constraint \"properties_user_id_name_key\"",
                )
                .with_code("23505"));
            }
            let row = new_property_row(draft);
            tables.properties.insert(0, (actor, row.clone()));
            row
        };

        self.emit("properties", actor, ChangeEvent::insert(row_json(&row)));
        Ok(row)
    }

    async fn update_property(
        &self,
        actor: ActorId,
        id: &EntityId,
        patch: &PropertyPatch,
    ) -> RemoteResult<PropertyRow> {
        self.gate(UPDATE_PROPERTY).await?;

        let (old, new) = {
            let mut tables = self.tables.lock();
            let Some((_, row)) = tables
                .properties
                .iter_mut()
                .find(|(owner, row)| *owner == actor && &row.id == id)
            else {
                return Err(no_rows());
            };
            let old = row.clone();
            if let Some(name) = &patch.name {
                row.name.clone_from(name);
            }
            if let Some(address) = &patch.address {
                row.address.clone_from(address);
            }
            if let Some(city) = &patch.city {
                row.city.clone_from(city);
            }
            if let Some(rent) = patch.rent {
                row.rent = rent;
            }
            if let Some(status) = patch.status {
                row.status = status;
            }
            let new = row.clone();
            (old, tables.with_tenants(new))
        };

        self.emit(
            "properties",
            actor,
            ChangeEvent::update(row_json(&new), Some(row_json(&old))),
        );
        Ok(new)
    }

    async fn delete_property(&self, actor: ActorId, id: &EntityId) -> RemoteResult<()> {
        self.gate(DELETE_PROPERTY).await?;

        {
            let mut tables = self.tables.lock();
            if tables
                .payments
                .iter()
                .any(|(_, p)| p.property_id.as_ref() == Some(id))
            {
                return Err(RemoteError::new(
                    "update or delete on table \"properties\" violates foreign key constraint \"payments_property_id_fkey\" on table \"payments\"",
                )
                .with_code("23503"));
            }
            let before = tables.properties.len();
            tables
                .properties
                .retain(|(owner, row)| !(*owner == actor && &row.id == id));
            if tables.properties.len() == before {
                return Err(no_rows());
            }
            tables.tenants.retain(|(_, t)| &t.property_id != id);
        }

        self.emit("properties", actor, ChangeEvent::delete(json!({ "id": id })));
        Ok(())
    }
}

#[async_trait]
impl TenantBackend for InMemoryBackend {
    async fn create_tenant(&self, actor: ActorId, tenant: &NewTenant) -> RemoteResult<Tenant> {
        self.gate(CREATE_TENANT).await?;
        if tenant.draft.name.trim().is_empty() {
            return Err(not_null("name"));
        }

        let row = {
            let mut tables = self.tables.lock();
            if tables.property(actor, &tenant.property_id).is_none() {
                return Err(RemoteError::new(
                    "insert or update on table \"tenants\" violates foreign key constraint \"tenants_property_id_fkey\"",
                )
                .with_code("23503"));
            }
            let row = Tenant {
                id: new_id(),
                property_id: tenant.property_id.clone(),
                name: tenant.draft.name.clone(),
                entry_date: tenant.draft.entry_date,
                exit_date: tenant.draft.exit_date,
                rent: tenant.rent,
                status: tenant.draft.status,
            };
            tables.tenants.push((actor, row.clone()));
            row
        };

        self.emit("tenants", actor, ChangeEvent::insert(row_json(&row)));
        Ok(row)
    }

    async fn update_tenant(
        &self,
        actor: ActorId,
        id: &EntityId,
        draft: &TenantDraft,
    ) -> RemoteResult<Tenant> {
        self.gate(UPDATE_TENANT).await?;

        let row = {
            let mut tables = self.tables.lock();
            let Some((_, row)) = tables
                .tenants
                .iter_mut()
                .find(|(owner, row)| *owner == actor && &row.id == id)
            else {
                return Err(no_rows());
            };
            row.name.clone_from(&draft.name);
            row.entry_date = draft.entry_date;
            row.exit_date = draft.exit_date;
            row.status = draft.status;
            row.clone()
        };

        self.emit("tenants", actor, ChangeEvent::update(row_json(&row), None));
        Ok(row)
    }

    async fn delete_tenant(&self, actor: ActorId, id: &EntityId) -> RemoteResult<()> {
        self.gate(DELETE_TENANT).await?;
        {
            let mut tables = self.tables.lock();
            let before = tables.tenants.len();
            tables
                .tenants
                .retain(|(owner, row)| !(*owner == actor && &row.id == id));
            if tables.tenants.len() == before {
                return Err(no_rows());
            }
        }
        self.emit("tenants", actor, ChangeEvent::delete(json!({ "id": id })));
        Ok(())
    }
}

#[async_trait]
impl PaymentBackend for InMemoryBackend {
    async fn list_payments(&self, actor: ActorId) -> RemoteResult<Vec<PaymentRow>> {
        self.gate(GET_PAYMENTS).await?;
        let tables = self.tables.lock();
        Ok(tables
            .payments
            .iter()
            .filter(|(owner, _)| *owner == actor)
            .map(|(_, row)| tables.with_names(row.clone()))
            .collect())
    }

    async fn get_payment(&self, actor: ActorId, id: &EntityId) -> RemoteResult<PaymentRow> {
        self.gate(GET_PAYMENT).await?;
        self.tables.lock().payment(actor, id).ok_or_else(no_rows)
    }

    async fn create_payment(
        &self,
        actor: ActorId,
        payment: &NewPayment,
    ) -> RemoteResult<PaymentRow> {
        self.gate(CREATE_PAYMENT).await?;

        let row = {
            let mut tables = self.tables.lock();
            if let Some(property_id) = &payment.draft.property_id {
                if tables.property(actor, property_id).is_none() {
                    return Err(RemoteError::new(
                        "insert or update on table \"payments\" violates foreign key constraint \"payments_property_id_fkey\"",
                    )
                    .with_code("23503"));
                }
            }
            let row = PaymentRow {
                id: new_id(),
                property_id: payment.draft.property_id.clone(),
                tenant_id: payment.tenant_id.clone(),
                property_name: None,
                tenant_name: None,
                amount: payment.draft.amount,
                due_date: payment.draft.due_date,
                status: payment.draft.status,
            };
            tables.payments.insert(0, (actor, row.clone()));
            tables.with_names(row)
        };

        self.emit("payments", actor, ChangeEvent::insert(row_json(&row)));
        Ok(row)
    }

    async fn update_payment(
        &self,
        actor: ActorId,
        id: &EntityId,
        patch: &PaymentPatch,
    ) -> RemoteResult<PaymentRow> {
        self.gate(UPDATE_PAYMENT).await?;

        let row = {
            let mut tables = self.tables.lock();
            let Some((_, row)) = tables
                .payments
                .iter_mut()
                .find(|(owner, row)| *owner == actor && &row.id == id)
            else {
                return Err(no_rows());
            };
            if let Some(amount) = patch.amount {
                row.amount = amount;
            }
            if let Some(due_date) = patch.due_date {
                row.due_date = due_date;
            }
            if let Some(status) = patch.status {
                row.status = status;
            }
            let row = row.clone();
            tables.with_names(row)
        };

        self.emit("payments", actor, ChangeEvent::update(row_json(&row), None));
        Ok(row)
    }

    async fn delete_payment(&self, actor: ActorId, id: &EntityId) -> RemoteResult<()> {
        self.gate(DELETE_PAYMENT).await?;
        {
            let mut tables = self.tables.lock();
            let before = tables.payments.len();
            tables
                .payments
                .retain(|(owner, row)| !(*owner == actor && &row.id == id));
            if tables.payments.len() == before {
                return Err(no_rows());
            }
        }
        self.emit("payments", actor, ChangeEvent::delete(json!({ "id": id })));
        Ok(())
    }
}

#[async_trait]
impl ChangeFeed for InMemoryBackend {
    async fn subscribe(&self, topic: &FeedTopic) -> Result<FeedSubscription, RemoteError> {
        self.gate(&format!("subscribe:{}", topic.table)).await?;

        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        // Buffer is empty, the confirmation always fits
        let _ = tx.try_send(FeedMessage::Status(ChannelStatus::Subscribed));
        self.subscribers.lock().push(Subscriber {
            table: topic.table,
            actor: topic.actor,
            tx,
        });
        debug!(channel = %topic.channel_name(), "Feed subscriber attached");
        Ok(FeedSubscription::new(rx))
    }
}
