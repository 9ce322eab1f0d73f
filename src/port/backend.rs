//! Remote record backends.
//!
//! Each method is one remote call of the `(args) -> {data, error}` shape:
//! `Ok` carries the data, `Err` carries the backend error. Calls are scoped to
//! the acting user; the backend enforces row ownership.

use async_trait::async_trait;

use crate::domain::{
    ActorId, EntityId, NewPayment, NewTenant, PaymentPatch, PaymentRow, PropertyDraft,
    PropertyPatch, PropertyRow, Tenant, TenantDraft,
};
use crate::error::RemoteError;

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

#[async_trait]
pub trait PropertyBackend: Send + Sync {
    /// All properties of the actor, newest first, tenants joined.
    async fn list_properties(&self, actor: ActorId) -> RemoteResult<Vec<PropertyRow>>;

    async fn get_property(&self, actor: ActorId, id: &EntityId) -> RemoteResult<PropertyRow>;

    async fn create_property(
        &self,
        actor: ActorId,
        draft: &PropertyDraft,
    ) -> RemoteResult<PropertyRow>;

    async fn update_property(
        &self,
        actor: ActorId,
        id: &EntityId,
        patch: &PropertyPatch,
    ) -> RemoteResult<PropertyRow>;

    async fn delete_property(&self, actor: ActorId, id: &EntityId) -> RemoteResult<()>;
}

#[async_trait]
pub trait TenantBackend: Send + Sync {
    async fn create_tenant(&self, actor: ActorId, tenant: &NewTenant) -> RemoteResult<Tenant>;

    async fn update_tenant(
        &self,
        actor: ActorId,
        id: &EntityId,
        draft: &TenantDraft,
    ) -> RemoteResult<Tenant>;

    async fn delete_tenant(&self, actor: ActorId, id: &EntityId) -> RemoteResult<()>;
}

#[async_trait]
pub trait PaymentBackend: Send + Sync {
    async fn list_payments(&self, actor: ActorId) -> RemoteResult<Vec<PaymentRow>>;

    async fn get_payment(&self, actor: ActorId, id: &EntityId) -> RemoteResult<PaymentRow>;

    async fn create_payment(&self, actor: ActorId, payment: &NewPayment)
        -> RemoteResult<PaymentRow>;

    async fn update_payment(
        &self,
        actor: ActorId,
        id: &EntityId,
        patch: &PaymentPatch,
    ) -> RemoteResult<PaymentRow>;

    async fn delete_payment(&self, actor: ActorId, id: &EntityId) -> RemoteResult<()>;
}
