//! Backend-agnostic domain types: identifiers, endpoints, records, change events.

pub mod change;
pub mod endpoint;
pub mod id;
pub mod payment;
pub mod property;
pub mod record;
pub mod tenant;

pub use change::{ChangeEvent, ChangeKind, ChannelStatus};
pub use id::{ActorId, EntityId, TEMP_PREFIX};
pub use payment::{NewPayment, Payment, PaymentDraft, PaymentPatch, PaymentRow, PaymentStatus};
pub use property::{Property, PropertyDraft, PropertyPatch, PropertyRow, PropertyStatus};
pub use record::Record;
pub use tenant::{NewTenant, Tenant, TenantDraft, TenantStatus};
