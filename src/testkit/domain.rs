//! Builders for domain values used across tests.
//!
//! Concise factory functions so tests focus on assertions rather than
//! construction boilerplate.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{
    ActorId, EntityId, Payment, PaymentDraft, PaymentStatus, Property, PropertyDraft,
    PropertyStatus, TenantDraft, TenantStatus,
};

/// A fresh random actor.
#[must_use]
pub fn actor() -> ActorId {
    ActorId::new(Uuid::new_v4())
}

#[must_use]
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

/// Vacant property draft with a 900 rent.
#[must_use]
pub fn property_draft(name: &str) -> PropertyDraft {
    PropertyDraft {
        name: name.to_string(),
        address: format!("{name} street"),
        city: "Lyon".to_string(),
        rent: Decimal::from(900),
        status: PropertyStatus::Vacant,
        tenant: None,
    }
}

/// Occupied property draft carrying a tenant.
#[must_use]
pub fn occupied_draft(name: &str, tenant: &str) -> PropertyDraft {
    PropertyDraft {
        status: PropertyStatus::Occupied,
        tenant: Some(tenant_draft(tenant)),
        ..property_draft(name)
    }
}

#[must_use]
pub fn tenant_draft(name: &str) -> TenantDraft {
    TenantDraft {
        name: name.to_string(),
        entry_date: date(2024, 1, 1),
        exit_date: None,
        status: TenantStatus::OnTime,
    }
}

#[must_use]
pub fn payment_draft(property_id: Option<EntityId>, amount: i64) -> PaymentDraft {
    PaymentDraft {
        property_id,
        property: None,
        tenant: None,
        amount: Decimal::from(amount),
        due_date: date(2024, 2, 5),
        status: PaymentStatus::Pending,
    }
}

/// A committed property entry named after its id.
#[must_use]
pub fn property(id: &str) -> Property {
    property_draft(id).to_placeholder(EntityId::from(id))
}

#[must_use]
pub fn payment(id: &str, amount: i64) -> Payment {
    payment_draft(None, amount).to_placeholder(EntityId::from(id))
}
