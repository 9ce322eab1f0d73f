//! Tenant rows, the child records written after a property mutation commits.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::EntityId;

/// Rent payment standing of a tenant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    #[default]
    OnTime,
    Late,
}

/// Tenant as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: EntityId,
    pub property_id: EntityId,
    pub name: String,
    pub entry_date: NaiveDate,
    #[serde(default)]
    pub exit_date: Option<NaiveDate>,
    pub rent: Decimal,
    #[serde(default)]
    pub status: TenantStatus,
}

/// Tenant fields supplied by the user alongside a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantDraft {
    pub name: String,
    pub entry_date: NaiveDate,
    #[serde(default)]
    pub exit_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: TenantStatus,
}

/// Insert payload for a tenant row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTenant {
    pub property_id: EntityId,
    pub rent: Decimal,
    #[serde(flatten)]
    pub draft: TenantDraft,
}
