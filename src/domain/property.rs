//! Property records and the shapes used to create and patch them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::EntityId;
use super::record::Record;
use super::tenant::{Tenant, TenantDraft};

/// Occupancy status of a property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyStatus {
    Occupied,
    #[default]
    Vacant,
}

/// Property row as returned by the backend, with its tenants joined in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRow {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub city: String,
    #[serde(default)]
    pub status: PropertyStatus,
    pub rent: Decimal,
    #[serde(default)]
    pub tenants: Vec<Tenant>,
}

/// Property as held in the local collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: EntityId,
    pub name: String,
    pub address: String,
    pub city: String,
    pub status: PropertyStatus,
    pub rent: Decimal,
    pub tenant: Option<Tenant>,
}

impl From<PropertyRow> for Property {
    fn from(row: PropertyRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            address: row.address,
            city: row.city,
            status: row.status,
            rent: row.rent,
            tenant: row.tenants.into_iter().next(),
        }
    }
}

impl Record for Property {
    const KIND: &'static str = "property";

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}

/// User input for a new property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDraft {
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub city: String,
    pub rent: Decimal,
    #[serde(default)]
    pub status: PropertyStatus,
    /// Created as a separate row once the property exists.
    #[serde(default, skip_serializing)]
    pub tenant: Option<TenantDraft>,
}

impl PropertyDraft {
    /// Placeholder entry shown until the backend assigns an identifier.
    #[must_use]
    pub fn to_placeholder(&self, id: EntityId) -> Property {
        Property {
            id,
            name: self.name.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            status: self.status,
            rent: self.rent,
            tenant: None,
        }
    }

    /// True when a tenant row has to be written after the property commits.
    #[must_use]
    pub fn needs_tenant(&self) -> bool {
        self.status == PropertyStatus::Occupied && self.tenant.is_some()
    }
}

/// Partial update of a property. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rent: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PropertyStatus>,
    #[serde(default, skip_serializing)]
    pub tenant: Option<TenantDraft>,
}

impl PropertyPatch {
    /// Apply the scalar fields to a local entry.
    pub fn apply(&self, property: &mut Property) {
        if let Some(name) = &self.name {
            property.name.clone_from(name);
        }
        if let Some(address) = &self.address {
            property.address.clone_from(address);
        }
        if let Some(city) = &self.city {
            property.city.clone_from(city);
        }
        if let Some(rent) = self.rent {
            property.rent = rent;
        }
        if let Some(status) = self.status {
            property.status = status;
        }
    }
}
