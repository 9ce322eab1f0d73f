//! Payment records.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::EntityId;
use super::record::Record;

const UNKNOWN: &str = "N/A";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Late,
}

/// Payment row as returned by the backend view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRow {
    pub id: EntityId,
    #[serde(default)]
    pub property_id: Option<EntityId>,
    #[serde(default)]
    pub tenant_id: Option<EntityId>,
    #[serde(default)]
    pub property_name: Option<String>,
    #[serde(default)]
    pub tenant_name: Option<String>,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub status: PaymentStatus,
}

/// Payment as held in the local collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: EntityId,
    pub property_id: Option<EntityId>,
    pub property: String,
    pub tenant: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: PaymentStatus,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        let property = row.property_name.unwrap_or_else(|| UNKNOWN.to_string());
        let tenant = row.tenant_name.unwrap_or_else(|| property.clone());
        Self {
            id: row.id,
            property_id: row.property_id,
            property,
            tenant,
            amount: row.amount,
            due_date: row.due_date,
            status: row.status,
        }
    }
}

impl Record for Payment {
    const KIND: &'static str = "payment";

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn label(&self) -> String {
        format!("{} ({})", self.property, self.amount)
    }
}

/// User input for a new payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDraft {
    #[serde(default)]
    pub property_id: Option<EntityId>,
    #[serde(default)]
    pub property: Option<String>,
    #[serde(default)]
    pub tenant: Option<String>,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub status: PaymentStatus,
}

impl PaymentDraft {
    #[must_use]
    pub fn to_placeholder(&self, id: EntityId) -> Payment {
        Payment {
            id,
            property_id: self.property_id.clone(),
            property: self.property.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            tenant: self.tenant.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            amount: self.amount,
            due_date: self.due_date,
            status: self.status,
        }
    }
}

/// Insert payload for a payment row; the tenant is resolved from the property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPayment {
    #[serde(flatten)]
    pub draft: PaymentDraft,
    pub tenant_id: Option<EntityId>,
}

/// Partial update of a payment. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
}

impl PaymentPatch {
    pub fn apply(&self, payment: &mut Payment) {
        if let Some(amount) = self.amount {
            payment.amount = amount;
        }
        if let Some(due_date) = self.due_date {
            payment.due_date = due_date;
        }
        if let Some(status) = self.status {
            payment.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn row_without_names_falls_back() {
        let row = PaymentRow {
            id: EntityId::from("pay1"),
            property_id: None,
            tenant_id: None,
            property_name: None,
            tenant_name: None,
            amount: dec!(750),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            status: PaymentStatus::Pending,
        };
        let payment = Payment::from(row);
        assert_eq!(payment.property, "N/A");
        assert_eq!(payment.tenant, "N/A");
    }

    #[test]
    fn tenant_name_defaults_to_property_name() {
        let row = PaymentRow {
            id: EntityId::from("pay1"),
            property_id: Some(EntityId::from("p1")),
            tenant_id: None,
            property_name: Some("Loft".into()),
            tenant_name: None,
            amount: dec!(750),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            status: PaymentStatus::Paid,
        };
        assert_eq!(Payment::from(row).tenant, "Loft");
    }
}
