//! Endpoint names.
//!
//! An endpoint names one logical remote operation and keys its circuit
//! breaker and latency statistics.

pub const GET_PROPERTIES: &str = "getProperties";
pub const GET_PROPERTY: &str = "getPropertyById";
pub const CREATE_PROPERTY: &str = "createProperty";
pub const UPDATE_PROPERTY: &str = "updateProperty";
pub const DELETE_PROPERTY: &str = "deleteProperty";

pub const CREATE_TENANT: &str = "createTenant";
pub const UPDATE_TENANT: &str = "updateTenant";
pub const DELETE_TENANT: &str = "deleteTenant";

pub const GET_PAYMENTS: &str = "getPayments";
pub const GET_PAYMENT: &str = "getPaymentById";
pub const CREATE_PAYMENT: &str = "createPayment";
pub const UPDATE_PAYMENT: &str = "updatePayment";
pub const DELETE_PAYMENT: &str = "deletePayment";
