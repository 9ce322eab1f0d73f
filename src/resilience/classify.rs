//! Error classification and user-facing phrasing.

use crate::error::RemoteError;

/// Substrings that mark a transport-level, transient failure.
const RETRYABLE_MARKERS: &[&str] = &[
    "network",
    "failed to fetch",
    "fetch failed",
    "connection refused",
    "connection reset",
    "connection timeout",
    "econnrefused",
    "econnreset",
    "etimedout",
];

/// Known backend error substrings and the message shown instead.
///
/// Matched case-insensitively, first hit wins.
const FRIENDLY_MESSAGES: &[(&str, &str)] = &[
    (
        "network request failed",
        "Network error. Check your internet connection.",
    ),
    (
        "failed to fetch",
        "Network error. Check your internet connection.",
    ),
    ("jwt expired", "Your session has expired. Please sign in again."),
    ("invalid api key", "Configuration error. Contact support."),
    (
        "new row violates row-level security policy",
        "Action not allowed. You do not have the required permissions.",
    ),
    (
        "duplicate key value violates unique constraint",
        "This value already exists.",
    ),
    (
        "foreign key constraint",
        "Cannot delete: related data exists.",
    ),
    ("null value in column", "Required fields are missing."),
];

pub const UNKNOWN_ERROR: &str = "Unknown API error";
pub const OFFLINE_MESSAGE: &str = "No internet connection";
pub const CONNECTION_LOST_MESSAGE: &str = "Connection lost. Check your network.";
pub const RECONNECTING_MESSAGE: &str = "Trying to reconnect...";

/// True for failures worth retrying: connection refused or reset, fetch
/// failures, and other network-level errors. Validation, authorization and
/// conflict errors are terminal.
#[must_use]
pub fn is_retryable(error: &RemoteError) -> bool {
    is_retryable_message(error.message())
}

#[must_use]
pub fn is_retryable_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    RETRYABLE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Friendly replacement for a known backend error, if any.
#[must_use]
pub fn friendly_message(raw: &str) -> Option<&'static str> {
    let lower = raw.to_lowercase();
    FRIENDLY_MESSAGES
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, friendly)| *friendly)
}

/// The message to show the user for a raw backend error.
#[must_use]
pub fn user_message(raw: &str) -> String {
    if raw.trim().is_empty() {
        return UNKNOWN_ERROR.to_string();
    }
    friendly_message(raw).map_or_else(|| raw.to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_are_retryable() {
        assert!(is_retryable(&RemoteError::new("Network request failed")));
        assert!(is_retryable(&RemoteError::new("Failed to fetch")));
        assert!(is_retryable(&RemoteError::new("Connection timeout")));
        assert!(is_retryable(&RemoteError::new("connect ECONNREFUSED 127.0.0.1:443")));
        assert!(is_retryable(&RemoteError::new("Connection reset by peer")));
        assert!(is_retryable(&RemoteError::network("socket closed")));
    }

    #[test]
    fn validation_errors_are_not_retryable() {
        assert!(!is_retryable(&RemoteError::new("Invalid input")));
        assert!(!is_retryable(&RemoteError::new("Required field missing")));
        assert!(!is_retryable(&RemoteError::new(
            "duplicate key value violates unique constraint \"properties_pkey\""
        )));
        assert!(!is_retryable(&RemoteError::new("JWT expired")));
    }

    #[test]
    fn duplicate_key_is_rewritten_exactly() {
        let raw = "duplicate key value violates unique constraint \"properties_name_key\"";
        assert_eq!(user_message(raw), "This value already exists.");
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(
            user_message("JWT EXPIRED"),
            "Your session has expired. Please sign in again."
        );
        assert_eq!(
            user_message(
                "update or delete on table \"properties\" violates foreign key constraint \"payments_property_id_fkey\""
            ),
            "Cannot delete: related data exists."
        );
    }

    #[test]
    fn unknown_errors_pass_through() {
        assert_eq!(user_message("Rent must be positive"), "Rent must be positive");
        assert_eq!(user_message("  "), UNKNOWN_ERROR);
    }
}
