//! Domain identifier types with proper encapsulation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::redact::mask_id;

/// Prefix that marks a client-generated placeholder identifier.
pub const TEMP_PREFIX: &str = "temp-";

static TEMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Identifier of a collection entry.
///
/// Either the stable identifier assigned by the remote store, or a
/// temporary placeholder (`temp-<millis>-<seq>`) used between an optimistic
/// insert and the arrival of the authoritative row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create an `EntityId` from a remote identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a placeholder identifier for an optimistic insert.
    ///
    /// The sequence suffix keeps two placeholders created within the same
    /// millisecond distinct.
    #[must_use]
    pub fn temporary(now: DateTime<Utc>) -> Self {
        let seq = TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self(format!("{TEMP_PREFIX}{}-{seq}", now.timestamp_millis()))
    }

    /// True for client-generated placeholders.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_PREFIX)
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<Uuid> for EntityId {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

/// The signed-in user on whose behalf remote calls are made.
///
/// `Display` masks the identifier so it can be logged freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(Uuid);

impl ActorId {
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Parse an actor identifier, rejecting anything that is not a UUID.
    pub fn parse(raw: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(raw).map(Self)
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&mask_id(&self.0.to_string()))
    }
}
