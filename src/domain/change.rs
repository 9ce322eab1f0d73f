//! Row-level change notifications pushed by the remote store.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::id::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// A single change event.
///
/// Row snapshots are partial: the payload carries the changed table row
/// without joined relations, so INSERT and UPDATE handlers reload the full
/// entry before merging it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "eventType")]
    pub kind: ChangeKind,
    #[serde(default)]
    pub new: Option<Value>,
    #[serde(default)]
    pub old: Option<Value>,
}

impl ChangeEvent {
    #[must_use]
    pub fn insert(row: Value) -> Self {
        Self {
            kind: ChangeKind::Insert,
            new: Some(row),
            old: None,
        }
    }

    #[must_use]
    pub fn update(new: Value, old: Option<Value>) -> Self {
        Self {
            kind: ChangeKind::Update,
            new: Some(new),
            old,
        }
    }

    #[must_use]
    pub fn delete(old: Value) -> Self {
        Self {
            kind: ChangeKind::Delete,
            new: None,
            old: Some(old),
        }
    }

    /// Identifier of the row this event is about.
    ///
    /// Read from `new` for inserts and updates and from `old` for deletes.
    #[must_use]
    pub fn subject_id(&self) -> Option<EntityId> {
        let row = match self.kind {
            ChangeKind::Insert | ChangeKind::Update => self.new.as_ref(),
            ChangeKind::Delete => self.old.as_ref(),
        }?;
        match row.get("id")? {
            Value::String(s) => Some(EntityId::new(s.clone())),
            Value::Number(n) => Some(EntityId::new(n.to_string())),
            _ => None,
        }
    }
}

/// Lifecycle status reported by a push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelStatus {
    Subscribed,
    ChannelError,
    Closed,
}
