use super::id::EntityId;

/// An entry held in a synced collection.
///
/// Entries are identified by [`EntityId`]; a collection never holds two
/// entries with the same identifier.
pub trait Record: Clone + PartialEq + Send + Sync + 'static {
    /// Singular noun used in logs and notifications (e.g. `"property"`).
    const KIND: &'static str;

    fn id(&self) -> &EntityId;

    /// Short human-readable label for notifications.
    fn label(&self) -> String {
        self.id().to_string()
    }
}
