//! Locally cached mirror of a remote table.
//!
//! A [`SyncedCollection`] is shared by the optimistic mutation controller and
//! the change-feed reconciler of one store. Every write checks the liveness
//! flag under the write lock, so once [`SyncedCollection::close`] returns no
//! further write can land, including writes from work already in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::{EntityId, Record};

struct Inner<T> {
    entries: RwLock<Vec<T>>,
    live: AtomicBool,
}

/// Ordered entries, at most one per identifier.
///
/// Cloning shares the same underlying collection.
pub struct SyncedCollection<T: Record> {
    inner: Arc<Inner<T>>,
}

impl<T: Record> Clone for SyncedCollection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Record> Default for SyncedCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> SyncedCollection<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::from_entries(Vec::new())
    }

    /// Seed a collection. Later duplicates of an identifier are dropped.
    #[must_use]
    pub fn from_entries(entries: Vec<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(dedup(entries)),
                live: AtomicBool::new(true),
            }),
        }
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.inner.live.load(Ordering::Acquire)
    }

    /// Stop accepting writes. Idempotent.
    pub fn close(&self) {
        let _entries = self.inner.entries.write();
        self.inner.live.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.inner.entries.read().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<T> {
        self.inner
            .entries
            .read()
            .iter()
            .find(|entry| entry.id() == id)
            .cloned()
    }

    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.position(id).is_some()
    }

    #[must_use]
    pub fn position(&self, id: &EntityId) -> Option<usize> {
        self.inner
            .entries
            .read()
            .iter()
            .position(|entry| entry.id() == id)
    }

    /// Insert at the front unless the identifier is already present.
    ///
    /// Returns whether the entry was inserted.
    pub fn insert_front(&self, entry: T) -> bool {
        let mut entries = self.inner.entries.write();
        if !self.is_live() || entries.iter().any(|e| e.id() == entry.id()) {
            return false;
        }
        entries.insert(0, entry);
        true
    }

    /// Replace the entry identified by `id` in place.
    ///
    /// When `entry` carries a different identifier that is already present
    /// elsewhere, the entry at `id` is removed and the existing one is
    /// overwritten instead, so one remote object never appears twice.
    /// Returns false if `id` is absent or the collection is closed.
    pub fn replace(&self, id: &EntityId, entry: T) -> bool {
        let mut entries = self.inner.entries.write();
        if !self.is_live() {
            return false;
        }
        let Some(pos) = entries.iter().position(|e| e.id() == id) else {
            return false;
        };

        if entry.id() != id {
            if let Some(other) = entries.iter().position(|e| e.id() == entry.id()) {
                entries[other] = entry;
                entries.remove(pos);
                return true;
            }
        }
        entries[pos] = entry;
        true
    }

    /// Apply `f` to the entry in place, returning the entry as it was before.
    pub fn update_with(&self, id: &EntityId, f: impl FnOnce(&mut T)) -> Option<T> {
        let mut entries = self.inner.entries.write();
        if !self.is_live() {
            return None;
        }
        let entry = entries.iter_mut().find(|e| e.id() == id)?;
        let previous = entry.clone();
        f(entry);
        Some(previous)
    }

    /// Remove and return the entry identified by `id`.
    pub fn remove(&self, id: &EntityId) -> Option<T> {
        let mut entries = self.inner.entries.write();
        if !self.is_live() {
            return None;
        }
        let pos = entries.iter().position(|e| e.id() == id)?;
        Some(entries.remove(pos))
    }

    /// Undo one tentative write.
    ///
    /// If the entries still equal `tentative`, `snapshot` is put back
    /// verbatim. Otherwise other writes have landed since, and only `undo`
    /// is applied to the current entries so those writes survive.
    pub fn rollback(
        &self,
        tentative: &[T],
        snapshot: Vec<T>,
        undo: impl FnOnce(&mut Vec<T>),
    ) -> bool {
        let mut entries = self.inner.entries.write();
        if !self.is_live() {
            return false;
        }
        if entries.as_slice() == tentative {
            *entries = snapshot;
        } else {
            undo(&mut entries);
        }
        true
    }

    /// Replace the whole contents with freshly fetched rows.
    pub fn replace_all(&self, rows: Vec<T>) -> bool {
        let mut entries = self.inner.entries.write();
        if !self.is_live() {
            return false;
        }
        *entries = dedup(rows);
        true
    }
}

fn dedup<T: Record>(rows: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(rows.len());
    for row in rows {
        if !out.iter().any(|e| e.id() == row.id()) {
            out.push(row);
        }
    }
    out
}
