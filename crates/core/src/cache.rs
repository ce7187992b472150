//! Version-guarded snapshot cell for cached views of server truth.
//!
//! Operator dashboards read aggregates (queue depth) far more often than
//! the underlying rows change. A refresher task rebuilds the snapshot off
//! the event change log and publishes it here; `accept_if_newer` compares
//! versions so a slow refresh that finishes out of order can never clobber
//! fresher data.

use std::sync::RwLock;

use crate::types::Timestamp;

/// An immutable snapshot of a derived view, tagged with the change-log
/// version (last event id) it was computed at.
#[derive(Debug, Clone)]
pub struct VersionedSnapshot<T> {
    /// Monotonically increasing version, typically the newest `events.id`
    /// observed when the snapshot was built.
    pub version: i64,
    /// When the snapshot was built.
    pub refreshed_at: Timestamp,
    /// The cached value.
    pub value: T,
}

impl<T> VersionedSnapshot<T> {
    pub fn new(version: i64, refreshed_at: Timestamp, value: T) -> Self {
        Self {
            version,
            refreshed_at,
            value,
        }
    }
}

/// Shared cell holding the latest accepted snapshot.
#[derive(Debug)]
pub struct SnapshotCell<T> {
    inner: RwLock<Option<VersionedSnapshot<T>>>,
}

impl<T: Clone> SnapshotCell<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// Current snapshot, if any refresh has completed yet.
    pub fn load(&self) -> Option<VersionedSnapshot<T>> {
        self.inner.read().expect("snapshot lock poisoned").clone()
    }

    /// Install `candidate` iff it is strictly newer than the current
    /// snapshot. Returns whether the candidate was accepted.
    pub fn accept_if_newer(&self, candidate: VersionedSnapshot<T>) -> bool {
        let mut guard = self.inner.write().expect("snapshot lock poisoned");
        match guard.as_ref() {
            Some(current) if current.version >= candidate.version => false,
            _ => {
                *guard = Some(candidate);
                true
            }
        }
    }
}

impl<T: Clone> Default for SnapshotCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn empty_cell_loads_none() {
        let cell: SnapshotCell<u32> = SnapshotCell::new();
        assert!(cell.load().is_none());
    }

    #[test]
    fn newer_snapshot_is_accepted() {
        let cell = SnapshotCell::new();
        assert!(cell.accept_if_newer(VersionedSnapshot::new(1, Utc::now(), "a")));
        assert!(cell.accept_if_newer(VersionedSnapshot::new(2, Utc::now(), "b")));
        assert_eq!(cell.load().unwrap().value, "b");
    }

    #[test]
    fn stale_snapshot_is_rejected() {
        let cell = SnapshotCell::new();
        assert!(cell.accept_if_newer(VersionedSnapshot::new(5, Utc::now(), "fresh")));
        // A refresh computed at an older change-log position finishes late.
        assert!(!cell.accept_if_newer(VersionedSnapshot::new(3, Utc::now(), "stale")));
        assert_eq!(cell.load().unwrap().value, "fresh");
        assert_eq!(cell.load().unwrap().version, 5);
    }

    #[test]
    fn equal_version_is_rejected() {
        let cell = SnapshotCell::new();
        assert!(cell.accept_if_newer(VersionedSnapshot::new(4, Utc::now(), 1)));
        assert!(!cell.accept_if_newer(VersionedSnapshot::new(4, Utc::now(), 2)));
    }
}
