//! Reference-counted registry of live engine snapshots.

use snapstore_engine::{EngineSnapshot, SnapshotId};
use std::collections::HashMap;
use tracing::trace;

/// What [`SnapshotRegistry::release`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The id was not registered; nothing changed.
    Absent,
    /// The count dropped but stays positive.
    Decremented {
        /// Count after the decrement.
        remaining: usize,
    },
    /// The count reached zero; the engine snapshot was released.
    Freed,
}

struct RegistryEntry {
    snapshot: Box<dyn EngineSnapshot>,
    count: usize,
}

/// Maps each live snapshot to the number of references holding it.
///
/// # Invariants
///
/// - Every entry has a count of at least 1
/// - An entry is removed, and its engine snapshot released, in the same
///   call that brings its count to zero
/// - [`Self::release`] is the only place engine snapshots are released
#[derive(Default)]
pub struct SnapshotRegistry {
    entries: HashMap<SnapshotId, RegistryEntry>,
}

impl SnapshotRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh snapshot with a count of 1 and returns its id.
    pub fn insert(&mut self, snapshot: Box<dyn EngineSnapshot>) -> SnapshotId {
        let id = snapshot.id();
        debug_assert!(!self.entries.contains_key(&id), "snapshot {id} registered twice");
        self.entries.insert(id, RegistryEntry { snapshot, count: 1 });
        trace!(%id, "snapshot registered");
        id
    }

    /// Adds a reference to a registered snapshot. Returns false if `id` is
    /// not registered.
    pub fn acquire(&mut self, id: SnapshotId) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.count += 1;
                trace!(%id, count = entry.count, "snapshot acquired");
                true
            }
            None => false,
        }
    }

    /// Drops one reference: decrements a shared entry, or removes and
    /// releases an entry held once. Unknown ids are ignored.
    pub fn release(&mut self, id: SnapshotId) -> ReleaseOutcome {
        match self.entries.get_mut(&id) {
            None => ReleaseOutcome::Absent,
            Some(entry) if entry.count > 1 => {
                entry.count -= 1;
                trace!(%id, count = entry.count, "snapshot reference dropped");
                ReleaseOutcome::Decremented {
                    remaining: entry.count,
                }
            }
            Some(_) => {
                if let Some(entry) = self.entries.remove(&id) {
                    entry.snapshot.release();
                }
                trace!(%id, "snapshot freed");
                ReleaseOutcome::Freed
            }
        }
    }

    /// Reference count of `id`, or 0 if not registered.
    #[must_use]
    pub fn count(&self, id: SnapshotId) -> usize {
        self.entries.get(&id).map_or(0, |entry| entry.count)
    }

    /// The engine snapshot registered under `id`.
    #[must_use]
    pub fn get(&self, id: SnapshotId) -> Option<&dyn EngineSnapshot> {
        self.entries.get(&id).map(|entry| entry.snapshot.as_ref())
    }

    /// Distinct snapshots registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no snapshot is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of every entry's count.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.entries.values().map(|entry| entry.count).sum()
    }
}

impl std::fmt::Debug for SnapshotRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(id, entry)| (id, entry.count)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapstore_engine::{EngineResult, KvIter, SequenceNumber};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSnapshot {
        id: SnapshotId,
        releases: Arc<AtomicUsize>,
    }

    impl EngineSnapshot for CountingSnapshot {
        fn id(&self) -> SnapshotId {
            self.id
        }

        fn sequence(&self) -> SequenceNumber {
            SequenceNumber::default()
        }

        fn get(&self, _key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
            Ok(None)
        }

        fn iter_prefix(&self, _prefix: &[u8]) -> EngineResult<KvIter<'_>> {
            Ok(Box::new(std::iter::empty()))
        }

        fn release(self: Box<Self>) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn snapshot(id: u64, releases: &Arc<AtomicUsize>) -> Box<dyn EngineSnapshot> {
        Box::new(CountingSnapshot {
            id: SnapshotId::new(id),
            releases: Arc::clone(releases),
        })
    }

    #[test]
    fn insert_starts_at_one() {
        let releases = Arc::new(AtomicUsize::new(0));
        let mut registry = SnapshotRegistry::new();
        let id = registry.insert(snapshot(1, &releases));

        assert_eq!(registry.count(id), 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(id).is_some());
    }

    #[test]
    fn release_decrements_before_freeing() {
        let releases = Arc::new(AtomicUsize::new(0));
        let mut registry = SnapshotRegistry::new();
        let id = registry.insert(snapshot(1, &releases));
        assert!(registry.acquire(id));
        assert!(registry.acquire(id));
        assert_eq!(registry.total_count(), 3);

        assert_eq!(
            registry.release(id),
            ReleaseOutcome::Decremented { remaining: 2 }
        );
        assert_eq!(
            registry.release(id),
            ReleaseOutcome::Decremented { remaining: 1 }
        );
        assert_eq!(releases.load(Ordering::SeqCst), 0);

        assert_eq!(registry.release(id), ReleaseOutcome::Freed);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let releases = Arc::new(AtomicUsize::new(0));
        let mut registry = SnapshotRegistry::new();
        let id = registry.insert(snapshot(1, &releases));
        registry.release(id);

        assert_eq!(registry.release(id), ReleaseOutcome::Absent);
        assert!(!registry.acquire(id));
        assert_eq!(registry.count(id), 0);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn entries_are_independent() {
        let releases = Arc::new(AtomicUsize::new(0));
        let mut registry = SnapshotRegistry::new();
        let old = registry.insert(snapshot(1, &releases));
        let new = registry.insert(snapshot(2, &releases));
        registry.acquire(old);

        registry.release(old);
        assert_eq!(registry.count(old), 1);
        assert_eq!(registry.count(new), 1);
        registry.release(old);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.count(new), 1);
    }
}
