//! Caller-held pins on store snapshots.

use crate::error::{CoreError, CoreResult};
use crate::scan::collect_prefix;
use crate::store::StoreInner;
use parking_lot::Mutex;
use snapstore_engine::{KvPair, SequenceNumber, SnapshotId};
use std::sync::Arc;

/// A consistent, read-only view of the store's current snapshot when the
/// lease was taken.
///
/// Obtained from [`crate::Store::get_snapshot`]. The current snapshot is the
/// one made at open or by the latest [`crate::Store::take_snapshot`], so
/// writes after that call are not visible through the lease even if they
/// happened before `get_snapshot`. While a lease is held, the
/// snapshot it reads from stays alive even after
/// [`crate::Store::take_snapshot`] moves the store's current snapshot
/// forward, and [`crate::Store::close`] refuses to run.
///
/// Clones share one lease: [`Lease::release`] on any clone releases it for
/// all of them, exactly once. Dropping the last clone releases it too.
///
/// # Example
///
/// ```rust
/// use snapstore_core::Store;
///
/// let store = Store::open_in_memory().unwrap();
/// store.put(b"k", b"before").unwrap();
/// store.take_snapshot().unwrap();
///
/// let lease = store.get_snapshot().unwrap();
/// store.put(b"k", b"after").unwrap();
///
/// assert_eq!(lease.get(b"k").unwrap(), Some(b"before".to_vec()));
/// assert_eq!(store.get(b"k").unwrap(), Some(b"after".to_vec()));
///
/// lease.release();
/// store.close().unwrap();
/// ```
#[derive(Clone)]
pub struct Lease {
    state: Arc<LeaseState>,
}

struct LeaseState {
    store: Arc<StoreInner>,
    sequence: SequenceNumber,
    /// Cleared on first release.
    snapshot: Mutex<Option<SnapshotId>>,
}

impl LeaseState {
    fn release(&self) {
        let taken = self.snapshot.lock().take();
        if let Some(id) = taken {
            self.store.release_snapshot(id);
        }
    }
}

impl Drop for LeaseState {
    fn drop(&mut self) {
        self.release();
    }
}

impl Lease {
    /// The caller must already have counted this lease in the registry.
    pub(crate) fn new(store: Arc<StoreInner>, id: SnapshotId, sequence: SequenceNumber) -> Self {
        Self {
            state: Arc::new(LeaseState {
                store,
                sequence,
                snapshot: Mutex::new(Some(id)),
            }),
        }
    }

    /// The pinned snapshot, or `None` once released.
    #[must_use]
    pub fn id(&self) -> Option<SnapshotId> {
        *self.state.snapshot.lock()
    }

    /// Engine sequence the lease reads at.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.state.sequence
    }

    /// Returns true once the lease has been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.id().is_none()
    }

    /// Reads `key` as of the lease's snapshot.
    ///
    /// # Errors
    ///
    /// - [`CoreError::LeaseReleased`] if the lease was released
    /// - [`CoreError::EngineRead`] if the engine read fails
    pub fn get(&self, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        let id = self.id().ok_or(CoreError::LeaseReleased)?;
        let state = self.state.store.state.read();
        let snapshot = state.registry.get(id).ok_or(CoreError::LeaseReleased)?;
        snapshot.get(key).map_err(CoreError::EngineRead)
    }

    /// Scans keys starting with `prefix` as of the lease's snapshot.
    ///
    /// Same rules as [`crate::Store::scan`]: ascending order, at most
    /// `limit` pairs (0 means no limit), all-or-nothing on error.
    ///
    /// # Errors
    ///
    /// - [`CoreError::LeaseReleased`] if the lease was released
    /// - [`CoreError::Scan`] if the iteration fails
    pub fn scan(&self, prefix: &[u8], limit: usize) -> CoreResult<Vec<KvPair>> {
        let id = self.id().ok_or(CoreError::LeaseReleased)?;
        let state = self.state.store.state.read();
        let snapshot = state.registry.get(id).ok_or(CoreError::LeaseReleased)?;
        let iter = snapshot.iter_prefix(prefix).map_err(CoreError::Scan)?;
        collect_prefix(iter, limit).map_err(CoreError::Scan)
    }

    /// Releases the lease. Calling it again, on this or any clone, does
    /// nothing.
    pub fn release(&self) {
        self.state.release();
    }
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("snapshot", &self.id())
            .field("sequence", &self.sequence())
            .finish()
    }
}
