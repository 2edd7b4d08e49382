//! Store facade and snapshot lifecycle.

use crate::batch::Batch;
use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::lease::Lease;
use crate::registry::SnapshotRegistry;
use crate::scan::collect_prefix;
use parking_lot::RwLock;
use snapstore_engine::{
    Engine, EngineError, KvPair, OrderedEngine, SequenceNumber, SnapshotId, WriteBatch,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Point-in-time view of a store's snapshot bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Whether the store has been closed.
    pub closed: bool,
    /// Distinct snapshots alive, the current one included.
    pub live_snapshots: usize,
    /// Leases held by callers across all snapshots.
    pub outstanding_leases: usize,
    /// Sequence of the current snapshot, if any.
    pub current_sequence: Option<SequenceNumber>,
}

/// Everything guarded by the store lock.
pub(crate) struct StoreState {
    engine: Option<Box<dyn OrderedEngine>>,
    closed: bool,
    current: Option<SnapshotId>,
    pub(crate) registry: SnapshotRegistry,
}

impl StoreState {
    fn engine(&self) -> CoreResult<&dyn OrderedEngine> {
        if self.closed {
            return Err(CoreError::Closed);
        }
        self.engine.as_deref().ok_or(CoreError::Closed)
    }

    /// Installs a fresh snapshot as current.
    ///
    /// The new snapshot is created before the old one is touched, so a
    /// failure leaves the current snapshot in place.
    fn advance_snapshot(&mut self) -> CoreResult<SnapshotId> {
        let snapshot = self.engine()?.snapshot().map_err(CoreError::SnapshotCreate)?;
        let sequence = snapshot.sequence();

        if let Some(old) = self.current.take() {
            self.registry.release(old);
        }
        let id = self.registry.insert(snapshot);
        self.current = Some(id);
        debug!(%id, %sequence, live = self.registry.len(), "current snapshot advanced");
        Ok(id)
    }

    fn leases(&self) -> usize {
        let self_refs = usize::from(self.current.is_some());
        self.registry.total_count().saturating_sub(self_refs)
    }
}

/// Shared between the store and the leases it hands out.
pub(crate) struct StoreInner {
    path: PathBuf,
    pub(crate) state: RwLock<StoreState>,
}

impl StoreInner {
    /// Drops one registry reference taken by a lease.
    pub(crate) fn release_snapshot(&self, id: SnapshotId) {
        let outcome = self.state.write().registry.release(id);
        debug!(%id, ?outcome, "lease released");
    }
}

/// The entry point for reading and writing a snapshot-capable ordered
/// key-value store.
///
/// `Store` wraps one [`OrderedEngine`] and provides:
/// - Fresh reads and writes against the live engine (`get`, `scan`, `put`,
///   `delete`, [`Batch`])
/// - A *current* snapshot, advanced on demand with [`Store::take_snapshot`]
/// - Opt-in snapshot isolation through [`Lease`]s pinning the current
///   snapshot
///
/// # Concurrency
///
/// The store may be shared across threads. Mutating operations take the
/// store lock exclusively; `get`, `scan` and lease reads share it.
/// Nothing ever waits for leases: `close` fails fast while any are held.
///
/// # Example
///
/// ```rust,no_run
/// use snapstore_core::Store;
///
/// let store = Store::open("my_store")?;
/// store.put(b"user:1", b"alice")?;
/// store.take_snapshot()?;
///
/// let lease = store.get_snapshot().expect("store is open");
/// store.take_snapshot()?;
/// store.delete(b"user:1")?;
/// assert_eq!(lease.get(b"user:1")?, Some(b"alice".to_vec()));
///
/// lease.release();
/// store.close()?;
/// # Ok::<(), snapstore_core::CoreError>(())
/// ```
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Opens or creates a store in directory `path`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::EngineOpen`] if the path cannot be resolved or the
    ///   engine cannot be opened (including another open handle on the path)
    /// - [`CoreError::SnapshotCreate`] if the initial snapshot fails
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Opens a store with custom configuration.
    ///
    /// # Errors
    ///
    /// Same as [`Store::open`].
    pub fn open_with_config(path: impl AsRef<Path>, config: StoreConfig) -> CoreResult<Self> {
        let path = path.as_ref();
        let absolute = std::path::absolute(path).map_err(|e| CoreError::EngineOpen {
            path: path.to_path_buf(),
            source: EngineError::Io(e),
        })?;

        let engine = Engine::open(&absolute, config.engine_options()).map_err(|source| {
            CoreError::EngineOpen {
                path: absolute.clone(),
                source,
            }
        })?;
        Self::open_with_engine(absolute, Box::new(engine))
    }

    /// Opens an ephemeral store backed by an in-memory engine.
    ///
    /// # Errors
    ///
    /// Same as [`Store::open`].
    pub fn open_in_memory() -> CoreResult<Self> {
        let path = PathBuf::from(":memory:");
        let engine = Engine::open_in_memory().map_err(|source| CoreError::EngineOpen {
            path: path.clone(),
            source,
        })?;
        Self::open_with_engine(path, Box::new(engine))
    }

    /// Builds a store over an already opened engine.
    ///
    /// This is the lower-level constructor for custom engines; `path` is
    /// only recorded. If the initial snapshot cannot be created, the engine
    /// is closed before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SnapshotCreate`] if the initial snapshot fails.
    pub fn open_with_engine(
        path: impl Into<PathBuf>,
        engine: Box<dyn OrderedEngine>,
    ) -> CoreResult<Self> {
        let path = path.into();
        let mut state = StoreState {
            engine: Some(engine),
            closed: false,
            current: None,
            registry: SnapshotRegistry::new(),
        };

        if let Err(e) = state.advance_snapshot() {
            if let Some(engine) = state.engine.take() {
                if let Err(close_err) = engine.close() {
                    warn!(path = %path.display(), error = %close_err, "failed to close engine after open error");
                }
            }
            return Err(e);
        }

        debug!(path = %path.display(), "store opened");
        Ok(Self {
            inner: Arc::new(StoreInner {
                path,
                state: RwLock::new(state),
            }),
        })
    }

    /// Closes the store and its engine.
    ///
    /// # Errors
    ///
    /// - [`CoreError::AlreadyClosed`] if already closed
    /// - [`CoreError::SnapshotsStillActive`] if any caller lease is
    ///   outstanding; release them and retry
    /// - [`CoreError::EngineClose`] if the engine fails to close (the store
    ///   is closed anyway)
    pub fn close(&self) -> CoreResult<()> {
        let mut state = self.inner.state.write();
        if state.closed {
            return Err(CoreError::AlreadyClosed);
        }

        let snapshots = state.registry.len();
        let current_count = state.current.map_or(0, |id| state.registry.count(id));
        if snapshots > 1 || current_count > 1 {
            return Err(CoreError::SnapshotsStillActive {
                snapshots,
                leases: state.leases(),
            });
        }

        if let Some(id) = state.current.take() {
            state.registry.release(id);
        }
        state.closed = true;

        if let Some(engine) = state.engine.take() {
            engine.close().map_err(CoreError::EngineClose)?;
        }
        debug!(path = %self.inner.path.display(), "store closed");
        Ok(())
    }

    /// Returns true once the store has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.read().closed
    }

    /// The resolved absolute path of the store.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Writes `value` under `key` in the live engine.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Closed`] if the store is closed
    /// - [`CoreError::EngineWrite`] if the engine write fails
    pub fn put(&self, key: &[u8], value: &[u8]) -> CoreResult<()> {
        let state = self.inner.state.write();
        state
            .engine()?
            .put(key, value)
            .map_err(CoreError::EngineWrite)
    }

    /// Removes `key` from the live engine. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Closed`] if the store is closed
    /// - [`CoreError::EngineWrite`] if the engine write fails
    pub fn delete(&self, key: &[u8]) -> CoreResult<()> {
        let state = self.inner.state.write();
        state.engine()?.delete(key).map_err(CoreError::EngineWrite)
    }

    /// Reads the latest value of `key` from the live engine, not from any
    /// snapshot. `Ok(None)` means the key is absent.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Closed`] if the store is closed
    /// - [`CoreError::EngineRead`] if the engine read fails
    pub fn get(&self, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        let state = self.inner.state.read();
        state.engine()?.get(key).map_err(CoreError::EngineRead)
    }

    /// Replaces the current snapshot with a fresh one.
    ///
    /// The previous current snapshot loses the store's reference; it lives
    /// on as long as leases still hold it.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Closed`] if the store is closed
    /// - [`CoreError::SnapshotCreate`] if the engine cannot create a
    ///   snapshot; the current snapshot is unchanged
    pub fn take_snapshot(&self) -> CoreResult<()> {
        self.inner.state.write().advance_snapshot().map(|_| ())
    }

    /// Leases the current snapshot, or returns `None` if the store is
    /// closed.
    #[must_use]
    pub fn get_snapshot(&self) -> Option<Lease> {
        let mut state = self.inner.state.write();
        if state.closed {
            return None;
        }
        let id = state.current?;
        let sequence = state.registry.get(id)?.sequence();
        if !state.registry.acquire(id) {
            return None;
        }
        Some(Lease::new(Arc::clone(&self.inner), id, sequence))
    }

    /// Starts an empty batch bound to this store.
    #[must_use]
    pub fn batch(&self) -> Batch<'_> {
        Batch::new(self)
    }

    pub(crate) fn commit_batch(&self, ops: WriteBatch) -> CoreResult<()> {
        let state = self.inner.state.write();
        let engine = state.engine()?;
        if ops.is_empty() {
            return Ok(());
        }
        engine.write_batch(ops).map_err(CoreError::EngineWrite)
    }

    /// Returns up to `limit` pairs whose key starts with `prefix`, in
    /// ascending key order, read from the live engine. A `limit` of 0
    /// means no limit.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Closed`] if the store is closed
    /// - [`CoreError::Scan`] if the iteration fails; nothing is returned
    pub fn scan(&self, prefix: &[u8], limit: usize) -> CoreResult<Vec<KvPair>> {
        let state = self.inner.state.read();
        let iter = state
            .engine()?
            .iter_prefix(prefix)
            .map_err(CoreError::Scan)?;
        collect_prefix(iter, limit).map_err(CoreError::Scan)
    }

    /// Returns snapshot bookkeeping counters.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let state = self.inner.state.read();
        StoreStats {
            closed: state.closed,
            live_snapshots: state.registry.len(),
            outstanding_leases: state.leases(),
            current_sequence: state
                .current
                .and_then(|id| state.registry.get(id))
                .map(|snapshot| snapshot.sequence()),
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.inner.path)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(e) = self.close() {
            warn!(path = %self.inner.path.display(), error = %e, "store dropped without a clean close");
        }
    }
}
