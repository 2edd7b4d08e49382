//! The ordered key-value engine contract.

use crate::batch::WriteBatch;
use crate::error::EngineResult;
use crate::types::{KvPair, SequenceNumber, SnapshotId};

/// Iterator over owned key/value pairs in ascending key order.
///
/// An `Err` item ends the iteration. Dropping the iterator releases
/// whatever it holds.
pub type KvIter<'a> = Box<dyn Iterator<Item = EngineResult<KvPair>> + Send + 'a>;

/// A durable, sorted byte-string store.
///
/// # Invariants
///
/// - Keys iterate in ascending bytewise order
/// - `write_batch` is atomic: every operation becomes visible together, or
///   none does
/// - Snapshots observe exactly the writes committed before their creation
/// - Implementors must be `Send + Sync`; callers may share one engine
///   across threads
///
/// # Implementors
///
/// - [`crate::Engine`] - journaled MVCC engine, on disk or in memory
pub trait OrderedEngine: Send + Sync {
    /// Reads the latest value of `key`. `Ok(None)` means absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is closed or the read fails.
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>>;

    /// Writes `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is closed or the write fails.
    fn put(&self, key: &[u8], value: &[u8]) -> EngineResult<()>;

    /// Removes `key`. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is closed or the write fails.
    fn delete(&self, key: &[u8]) -> EngineResult<()>;

    /// Applies every operation of `batch` atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is closed or the write fails; in that
    /// case no operation of the batch took effect.
    fn write_batch(&self, batch: WriteBatch) -> EngineResult<()>;

    /// Iterates all keys starting with `prefix`, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the iterator cannot be created.
    fn iter_prefix(&self, prefix: &[u8]) -> EngineResult<KvIter<'_>>;

    /// Captures an immutable point-in-time view.
    ///
    /// The snapshot holds engine resources until
    /// [`EngineSnapshot::release`] is called (or it is dropped).
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is closed or cannot create snapshots.
    fn snapshot(&self) -> EngineResult<Box<dyn EngineSnapshot>>;

    /// Makes all writes durable and closes the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if already closed or the final sync fails.
    fn close(&self) -> EngineResult<()>;
}

/// A point-in-time view produced by [`OrderedEngine::snapshot`].
pub trait EngineSnapshot: Send + Sync {
    /// Unique identity of this snapshot.
    fn id(&self) -> SnapshotId;

    /// Sequence the snapshot reads at.
    fn sequence(&self) -> SequenceNumber;

    /// Reads `key` as of the snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the owning engine was closed.
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>>;

    /// Iterates keys starting with `prefix` as of the snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the owning engine was closed.
    fn iter_prefix(&self, prefix: &[u8]) -> EngineResult<KvIter<'_>>;

    /// Releases the snapshot's engine resources.
    fn release(self: Box<Self>);
}
