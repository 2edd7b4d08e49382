//! Atomic write batches bound to a store.

use crate::error::CoreResult;
use crate::store::Store;
use snapstore_engine::WriteBatch;

/// Pending put/delete operations that become visible together on
/// [`Batch::commit`].
///
/// Nothing touches the engine until commit; building a batch never fails.
///
/// # Example
///
/// ```rust
/// use snapstore_core::Store;
///
/// let store = Store::open_in_memory().unwrap();
/// let mut batch = store.batch();
/// batch.put(b"a", b"1").put(b"b", b"2").delete(b"a");
/// batch.commit().unwrap();
///
/// assert_eq!(store.get(b"a").unwrap(), None);
/// assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
/// ```
#[derive(Debug)]
pub struct Batch<'a> {
    store: &'a Store,
    ops: WriteBatch,
}

impl<'a> Batch<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self {
            store,
            ops: WriteBatch::new(),
        }
    }

    /// Queues a put.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> &mut Self {
        self.ops.put(key, value);
        self
    }

    /// Queues a delete.
    pub fn delete(&mut self, key: &[u8]) -> &mut Self {
        self.ops.delete(key);
        self
    }

    /// Number of queued operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Discards every queued operation.
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Applies every queued operation as one atomic engine write.
    ///
    /// # Errors
    ///
    /// - [`crate::CoreError::Closed`] if the store is closed
    /// - [`crate::CoreError::EngineWrite`] if the engine write fails, in
    ///   which case none of the operations took effect
    pub fn commit(self) -> CoreResult<()> {
        self.store.commit_batch(self.ops)
    }
}
