//! Snapshot and iterator handles over the MVCC table.

use crate::engine::EngineInner;
use crate::error::EngineResult;
use crate::traits::{EngineSnapshot, KvIter};
use crate::types::{KvPair, SequenceNumber, SnapshotId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

static NEXT_SNAPSHOT_ID: AtomicU64 = AtomicU64::new(1);

/// Snapshot pinned at a committed sequence.
///
/// The pin keeps every version the snapshot can see from being collected.
/// It is removed exactly once, when the snapshot is released or dropped.
pub struct MvccSnapshot {
    id: SnapshotId,
    seq: SequenceNumber,
    inner: Arc<EngineInner>,
}

impl MvccSnapshot {
    pub(crate) fn new(inner: Arc<EngineInner>) -> Self {
        let seq = inner.pin();
        let id = SnapshotId::new(NEXT_SNAPSHOT_ID.fetch_add(1, Ordering::Relaxed));
        trace!(%id, %seq, "snapshot pinned");
        Self { id, seq, inner }
    }
}

impl EngineSnapshot for MvccSnapshot {
    fn id(&self) -> SnapshotId {
        self.id
    }

    fn sequence(&self) -> SequenceNumber {
        self.seq
    }

    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        self.inner.read_at(key, self.seq)
    }

    fn iter_prefix(&self, prefix: &[u8]) -> EngineResult<KvIter<'_>> {
        self.inner.ensure_open()?;
        Ok(Box::new(PrefixIter::at(
            Arc::clone(&self.inner),
            prefix,
            self.inner.pin_at(self.seq),
        )))
    }

    fn release(self: Box<Self>) {
        drop(self);
    }
}

impl Drop for MvccSnapshot {
    fn drop(&mut self) {
        trace!(id = %self.id, seq = %self.seq, "snapshot released");
        self.inner.unpin(self.seq);
    }
}

impl std::fmt::Debug for MvccSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MvccSnapshot")
            .field("id", &self.id)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

/// Ascending iterator over one key prefix at a fixed sequence.
///
/// The iterator pins its sequence while alive and steps one key at a time
/// under a short read lock, so writers are never blocked for the length of
/// a scan.
pub struct PrefixIter {
    inner: Arc<EngineInner>,
    prefix: Vec<u8>,
    seq: SequenceNumber,
    last: Option<Vec<u8>>,
    done: bool,
}

impl PrefixIter {
    /// `seq` must already be pinned on behalf of this iterator.
    pub(crate) fn at(inner: Arc<EngineInner>, prefix: &[u8], seq: SequenceNumber) -> Self {
        Self {
            inner,
            prefix: prefix.to_vec(),
            seq,
            last: None,
            done: false,
        }
    }
}

impl Iterator for PrefixIter {
    type Item = EngineResult<KvPair>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self
            .inner
            .next_at(&self.prefix, self.last.as_deref(), self.seq)
        {
            Ok(Some(pair)) => {
                self.last = Some(pair.0.clone());
                Some(Ok(pair))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl Drop for PrefixIter {
    fn drop(&mut self) {
        self.inner.unpin(self.seq);
    }
}
