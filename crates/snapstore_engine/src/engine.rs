//! The journaled MVCC engine.

use crate::batch::{BatchOp, WriteBatch};
use crate::dir::EngineDir;
use crate::error::{EngineError, EngineResult};
use crate::journal::{FileDevice, Journal, JournalDevice, MemoryDevice};
use crate::memtable::MemTable;
use crate::options::EngineOptions;
use crate::record::JournalRecord;
use crate::snapshot::{MvccSnapshot, PrefixIter};
use crate::traits::{EngineSnapshot, KvIter, OrderedEngine};
use crate::types::{KvPair, SequenceNumber};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Point-in-time engine statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Last committed sequence.
    pub sequence: SequenceNumber,
    /// Keys with a live value.
    pub live_keys: usize,
    /// Stored versions, history and tombstones included.
    pub versions: usize,
    /// Outstanding pins held by snapshots and iterators.
    pub pins: usize,
    /// Journal size in bytes.
    pub journal_bytes: u64,
}

/// State shared by the engine, its snapshots and its iterators.
///
/// Lock order: `journal`, then `memtable`, then `pins`. `pins` is never held
/// while acquiring another lock.
pub(crate) struct EngineInner {
    _dir: Option<EngineDir>,
    journal: Mutex<Journal>,
    memtable: RwLock<MemTable>,
    committed: AtomicU64,
    pins: Mutex<BTreeMap<SequenceNumber, usize>>,
    closed: AtomicBool,
}

impl EngineInner {
    pub(crate) fn ensure_open(&self) -> EngineResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }

    fn committed(&self) -> SequenceNumber {
        SequenceNumber::new(self.committed.load(Ordering::Acquire))
    }

    /// Pins the current committed sequence.
    ///
    /// The sequence is read while holding the pin set, so a concurrent
    /// writer either sees this pin when it collects or has already
    /// published its own sequence, which is then the one pinned.
    pub(crate) fn pin(&self) -> SequenceNumber {
        let mut pins = self.pins.lock();
        let seq = self.committed();
        *pins.entry(seq).or_insert(0) += 1;
        seq
    }

    /// Adds another pin on a sequence that is already pinned.
    pub(crate) fn pin_at(&self, seq: SequenceNumber) -> SequenceNumber {
        *self.pins.lock().entry(seq).or_insert(0) += 1;
        seq
    }

    pub(crate) fn unpin(&self, seq: SequenceNumber) {
        let oldest_advanced = {
            let mut pins = self.pins.lock();
            let was_oldest = pins.keys().next() == Some(&seq);
            match pins.get_mut(&seq) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    false
                }
                Some(_) => {
                    pins.remove(&seq);
                    was_oldest
                }
                None => false,
            }
        };

        if oldest_advanced {
            let mut memtable = self.memtable.write();
            let oldest = self.oldest_pin();
            let removed = memtable.collect_garbage(oldest);
            if removed > 0 {
                debug!(removed, "collected versions after snapshot release");
            }
        }
    }

    fn oldest_pin(&self) -> Option<SequenceNumber> {
        self.pins.lock().keys().next().copied()
    }

    pub(crate) fn read_at(&self, key: &[u8], seq: SequenceNumber) -> EngineResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.memtable.read().get(key, seq))
    }

    pub(crate) fn next_at(
        &self,
        prefix: &[u8],
        after: Option<&[u8]>,
        seq: SequenceNumber,
    ) -> EngineResult<Option<KvPair>> {
        self.ensure_open()?;
        Ok(self.memtable.read().next_visible(prefix, after, seq))
    }

    fn commit(&self, ops: Vec<BatchOp>) -> EngineResult<()> {
        let mut journal = self.journal.lock();
        self.ensure_open()?;
        if ops.is_empty() {
            return Ok(());
        }

        let record = JournalRecord {
            sequence: self.committed().next(),
            ops,
        };
        journal.append(&record)?;

        let mut memtable = self.memtable.write();
        memtable.apply(record.sequence, &record.ops);
        self.committed
            .store(record.sequence.as_u64(), Ordering::Release);
        // Collect only after publishing the sequence; see `pin`.
        let oldest = self.oldest_pin();
        memtable.collect_touched(&record.ops, oldest);
        Ok(())
    }

    fn close(&self) -> EngineResult<()> {
        let mut journal = self.journal.lock();
        self.ensure_open()?;
        self.closed.store(true, Ordering::Release);
        journal.sync()
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            if let Err(e) = self.journal.get_mut().sync() {
                warn!(error = %e, "failed to sync journal on drop");
            }
        }
    }
}

/// Journaled, multi-version ordered key-value engine.
///
/// Every committed write is appended to a framed journal and then applied
/// to an in-memory ordered table that keeps one version chain per key.
/// Snapshots and iterators pin a sequence; versions are collected once no
/// pin can observe them.
///
/// # Example
///
/// ```rust
/// use snapstore_engine::{Engine, EngineSnapshot, OrderedEngine};
///
/// let engine = Engine::open_in_memory().unwrap();
/// engine.put(b"k", b"v1").unwrap();
/// let snap = engine.snapshot().unwrap();
/// engine.put(b"k", b"v2").unwrap();
///
/// assert_eq!(snap.get(b"k").unwrap(), Some(b"v1".to_vec()));
/// assert_eq!(engine.get(b"k").unwrap(), Some(b"v2".to_vec()));
/// snap.release();
/// ```
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Opens or creates an engine in directory `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be opened or locked, or if
    /// the journal cannot be read.
    pub fn open(path: &Path, options: EngineOptions) -> EngineResult<Self> {
        let dir = EngineDir::open(path, options.create_if_missing)?;
        let device = FileDevice::open(&dir.journal_path())?;
        debug!(path = %dir.path().display(), "opening engine");
        Self::build(Some(dir), Box::new(device), &options)
    }

    /// Opens an ephemeral engine whose journal lives in memory.
    ///
    /// # Errors
    ///
    /// Infallible in practice; the signature matches [`Engine::open`].
    pub fn open_in_memory() -> EngineResult<Self> {
        Self::with_device(Box::new(MemoryDevice::new()), EngineOptions::default())
    }

    /// Opens an engine over an arbitrary journal device, replaying its
    /// contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be read or repaired.
    pub fn with_device(device: Box<dyn JournalDevice>, options: EngineOptions) -> EngineResult<Self> {
        Self::build(None, device, &options)
    }

    fn build(
        dir: Option<EngineDir>,
        device: Box<dyn JournalDevice>,
        options: &EngineOptions,
    ) -> EngineResult<Self> {
        let mut journal = Journal::new(device, options.sync_on_write);
        let mut memtable = MemTable::new();
        let mut committed = SequenceNumber::default();

        for record in journal.replay()? {
            if record.sequence <= committed {
                return Err(EngineError::corrupted(format!(
                    "journal sequence went backwards: {} after {}",
                    record.sequence, committed
                )));
            }
            memtable.apply(record.sequence, &record.ops);
            committed = record.sequence;
        }
        memtable.collect_garbage(None);
        debug!(%committed, keys = memtable.live_keys(committed), "engine recovered");

        Ok(Self {
            inner: Arc::new(EngineInner {
                _dir: dir,
                journal: Mutex::new(journal),
                memtable: RwLock::new(memtable),
                committed: AtomicU64::new(committed.as_u64()),
                pins: Mutex::new(BTreeMap::new()),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Last committed sequence.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.inner.committed()
    }

    /// Returns true once [`OrderedEngine::close`] has succeeded.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Returns current statistics.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        let journal_bytes = self.inner.journal.lock().size();
        let memtable = self.inner.memtable.read();
        let sequence = self.inner.committed();
        EngineStats {
            sequence,
            live_keys: memtable.live_keys(sequence),
            versions: memtable.version_count(),
            pins: self.inner.pins.lock().values().sum(),
            journal_bytes,
        }
    }
}

impl OrderedEngine for Engine {
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        self.inner.read_at(key, SequenceNumber::new(u64::MAX))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> EngineResult<()> {
        self.inner.commit(vec![BatchOp::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        }])
    }

    fn delete(&self, key: &[u8]) -> EngineResult<()> {
        self.inner.commit(vec![BatchOp::Delete { key: key.to_vec() }])
    }

    fn write_batch(&self, batch: WriteBatch) -> EngineResult<()> {
        self.inner.commit(batch.into_ops())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> EngineResult<KvIter<'_>> {
        self.inner.ensure_open()?;
        let seq = self.inner.pin();
        Ok(Box::new(PrefixIter::at(Arc::clone(&self.inner), prefix, seq)))
    }

    fn snapshot(&self) -> EngineResult<Box<dyn EngineSnapshot>> {
        self.inner.ensure_open()?;
        Ok(Box::new(MvccSnapshot::new(Arc::clone(&self.inner))))
    }

    fn close(&self) -> EngineResult<()> {
        self.inner.close()?;
        debug!(sequence = %self.inner.committed(), "engine closed");
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("sequence", &self.sequence())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
