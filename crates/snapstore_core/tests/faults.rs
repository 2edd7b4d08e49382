//! Engine failures surfacing through the store.

use snapstore_core::{CoreError, Store};
use snapstore_engine::{
    Engine, EngineError, EngineResult, EngineSnapshot, KvIter, OrderedEngine, WriteBatch,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Faults {
    fail_snapshot: AtomicBool,
    fail_write: AtomicBool,
    fail_read: AtomicBool,
    /// Yield this many entries, then an error.
    fail_scan_after: Option<usize>,
    fail_close: AtomicBool,
    closes: AtomicUsize,
}

fn injected(what: &str) -> EngineError {
    EngineError::corrupted(format!("injected {what} failure"))
}

/// Delegates to an in-memory engine, failing on demand.
struct FaultyEngine {
    inner: Engine,
    faults: Arc<Faults>,
}

impl FaultyEngine {
    fn new(faults: Arc<Faults>) -> Self {
        Self {
            inner: Engine::open_in_memory().unwrap(),
            faults,
        }
    }

    fn check(&self, flag: &AtomicBool, what: &str) -> EngineResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(injected(what))
        } else {
            Ok(())
        }
    }
}

impl OrderedEngine for FaultyEngine {
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        self.check(&self.faults.fail_read, "read")?;
        self.inner.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> EngineResult<()> {
        self.check(&self.faults.fail_write, "write")?;
        self.inner.put(key, value)
    }

    fn delete(&self, key: &[u8]) -> EngineResult<()> {
        self.check(&self.faults.fail_write, "write")?;
        self.inner.delete(key)
    }

    fn write_batch(&self, batch: WriteBatch) -> EngineResult<()> {
        self.check(&self.faults.fail_write, "write")?;
        self.inner.write_batch(batch)
    }

    fn iter_prefix(&self, prefix: &[u8]) -> EngineResult<KvIter<'_>> {
        let iter = self.inner.iter_prefix(prefix)?;
        match self.faults.fail_scan_after {
            Some(n) => Ok(Box::new(
                iter.take(n)
                    .chain(std::iter::once(Err(injected("iterator")))),
            )),
            None => Ok(iter),
        }
    }

    fn snapshot(&self) -> EngineResult<Box<dyn EngineSnapshot>> {
        self.check(&self.faults.fail_snapshot, "snapshot")?;
        self.inner.snapshot()
    }

    fn close(&self) -> EngineResult<()> {
        self.faults.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close()?;
        self.check(&self.faults.fail_close, "close")
    }
}

fn faulty_store(faults: &Arc<Faults>) -> Store {
    Store::open_with_engine("faulty", Box::new(FaultyEngine::new(Arc::clone(faults)))).unwrap()
}

#[test]
fn open_closes_engine_when_initial_snapshot_fails() {
    let faults = Arc::new(Faults::default());
    faults.fail_snapshot.store(true, Ordering::SeqCst);

    let err = Store::open_with_engine("faulty", Box::new(FaultyEngine::new(Arc::clone(&faults))))
        .unwrap_err();

    assert!(matches!(err, CoreError::SnapshotCreate(_)));
    assert_eq!(faults.closes.load(Ordering::SeqCst), 1);
}

#[test]
fn failed_take_snapshot_keeps_current() {
    let faults = Arc::new(Faults::default());
    let store = faulty_store(&faults);
    let before = store.stats().current_sequence;

    store.put(b"k", b"v").unwrap();
    faults.fail_snapshot.store(true, Ordering::SeqCst);
    assert!(matches!(
        store.take_snapshot(),
        Err(CoreError::SnapshotCreate(_))
    ));

    let stats = store.stats();
    assert_eq!(stats.current_sequence, before);
    assert_eq!(stats.live_snapshots, 1);

    faults.fail_snapshot.store(false, Ordering::SeqCst);
    store.take_snapshot().unwrap();
    assert!(store.stats().current_sequence > before);
    store.close().unwrap();
}

#[test]
fn write_failure_leaves_store_usable() {
    let faults = Arc::new(Faults::default());
    let store = faulty_store(&faults);
    store.put(b"a", b"1").unwrap();

    faults.fail_write.store(true, Ordering::SeqCst);
    assert!(matches!(store.put(b"a", b"2"), Err(CoreError::EngineWrite(_))));
    assert!(matches!(store.delete(b"a"), Err(CoreError::EngineWrite(_))));
    let mut batch = store.batch();
    batch.put(b"b", b"1").put(b"c", b"1");
    assert!(matches!(batch.commit(), Err(CoreError::EngineWrite(_))));

    faults.fail_write.store(false, Ordering::SeqCst);
    assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(store.get(b"b").unwrap(), None);
    store.put(b"a", b"3").unwrap();
    assert_eq!(store.get(b"a").unwrap(), Some(b"3".to_vec()));
}

#[test]
fn empty_batch_skips_engine() {
    let faults = Arc::new(Faults::default());
    let store = faulty_store(&faults);
    faults.fail_write.store(true, Ordering::SeqCst);

    store.batch().commit().unwrap();
}

#[test]
fn read_failure_maps_to_engine_read() {
    let faults = Arc::new(Faults::default());
    let store = faulty_store(&faults);
    faults.fail_read.store(true, Ordering::SeqCst);

    let err = store.get(b"k").unwrap_err();
    assert!(matches!(err, CoreError::EngineRead(_)));
    assert!(!err.is_retryable());
}

#[test]
fn iterator_failure_discards_partial_scan() {
    let faults = Arc::new(Faults {
        fail_scan_after: Some(1),
        ..Faults::default()
    });
    let store = faulty_store(&faults);
    store.put(b"p:1", b"a").unwrap();
    store.put(b"p:2", b"b").unwrap();

    assert!(matches!(store.scan(b"p:", 0), Err(CoreError::Scan(_))));
    // The limit is met before the failing entry is reached.
    assert_eq!(store.scan(b"p:", 1).unwrap().len(), 1);
}

#[test]
fn engine_close_failure_still_closes_store() {
    let faults = Arc::new(Faults::default());
    let store = faulty_store(&faults);
    faults.fail_close.store(true, Ordering::SeqCst);

    assert!(matches!(store.close(), Err(CoreError::EngineClose(_))));
    assert!(store.is_closed());
    assert!(matches!(store.close(), Err(CoreError::AlreadyClosed)));
    assert_eq!(faults.closes.load(Ordering::SeqCst), 1);
}
