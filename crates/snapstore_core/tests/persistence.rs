//! On-disk stores: reopen, locking and configuration.

use snapstore_core::{CoreError, Store, StoreConfig};
use tempfile::tempdir;

#[test]
fn data_survives_reopen() {
    let dir = tempdir().unwrap();

    {
        let store = Store::open(dir.path()).unwrap();
        store.put(b"a", b"1").unwrap();
        store.put(b"b", b"2").unwrap();
        let mut batch = store.batch();
        batch.delete(b"a").put(b"c", b"3");
        batch.commit().unwrap();
        store.close().unwrap();
    }

    let store = Store::open(dir.path()).unwrap();
    assert_eq!(store.get(b"a").unwrap(), None);
    assert_eq!(
        store.scan(b"", 0).unwrap(),
        vec![
            (b"b".to_vec(), b"2".to_vec()),
            (b"c".to_vec(), b"3".to_vec()),
        ]
    );
}

#[test]
fn path_is_resolved_to_absolute() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path().join("db")).unwrap();
    assert!(store.path().is_absolute());
    assert!(store.path().ends_with("db"));
}

#[test]
fn second_open_on_same_path_fails() {
    let dir = tempdir().unwrap();
    let _store = Store::open(dir.path()).unwrap();

    let err = Store::open(dir.path()).unwrap_err();
    assert!(matches!(err, CoreError::EngineOpen { .. }));
}

#[test]
fn path_freed_after_close() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    store.close().unwrap();

    let again = Store::open(dir.path()).unwrap();
    again.close().unwrap();
}

#[test]
fn missing_path_without_create_fails() {
    let dir = tempdir().unwrap();
    let config = StoreConfig::new().create_if_missing(false);

    let err = Store::open_with_config(dir.path().join("absent"), config).unwrap_err();
    match err {
        CoreError::EngineOpen { path, .. } => assert!(path.ends_with("absent")),
        other => panic!("expected EngineOpen, got {other:?}"),
    }
}

#[test]
fn unsynced_writes_still_persist_on_close() {
    let dir = tempdir().unwrap();
    let config = StoreConfig::new().sync_on_write(false);

    {
        let store = Store::open_with_config(dir.path(), config.clone()).unwrap();
        for i in 0..50u32 {
            store.put(&i.to_be_bytes(), b"x").unwrap();
        }
        store.close().unwrap();
    }

    let store = Store::open_with_config(dir.path(), config).unwrap();
    assert_eq!(store.scan(b"", 0).unwrap().len(), 50);
}
