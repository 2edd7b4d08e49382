//! Property tests against an in-memory model.

use proptest::prelude::*;
use snapstore_core::Store;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
enum Op {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
    Batch(Vec<(Vec<u8>, Option<Vec<u8>>)>),
    TakeSnapshot,
}

fn key() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop::sample::select(vec![b'a', b'b', b'c', b':']), 1..4)
}

fn value() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..8)
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (key(), value()).prop_map(|(k, v)| Op::Put(k, v)),
        2 => key().prop_map(Op::Delete),
        2 => prop::collection::vec((key(), prop::option::of(value())), 0..6).prop_map(Op::Batch),
        1 => Just(Op::TakeSnapshot),
    ]
}

fn model_scan(model: &BTreeMap<Vec<u8>, Vec<u8>>, prefix: &[u8], limit: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    let bound = if limit == 0 { usize::MAX } else { limit };
    model
        .iter()
        .filter(|(k, _)| k.starts_with(prefix))
        .take(bound)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

proptest! {
    #[test]
    fn store_matches_btreemap(ops in prop::collection::vec(op(), 1..60), prefix in key(), limit in 0usize..5) {
        let store = Store::open_in_memory().unwrap();
        let mut model = BTreeMap::new();

        for op in &ops {
            match op {
                Op::Put(k, v) => {
                    store.put(k, v).unwrap();
                    model.insert(k.clone(), v.clone());
                }
                Op::Delete(k) => {
                    store.delete(k).unwrap();
                    model.remove(k);
                }
                Op::Batch(entries) => {
                    let mut batch = store.batch();
                    for (k, v) in entries {
                        match v {
                            Some(v) => {
                                batch.put(k, v);
                                model.insert(k.clone(), v.clone());
                            }
                            None => {
                                batch.delete(k);
                                model.remove(k);
                            }
                        }
                    }
                    batch.commit().unwrap();
                }
                Op::TakeSnapshot => store.take_snapshot().unwrap(),
            }
        }

        for k in model.keys() {
            let stored = store.get(k).unwrap();
            prop_assert_eq!(stored.as_ref(), model.get(k));
        }
        let scanned = store.scan(&prefix, limit).unwrap();
        prop_assert_eq!(scanned, model_scan(&model, &prefix, limit));
        let everything = store.scan(b"", 0).unwrap();
        prop_assert_eq!(everything.len(), model.len());
    }

    #[test]
    fn lease_holds_view_from_acquisition(
        before in prop::collection::vec(op(), 0..30),
        after in prop::collection::vec(op(), 0..30),
    ) {
        let store = Store::open_in_memory().unwrap();
        let apply = |ops: &[Op]| {
            for op in ops {
                match op {
                    Op::Put(k, v) => store.put(k, v).unwrap(),
                    Op::Delete(k) => store.delete(k).unwrap(),
                    Op::Batch(entries) => {
                        let mut batch = store.batch();
                        for (k, v) in entries {
                            match v {
                                Some(v) => batch.put(k, v),
                                None => batch.delete(k),
                            };
                        }
                        batch.commit().unwrap();
                    }
                    Op::TakeSnapshot => store.take_snapshot().unwrap(),
                }
            }
        };

        apply(&before);
        store.take_snapshot().unwrap();
        let expected = store.scan(b"", 0).unwrap();
        let lease = store.get_snapshot().unwrap();

        apply(&after);
        let seen = lease.scan(b"", 0).unwrap();
        prop_assert_eq!(seen, expected);
        lease.release();
        prop_assert_eq!(store.stats().live_snapshots, 1);
    }
}
