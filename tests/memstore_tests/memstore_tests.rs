//! Tests for the multi-version store
//!
//! These tests verify:
//! - Put/Get/Delete round trips
//! - Version visibility through snapshots
//! - Snapshot reference counting
//! - Iterator positioning
//! - Concurrent writers and snapshot readers

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use stratakv::byte_item::{byte_item_key_compare, ByteItem};
use stratakv::config::StoreConfig;
use stratakv::memstore::{Item, Snapshot, Store};

// =============================================================================
// Helper Functions
// =============================================================================

fn byte_store() -> Arc<Store> {
    let mut store = Store::with_config(StoreConfig {
        background_gc: false,
    });
    store.set_key_comparator(byte_item_key_compare);
    Arc::new(store)
}

fn kv(key: &[u8], value: &[u8]) -> Item {
    Item::new(ByteItem::new(key, value).unwrap().into_bytes())
}

fn query(key: &[u8]) -> Item {
    Item::new(ByteItem::key_only(key).unwrap().into_bytes())
}

fn value_of(item: &Item) -> Vec<u8> {
    ByteItem::from_bytes(item.data().clone())
        .unwrap()
        .value()
        .to_vec()
}

fn scan(snap: &Arc<Snapshot>) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut out = Vec::new();
    let mut iter = snap.new_iterator().unwrap();
    iter.seek_first();
    while let Some(item) = iter.get() {
        let blob = ByteItem::from_bytes(item.data().clone()).unwrap();
        out.push((blob.key().to_vec(), blob.value().to_vec()));
        iter.next();
    }
    out
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_put_get_round_trip() {
    let store = byte_store();
    let mut w = store.new_writer();

    let cases: [(&[u8], &[u8]); 4] = [
        (b"plain", b"value"),
        (b"empty-value", b""),
        (&[0, 255, 7], &[1, 2, 3, 0]),
        (b"k", b"a much longer value than the key itself"),
    ];
    for (key, value) in cases {
        w.put(kv(key, value));
    }
    for (key, value) in cases {
        let item = w.get(&query(key)).unwrap();
        assert_eq!(value_of(&item), value);
    }
    assert_eq!(store.items_count(), 4);
}

#[test]
fn test_get_missing_key() {
    let store = byte_store();
    let mut w = store.new_writer();
    w.put(kv(b"present", b"1"));

    assert!(w.get(&query(b"absent")).is_none());
    assert!(w.get(&query(b"pres")).is_none());
}

#[test]
fn test_overwrite_keeps_one_alive_version() {
    let store = byte_store();
    let mut w = store.new_writer();

    w.put(kv(b"a", b"1"));
    w.put(kv(b"a", b"2"));
    w.put(kv(b"a", b"3"));

    assert_eq!(value_of(&w.get(&query(b"a")).unwrap()), b"3");
    assert_eq!(store.items_count(), 1);
    // Same sequence number: replaced in place
    assert_eq!(store.version_count(), 1);
}

#[test]
fn test_overwrite_after_snapshot_keeps_old_version() {
    let store = byte_store();
    let mut w = store.new_writer();

    w.put(kv(b"a", b"1"));
    let snap = store.new_snapshot();
    w.put(kv(b"a", b"2"));

    assert_eq!(store.items_count(), 1);
    assert_eq!(store.version_count(), 2);
    assert_eq!(value_of(&snap.get(&query(b"a")).unwrap()), b"1");
    snap.close();
}

#[test]
fn test_delete_is_idempotent() {
    let store = byte_store();
    let mut w = store.new_writer();
    w.put(kv(b"a", b"1"));
    w.put(kv(b"b", b"1"));

    assert!(w.delete(&query(b"a")));
    assert_eq!(store.items_count(), 1);

    assert!(!w.delete(&query(b"a")));
    assert!(!w.delete(&query(b"never")));
    assert_eq!(store.items_count(), 1);
    assert!(w.get(&query(b"a")).is_none());
    assert!(w.get(&query(b"b")).is_some());
}

#[test]
fn test_delete_after_overwrite_hides_key() {
    let store = byte_store();
    let mut w = store.new_writer();

    w.put(kv(b"a", b"1"));
    let snap = store.new_snapshot();
    w.put(kv(b"a", b"2"));
    // Born at the current sequence number, so it is unlinked outright
    assert!(w.delete(&query(b"a")));

    assert!(w.get(&query(b"a")).is_none());
    assert!(!w.delete(&query(b"a")));
    assert_eq!(store.items_count(), 0);
    assert_eq!(value_of(&snap.get(&query(b"a")).unwrap()), b"1");
    snap.close();
}

#[test]
fn test_put_after_delete_revives_key() {
    let store = byte_store();
    let mut w = store.new_writer();

    w.put(kv(b"a", b"1"));
    let snap = store.new_snapshot();
    assert!(w.delete(&query(b"a")));
    w.put(kv(b"a", b"2"));

    assert_eq!(value_of(&w.get(&query(b"a")).unwrap()), b"2");
    assert_eq!(store.items_count(), 1);
    snap.close();
}

#[test]
fn test_default_comparator_fixed_width_keys() {
    let store = Arc::new(Store::new());
    let mut w = store.new_writer();

    for key in ["k3", "k1", "k2"] {
        w.put(Item::new(key));
    }
    assert!(w.get(&Item::new("k2")).is_some());
    assert!(w.get(&Item::new("k4")).is_none());

    let mut iter = store.new_iterator(None).unwrap();
    iter.seek_first();
    let mut keys = Vec::new();
    while let Some(item) = iter.get() {
        keys.push(item.bytes().to_vec());
        iter.next();
    }
    assert_eq!(keys, vec![b"k1".to_vec(), b"k2".to_vec(), b"k3".to_vec()]);
}

// =============================================================================
// Snapshot Tests
// =============================================================================

#[test]
fn test_concrete_scenario() {
    let store = byte_store();
    let mut w = store.new_writer();

    w.put(kv(b"a", b"1"));
    assert_eq!(store.current_sn(), 1);

    let s1 = store.new_snapshot();
    assert_eq!(s1.sn(), 1);
    assert_eq!(store.current_sn(), 2);

    w.put(kv(b"a", b"2"));
    assert_eq!(value_of(&w.get(&query(b"a")).unwrap()), b"2");
    assert_eq!(scan(&s1), vec![(b"a".to_vec(), b"1".to_vec())]);

    // Pin sn 2 so the delete is recorded as a death at 3
    let s2 = store.new_snapshot();
    let latest = w.get(&query(b"a")).unwrap();
    assert!(w.delete(&query(b"a")));
    assert_eq!(latest.dead_sn(), 3);

    assert_eq!(scan(&s1), vec![(b"a".to_vec(), b"1".to_vec())]);
    assert_eq!(scan(&s2), vec![(b"a".to_vec(), b"2".to_vec())]);
    assert!(w.get(&query(b"a")).is_none());

    // No snapshot references sn <= 1 once both are closed
    s1.close();
    s2.close();
    assert!(store.get_snapshots().is_empty());
    assert_eq!(store.version_count(), 1);

    let mut iter = store.new_iterator(None).unwrap();
    iter.seek_first();
    assert!(!iter.valid());
}

#[test]
fn test_snapshot_isolation() {
    let store = byte_store();
    let mut w = store.new_writer();
    for i in 0..10u8 {
        w.put(kv(&[b'k', i], &[i]));
    }

    let snap = store.new_snapshot();
    assert_eq!(snap.count(), 10);
    let before = scan(&snap);

    for i in 0..10u8 {
        if i % 2 == 0 {
            assert!(w.delete(&query(&[b'k', i])));
        } else {
            w.put(kv(&[b'k', i], b"changed"));
        }
    }
    w.put(kv(b"new", b"key"));

    assert_eq!(scan(&snap), before);
    assert_eq!(store.items_count(), 6);
    snap.close();
}

#[test]
fn test_snapshot_get_resolves_visible_version() {
    let store = byte_store();
    let mut w = store.new_writer();

    w.put(kv(b"a", b"v1"));
    let s1 = store.new_snapshot();
    w.put(kv(b"a", b"v2"));
    let s2 = store.new_snapshot();
    w.put(kv(b"a", b"v3"));

    assert_eq!(value_of(&s1.get(&query(b"a")).unwrap()), b"v1");
    assert_eq!(value_of(&s2.get(&query(b"a")).unwrap()), b"v2");
    assert!(s1.get(&query(b"b")).is_none());

    s1.close();
    s2.close();
}

#[test]
fn test_snapshot_reference_counting() {
    let store = byte_store();
    let snap = store.new_snapshot();
    assert_eq!(snap.ref_count(), 1);
    assert_eq!(store.get_snapshots().len(), 1);

    assert!(snap.open());
    assert_eq!(snap.ref_count(), 2);

    snap.close();
    assert_eq!(snap.ref_count(), 1);
    assert_eq!(store.get_snapshots().len(), 1);

    snap.close();
    assert!(store.get_snapshots().is_empty());

    assert!(!snap.open());
    assert!(snap.new_iterator().is_none());
}

#[test]
fn test_iterator_holds_snapshot_open() {
    let store = byte_store();
    let snap = store.new_snapshot();
    let iter = snap.new_iterator().unwrap();
    assert_eq!(snap.ref_count(), 2);

    snap.close();
    assert_eq!(store.get_snapshots().len(), 1);

    drop(iter);
    assert!(store.get_snapshots().is_empty());
}

#[test]
fn test_iterator_close_releases_snapshot() {
    let store = byte_store();
    let snap = store.new_snapshot();
    let iter = snap.new_iterator().unwrap();

    iter.close();
    assert_eq!(snap.ref_count(), 1);
    snap.close();
}

#[test]
fn test_snapshots_listed_in_order() {
    let store = byte_store();
    let a = store.new_snapshot();
    let b = store.new_snapshot();
    let c = store.new_snapshot();

    let sns: Vec<u32> = store.get_snapshots().iter().map(|s| s.sn()).collect();
    assert_eq!(sns, vec![a.sn(), b.sn(), c.sn()]);
    assert!(a.sn() < b.sn() && b.sn() < c.sn());

    b.close();
    let sns: Vec<u32> = store.get_snapshots().iter().map(|s| s.sn()).collect();
    assert_eq!(sns, vec![a.sn(), c.sn()]);

    a.close();
    c.close();
}

// =============================================================================
// Iterator Tests
// =============================================================================

#[test]
fn test_iterator_seek() {
    let store = byte_store();
    let mut w = store.new_writer();
    for key in [b"apple", b"berry", b"cherr", b"dates"] {
        w.put(kv(key, b"x"));
    }
    assert!(w.delete(&query(b"cherr")));

    let mut iter = store.new_iterator(None).unwrap();
    iter.seek(&query(b"b"));
    let item = iter.get().unwrap();
    assert_eq!(ByteItem::from_bytes(item.data().clone()).unwrap().key(), b"berry");

    // Deleted keys are skipped
    iter.seek(&query(b"c"));
    let item = iter.get().unwrap();
    assert_eq!(ByteItem::from_bytes(item.data().clone()).unwrap().key(), b"dates");

    iter.next();
    assert!(!iter.valid());

    iter.seek(&query(b"zzz"));
    assert!(iter.get().is_none());
}

#[test]
fn test_dump_stats_mentions_counters() {
    let store = byte_store();
    let mut w = store.new_writer();
    w.put(kv(b"a", b"1"));

    let stats = store.dump_stats();
    assert!(stats.contains("items_count"));
    assert!(stats.contains("current_sn"));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers_disjoint_keys() {
    const THREADS: u32 = 8;
    const PER_THREAD: u32 = 1_000;

    let store = byte_store();
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut w = store.new_writer();
                for i in 0..PER_THREAD {
                    let key = format!("key-{:02}-{:05}", t, i);
                    w.put(kv(key.as_bytes(), &i.to_le_bytes()));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.items_count(), (THREADS * PER_THREAD) as i64);
    assert!(store.is_well_formed());

    let mut w = store.new_writer();
    for t in 0..THREADS {
        for i in (0..PER_THREAD).step_by(97) {
            let key = format!("key-{:02}-{:05}", t, i);
            let item = w.get(&query(key.as_bytes())).unwrap();
            assert_eq!(value_of(&item), i.to_le_bytes());
        }
    }
}

/// One thread keeps overwriting a single key while another reads it through
/// `get` and through an unregistered iterator. The key exists throughout, so
/// neither may ever come back empty.
fn overwrite_while_reading(take_snapshots: bool) {
    const PUTS: u32 = 20_000;

    let store = byte_store();
    store.new_writer().put(kv(b"hot", &0u32.to_le_bytes()));
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let store = Arc::clone(&store);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut w = store.new_writer();
            for i in 1..=PUTS {
                w.put(kv(b"hot", &i.to_le_bytes()));
                if take_snapshots && i % 100 == 0 {
                    store.new_snapshot().close();
                }
            }
            done.store(true, Ordering::Release);
        })
    };

    let reader = {
        let store = Arc::clone(&store);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut w = store.new_writer();
            let mut reads = 0u64;
            while !done.load(Ordering::Acquire) || reads == 0 {
                assert!(w.get(&query(b"hot")).is_some(), "get lost the key");

                let mut iter = store.new_iterator(None).unwrap();
                iter.seek(&query(b"hot"));
                let item = iter.get().expect("scan lost the key");
                let blob = ByteItem::from_bytes(item.data().clone()).unwrap();
                assert_eq!(blob.key(), b"hot");
                reads += 1;
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();

    let mut w = store.new_writer();
    assert_eq!(value_of(&w.get(&query(b"hot")).unwrap()), PUTS.to_le_bytes());
    assert_eq!(store.items_count(), 1);
    assert!(store.is_well_formed());
}

#[test]
fn test_overwrite_never_hides_key_at_same_sn() {
    overwrite_while_reading(false);
}

#[test]
fn test_overwrite_never_hides_key_across_snapshots() {
    overwrite_while_reading(true);
}

#[test]
fn test_snapshot_stable_under_concurrent_writes() {
    const KEYS: u8 = 64;

    let store = byte_store();
    {
        let mut w = store.new_writer();
        for i in 0..KEYS {
            w.put(kv(&[b'k', i], b"initial"));
        }
    }
    let snap = store.new_snapshot();
    let expected = scan(&snap);
    assert_eq!(expected.len(), KEYS as usize);

    let writers: Vec<_> = (0..4u8)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut w = store.new_writer();
                for round in 0..50u8 {
                    for i in 0..KEYS {
                        if (i + round) % 5 == t {
                            w.delete(&query(&[b'k', i]));
                        } else {
                            w.put(kv(&[b'k', i], &[t, round]));
                        }
                    }
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let snap = Arc::clone(&snap);
            let expected = expected.clone();
            thread::spawn(move || {
                for _ in 0..20 {
                    assert_eq!(scan(&snap), expected);
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }

    assert_eq!(scan(&snap), expected);
    snap.close();
    assert!(store.is_well_formed());

    // Every key resolves to at most one alive version
    let mut seen = HashMap::new();
    let mut iter = store.new_iterator(None).unwrap();
    iter.seek_first();
    while let Some(item) = iter.get() {
        let key = ByteItem::from_bytes(item.data().clone()).unwrap().key().to_vec();
        *seen.entry(key).or_insert(0) += 1;
        iter.next();
    }
    assert!(seen.values().all(|&n| n == 1));
}
