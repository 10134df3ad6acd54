//! Snapshots
//!
//! A snapshot pins a sequence number. It is reference counted by hand: every
//! `open` must be paired with a `close`, and the close that drops the count to
//! zero unregisters the snapshot and kicks off garbage collection.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Weak};

use super::item::Item;
use super::iterator::StoreIterator;
use super::store::Store;

#[derive(Debug)]
pub struct Snapshot {
    sn: u32,
    /// Tie-breaker so snapshots sharing a sequence number stay distinct
    id: u64,
    ref_count: AtomicI32,
    count: i64,
    store: Weak<Store>,
}

impl Snapshot {
    pub(crate) fn new(sn: u32, id: u64, count: i64, store: Weak<Store>) -> Self {
        Self {
            sn,
            id,
            ref_count: AtomicI32::new(1),
            count,
            store,
        }
    }

    pub(crate) fn order_key(&self) -> (u32, u64) {
        (self.sn, self.id)
    }

    pub fn sn(&self) -> u32 {
        self.sn
    }

    /// Alive items at the time the snapshot was taken
    pub fn count(&self) -> i64 {
        self.count
    }

    pub fn ref_count(&self) -> i32 {
        self.ref_count.load(Ordering::Acquire)
    }

    /// Take another reference. Fails once the snapshot has been fully closed.
    pub fn open(&self) -> bool {
        let mut current = self.ref_count.load(Ordering::Acquire);
        loop {
            if current <= 0 {
                return false;
            }
            match self.ref_count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn close(&self) {
        if self.ref_count.fetch_sub(1, Ordering::AcqRel) == 1 {
            if let Some(store) = self.store.upgrade() {
                store.release_snapshot(self);
            }
        }
    }

    /// Iterate the store as of this snapshot; `None` if already closed.
    pub fn new_iterator(self: &Arc<Self>) -> Option<StoreIterator> {
        let store = self.store.upgrade()?;
        store.new_iterator(Some(self))
    }

    /// Newest version of `query`'s key visible at this snapshot.
    pub fn get(self: &Arc<Self>, query: &Item) -> Option<Arc<Item>> {
        let mut iter = self.new_iterator()?;
        let store = self.store.upgrade()?;

        iter.seek(query);
        let mut latest = None;
        while let Some(item) = iter.get() {
            if !store.same_key(item, query) {
                break;
            }
            latest = Some(Arc::clone(item));
            iter.next();
        }
        latest
    }
}
