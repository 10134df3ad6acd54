//! Writers
//!
//! A writer carries the scratch space every index operation needs. It is
//! `Send` but deliberately not shareable: all operations take `&mut self`.

use std::mem;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam::epoch;

use super::item::Item;
use super::store::Store;
use crate::skiplist::{ActionBuffer, Cursor};

pub struct Writer {
    store: Arc<Store>,
    buf: ActionBuffer<Arc<Item>>,
    rng: fastrand::Rng,
    /// Versions of one key, reused across puts
    run: Vec<Arc<Item>>,
}

impl Writer {
    pub(crate) fn new(store: Arc<Store>) -> Self {
        let buf = store.index.make_buf();
        Self {
            store,
            buf,
            rng: fastrand::Rng::new(),
            run: Vec::new(),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Insert `item` as the newest version of its key.
    ///
    /// The new version is linked before any older one is retired, so the key
    /// never lacks an alive version while the put is in flight.
    pub fn put(&mut self, item: Item) {
        let mut item = item;
        item.born_sn = self.store.current_sn();
        item.seq = self.store.next_item_seq();
        let item = Arc::new(item);

        let insert_cmp = self.store.insert_cmp();
        let inserted = self
            .store
            .index
            .insert(Arc::clone(&item), &insert_cmp, &mut self.buf, &mut self.rng)
            .is_ok();
        debug_assert!(inserted, "insertion sequence numbers are unique");
        if !inserted {
            return;
        }

        let retired = self.retire_older(&item);
        self.store
            .count
            .fetch_add(1 - retired as i64, Ordering::AcqRel);
    }

    /// Supersede every alive version of `item`'s key that sits before the
    /// newest one. Returns how many this writer retired.
    fn retire_older(&mut self, item: &Item) -> usize {
        let mut run = mem::take(&mut self.run);
        self.collect_versions(item, &mut run);

        let mut retired = 0;
        if let Some((newest, older)) = run.split_last() {
            for old in older {
                if old.is_alive() && self.supersede(old, newest) {
                    retired += 1;
                }
            }
        }

        run.clear();
        self.run = run;
        retired
    }

    /// Retire `old` in favour of `newest`. A version born at the same
    /// sequence number was never observable on its own and is unlinked.
    fn supersede(&mut self, old: &Arc<Item>, newest: &Item) -> bool {
        if !old.mark_superseded(newest.born_sn) {
            return false;
        }
        if old.born_sn == newest.born_sn {
            let insert_cmp = self.store.insert_cmp();
            self.store.index.delete(old, &insert_cmp, &mut self.buf);
        }
        true
    }

    /// Every version of the query's key, oldest first.
    fn collect_versions(&mut self, query: &Item, out: &mut Vec<Arc<Item>>) {
        let guard = &epoch::pin();
        let store = &*self.store;
        let query_cmp = store.key_query_cmp();
        let insert_cmp = store.insert_cmp();

        let mut cursor = Cursor::new();
        store
            .index
            .cursor_seek(&mut cursor, query, &query_cmp, &mut self.buf, guard);

        while let Some(item) = store.index.cursor_get(&cursor, guard) {
            if !store.same_key(item, query) {
                break;
            }
            out.push(Arc::clone(item));
            store
                .index
                .cursor_next(&mut cursor, &insert_cmp, &mut self.buf, guard);
        }
    }

    /// Newest version of the query's key, alive or not.
    fn latest(&mut self, query: &Item) -> Option<Arc<Item>> {
        let guard = &epoch::pin();
        let store = &*self.store;
        let query_cmp = store.key_query_cmp();
        let insert_cmp = store.insert_cmp();

        let mut cursor = Cursor::new();
        store
            .index
            .cursor_seek(&mut cursor, query, &query_cmp, &mut self.buf, guard);

        let mut latest = None;
        while let Some(item) = store.index.cursor_get(&cursor, guard) {
            if !store.same_key(item, query) {
                break;
            }
            latest = Some(item);
            store
                .index
                .cursor_next(&mut cursor, &insert_cmp, &mut self.buf, guard);
        }
        latest.cloned()
    }

    /// Newest alive version of the query's key.
    pub fn get(&mut self, query: &Item) -> Option<Arc<Item>> {
        let mut seen: Option<Arc<Item>> = None;
        loop {
            let latest = self.latest(query)?;
            if latest.is_alive() {
                return Some(latest);
            }
            if !latest.is_superseded() {
                return None;
            }
            // Its successor was linked before it was retired. Seeing the same
            // version twice means that successor has since been deleted.
            if seen.map_or(false, |prev| Arc::ptr_eq(&prev, &latest)) {
                return None;
            }
            seen = Some(latest);
        }
    }

    /// Delete the query's key as of the current sequence number.
    ///
    /// Returns `false` if the key has no alive version or a concurrent writer
    /// retired it first.
    pub fn delete(&mut self, query: &Item) -> bool {
        let latest = match self.get(query) {
            Some(latest) => latest,
            None => return false,
        };

        let sn = self.store.current_sn();
        if !latest.mark_dead(sn) {
            return false;
        }
        if latest.born_sn() == sn {
            let insert_cmp = self.store.insert_cmp();
            self.store.index.delete(&latest, &insert_cmp, &mut self.buf);
        }

        self.store.count.fetch_sub(1, Ordering::AcqRel);
        true
    }
}
