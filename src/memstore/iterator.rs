//! Store iterators
//!
//! Walk the item index and hide every version that is not visible at the
//! iterator's sequence number. An iterator keeps its snapshot open until it
//! is closed or dropped.
//!
//! Without a snapshot nothing pins the read horizon, so collection may
//! reclaim versions that were visible when the iterator was created. Such an
//! iterator reads at the current sequence number each time it moves.

use std::sync::Arc;

use crossbeam::epoch::{self, Guard};

use super::item::Item;
use super::snapshot::Snapshot;
use super::store::Store;
use crate::skiplist::{ActionBuffer, Cursor};

pub struct StoreIterator {
    store: Arc<Store>,
    /// `None` for an unregistered view that follows the current sequence number
    snap: Option<Arc<Snapshot>>,
    sn: u32,
    cursor: Cursor<Arc<Item>>,
    buf: ActionBuffer<Arc<Item>>,
    guard: Guard,
}

impl StoreIterator {
    pub(crate) fn new(store: Arc<Store>, snap: Option<Arc<Snapshot>>, sn: u32) -> Self {
        let buf = store.index.make_buf();
        Self {
            store,
            snap,
            sn,
            cursor: Cursor::new(),
            buf,
            guard: epoch::pin(),
        }
    }

    /// Sequence number this iterator reads at
    pub fn sn(&self) -> u32 {
        self.sn
    }

    fn skip_unwanted(&mut self) {
        let insert_cmp = self.store.insert_cmp();
        while let Some(item) = self.store.index.cursor_get(&self.cursor, &self.guard) {
            if self.snap.is_none() {
                self.sn = self.store.current_sn();
            }
            if item.is_visible_at(self.sn) {
                return;
            }
            self.store
                .index
                .cursor_next(&mut self.cursor, &insert_cmp, &mut self.buf, &self.guard);
        }
    }

    pub fn seek_first(&mut self) {
        self.store.index.cursor_seek_first(&mut self.cursor, &self.guard);
        self.skip_unwanted();
    }

    /// Position at the first visible version whose key is not less than the
    /// query's key.
    pub fn seek(&mut self, query: &Item) {
        let query_cmp = self.store.key_query_cmp();
        self.store
            .index
            .cursor_seek(&mut self.cursor, query, &query_cmp, &mut self.buf, &self.guard);
        self.skip_unwanted();
    }

    pub fn valid(&self) -> bool {
        self.cursor.valid()
    }

    pub fn get(&self) -> Option<&Arc<Item>> {
        self.store.index.cursor_get(&self.cursor, &self.guard)
    }

    pub fn next(&mut self) {
        let insert_cmp = self.store.insert_cmp();
        self.store
            .index
            .cursor_next(&mut self.cursor, &insert_cmp, &mut self.buf, &self.guard);
        self.skip_unwanted();
    }

    /// Release the snapshot reference. Dropping the iterator does the same.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(snap) = self.snap.take() {
            snap.close();
        }
    }
}

impl Drop for StoreIterator {
    fn drop(&mut self) {
        self.release();
    }
}
