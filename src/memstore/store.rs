//! Store implementation
//!
//! Owns the item index, the snapshot index and the shared counters.

use std::cmp::Ordering as CmpOrdering;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::utils::CachePadded;

use super::item::{default_key_compare, Item, KeyCompare};
use super::iterator::StoreIterator;
use super::snapshot::Snapshot;
use super::writer::Writer;
use crate::config::StoreConfig;
use crate::skiplist::{Skiplist, SkiplistIter};

/// Multi-version in-memory store
///
/// ## Sequence numbers
/// `curr_sn` starts at 1 and only moves forward when a snapshot is taken
/// (rollback aside). Writers stamp versions with the value they load, so all
/// writes between two snapshots share a sequence number.
///
/// ## Sharing
/// Configure the comparator first, then wrap the store in an `Arc`; writers,
/// snapshots and iterators are created from the `Arc`.
pub struct Store {
    pub(crate) index: Skiplist<Arc<Item>>,
    pub(crate) snapshots: Skiplist<Arc<Snapshot>>,

    curr_sn: CachePadded<AtomicU32>,
    pub(crate) count: CachePadded<AtomicI64>,
    next_snapshot_id: AtomicU64,
    next_item_seq: AtomicU64,

    pub(crate) last_gc_sn: AtomicU32,
    pub(crate) gc_running: AtomicBool,

    key_cmp: KeyCompare,
    pub(crate) config: StoreConfig,
}

impl Store {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            index: Skiplist::new(),
            snapshots: Skiplist::new(),
            curr_sn: CachePadded::new(AtomicU32::new(1)),
            count: CachePadded::new(AtomicI64::new(0)),
            next_snapshot_id: AtomicU64::new(1),
            next_item_seq: AtomicU64::new(1),
            last_gc_sn: AtomicU32::new(0),
            gc_running: AtomicBool::new(false),
            key_cmp: default_key_compare,
            config,
        }
    }

    /// Replace the key comparator. Only possible before the store is shared.
    pub fn set_key_comparator(&mut self, cmp: KeyCompare) {
        self.key_cmp = cmp;
    }

    pub fn key_comparator(&self) -> KeyCompare {
        self.key_cmp
    }

    pub fn current_sn(&self) -> u32 {
        self.curr_sn.load(Ordering::Acquire)
    }

    pub(crate) fn set_current_sn(&self, sn: u32) {
        self.curr_sn.store(sn, Ordering::Release);
    }

    pub(crate) fn next_item_seq(&self) -> u64 {
        self.next_item_seq.fetch_add(1, Ordering::Relaxed)
    }

    // =========================================================================
    // Orderings
    // =========================================================================

    /// Index order: key, then `born_sn`, then insertion order
    pub(crate) fn insert_cmp(&self) -> impl Fn(&Arc<Item>, &Arc<Item>) -> CmpOrdering {
        let key_cmp = self.key_cmp;
        move |this: &Arc<Item>, that: &Arc<Item>| {
            key_cmp(this.bytes(), that.bytes())
                .then(this.born_sn.cmp(&that.born_sn))
                .then(this.seq.cmp(&that.seq))
        }
    }

    /// Query order landing on the oldest version of the query's key
    pub(crate) fn key_query_cmp(&self) -> impl Fn(&Arc<Item>, &Item) -> CmpOrdering {
        let key_cmp = self.key_cmp;
        move |this: &Arc<Item>, query: &Item| {
            key_cmp(this.bytes(), query.bytes()).then(CmpOrdering::Greater)
        }
    }

    pub(crate) fn same_key(&self, this: &Item, that: &Item) -> bool {
        (self.key_cmp)(this.bytes(), that.bytes()) == CmpOrdering::Equal
    }

    // =========================================================================
    // Handles
    // =========================================================================

    pub fn new_writer(self: &Arc<Self>) -> Writer {
        Writer::new(Arc::clone(self))
    }

    /// Pin the current sequence number.
    ///
    /// The snapshot is registered before the counter moves, so a concurrent
    /// collection pass already sees it as the oldest horizon. If the counter
    /// moved while registering, a pass may have collected past `sn`; the
    /// registration is undone and retried at the new value.
    pub fn new_snapshot(self: &Arc<Self>) -> Arc<Snapshot> {
        let mut buf = self.snapshots.make_buf();
        let mut rng = fastrand::Rng::new();

        loop {
            let sn = self.current_sn();
            let id = self.next_snapshot_id.fetch_add(1, Ordering::Relaxed);
            let snap = Arc::new(Snapshot::new(sn, id, self.items_count(), Arc::downgrade(self)));

            let registered = self
                .snapshots
                .insert(Arc::clone(&snap), &snapshot_order, &mut buf, &mut rng)
                .is_ok();
            debug_assert!(registered, "snapshot ids are unique");

            if self
                .curr_sn
                .compare_exchange(sn, sn + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                tracing::trace!(sn, id, "snapshot created");
                return snap;
            }
            self.snapshots.delete(&*snap, &snapshot_query_order, &mut buf);
        }
    }

    /// Iterate through `snap`, or through an unregistered view that follows
    /// the current sequence number when `snap` is `None`.
    ///
    /// Returns `None` if `snap` has already been closed.
    pub fn new_iterator(self: &Arc<Self>, snap: Option<&Arc<Snapshot>>) -> Option<StoreIterator> {
        match snap {
            Some(snap) => {
                if !snap.open() {
                    return None;
                }
                Some(StoreIterator::new(Arc::clone(self), Some(Arc::clone(snap)), snap.sn()))
            }
            None => Some(StoreIterator::new(Arc::clone(self), None, self.current_sn())),
        }
    }

    /// Drop a snapshot whose last reference was closed.
    pub(crate) fn release_snapshot(self: &Arc<Self>, snap: &Snapshot) {
        let mut buf = self.snapshots.make_buf();
        if self.snapshots.delete(snap, &snapshot_query_order, &mut buf) {
            tracing::debug!(sn = snap.sn(), "snapshot released");
        }
        self.schedule_gc();
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Alive items; approximate while writers race on the same key
    pub fn items_count(&self) -> i64 {
        self.count.load(Ordering::Acquire)
    }

    /// Versions physically present in the index, alive or dead
    pub fn version_count(&self) -> usize {
        let mut versions = 0;
        let mut iter = SkiplistIter::new(&self.index, self.insert_cmp());
        iter.seek_first();
        while iter.valid() {
            versions += 1;
            iter.next();
        }
        versions
    }

    /// Registered snapshots in ascending sequence order
    pub fn get_snapshots(&self) -> Vec<Arc<Snapshot>> {
        let mut snaps = Vec::new();
        let mut iter = SkiplistIter::new(&self.snapshots, snapshot_order);
        iter.seek_first();
        while let Some(snap) = iter.get() {
            snaps.push(Arc::clone(snap));
            iter.next();
        }
        snaps
    }

    pub(crate) fn oldest_snapshot_sn(&self) -> Option<u32> {
        let mut iter = SkiplistIter::new(&self.snapshots, snapshot_order);
        iter.seek_first();
        iter.get().map(|snap| snap.sn())
    }

    /// Structural check of the item index (ordering and dangling marks)
    pub fn is_well_formed(&self) -> bool {
        self.index.is_well_formed(&self.insert_cmp())
    }

    /// Free-form diagnostic report
    pub fn dump_stats(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "items_count        = {}", self.items_count());
        let _ = writeln!(out, "current_sn         = {}", self.current_sn());
        let _ = writeln!(out, "last_gc_sn         = {}", self.last_gc_sn.load(Ordering::Acquire));
        let _ = writeln!(out, "snapshots          = {}", self.get_snapshots().len());
        let _ = write!(out, "{}", self.index.stats());
        out
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

fn snapshot_order(this: &Arc<Snapshot>, that: &Arc<Snapshot>) -> CmpOrdering {
    this.order_key().cmp(&that.order_key())
}

fn snapshot_query_order(this: &Arc<Snapshot>, query: &Snapshot) -> CmpOrdering {
    this.order_key().cmp(&query.order_key())
}
