//! Garbage collection and rollback
//!
//! ## Watermark
//! The oldest registered snapshot (or, with none registered, the current
//! sequence number) bounds what any reader can still observe. A pass removes
//! every version that died at or before `oldest - 1`. Alive versions, and
//! versions that died later, are never touched.
//!
//! ## Single flight
//! `gc_running` admits one pass at a time. A close that loses the race skips
//! scheduling; the running pass or a later close picks up the work.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use super::item::Item;
use super::snapshot::Snapshot;
use super::store::Store;
use crate::skiplist::SkiplistIter;

impl Store {
    /// Run one collection pass on the calling thread.
    ///
    /// Returns the number of versions removed; 0 when another pass is already
    /// running or nothing new is collectable.
    pub fn gc(&self) -> usize {
        if !self.try_begin_gc() {
            return 0;
        }
        self.run_gc_pass()
    }

    /// Called when a snapshot's last reference goes away.
    pub(crate) fn schedule_gc(self: &Arc<Self>) {
        if !self.try_begin_gc() {
            return;
        }

        if !self.config.background_gc {
            self.run_gc_pass();
            return;
        }

        let store = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("memstore-gc".to_string())
            .spawn(move || {
                store.run_gc_pass();
            });
        if let Err(e) = spawned {
            tracing::warn!("Failed to spawn GC thread, collecting inline: {}", e);
            self.run_gc_pass();
        }
    }

    fn try_begin_gc(&self) -> bool {
        self.gc_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn run_gc_pass(&self) -> usize {
        let removed = self.collect_dead();
        self.gc_running.store(false, Ordering::Release);
        removed
    }

    fn collect_dead(&self) -> usize {
        // Read the counter first: a snapshot registered after this load pins
        // a sequence number no smaller than it.
        let current = self.current_sn();
        let oldest = self
            .oldest_snapshot_sn()
            .map_or(current, |sn| sn.min(current));
        if oldest <= 1 {
            return 0;
        }

        let watermark = oldest - 1;
        if self.last_gc_sn.load(Ordering::Acquire) == watermark {
            return 0;
        }
        self.last_gc_sn.store(watermark, Ordering::Release);

        let removed = self.remove_where(|item| {
            let dead_sn = item.dead_sn();
            dead_sn > 0 && dead_sn <= watermark
        });
        tracing::debug!(watermark, removed, "garbage collection pass finished");
        removed
    }

    /// Discard everything that happened after `snap` was taken.
    ///
    /// Versions born after the snapshot are removed. A version overwritten
    /// after the snapshot is revived, since its successor goes with the
    /// later versions. A version deleted after the snapshot is removed as
    /// well rather than revived.
    pub fn rollback(&self, snap: &Snapshot) {
        let sn = snap.sn();
        let insert_cmp = self.insert_cmp();
        let mut buf = self.index.make_buf();
        let mut iter = SkiplistIter::new(&self.index, self.insert_cmp());

        let mut removed = 0;
        let mut revived = 0;
        let mut alive = 0;
        iter.seek_first();
        while let Some(item) = iter.get() {
            let dead_sn = item.dead_sn();
            if item.born_sn() > sn || (dead_sn > sn && !item.revive()) {
                if self.index.delete(item, &insert_cmp, &mut buf) {
                    removed += 1;
                }
            } else if dead_sn > sn {
                revived += 1;
                alive += 1;
            } else if item.is_alive() {
                alive += 1;
            }
            iter.next();
        }

        self.set_current_sn(sn);
        self.last_gc_sn.store(sn.saturating_sub(1), Ordering::Release);
        self.count.store(alive, Ordering::Release);
        tracing::info!(sn, removed, revived, "store rolled back");
    }

    /// Physically delete every version matching `doomed`.
    fn remove_where<P>(&self, doomed: P) -> usize
    where
        P: Fn(&Item) -> bool,
    {
        let insert_cmp = self.insert_cmp();
        let mut buf = self.index.make_buf();
        let mut iter = SkiplistIter::new(&self.index, self.insert_cmp());

        let mut removed = 0;
        iter.seek_first();
        while let Some(item) = iter.get() {
            if doomed(&**item) && self.index.delete(item, &insert_cmp, &mut buf) {
                removed += 1;
            }
            iter.next();
        }
        removed
    }
}
