//! Skip list statistics
//!
//! Relaxed counters; a rendered report is only approximate under concurrency.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::MAX_LEVEL;

#[derive(Debug)]
pub struct SkiplistStats {
    inserts: AtomicU64,
    insert_conflicts: AtomicU64,
    soft_deletes: AtomicU64,
    read_conflicts: AtomicU64,
    node_allocs: AtomicU64,
    node_frees: AtomicU64,
    levels: Vec<AtomicU64>,
}

impl SkiplistStats {
    pub(crate) fn new() -> Self {
        Self {
            inserts: AtomicU64::new(0),
            insert_conflicts: AtomicU64::new(0),
            soft_deletes: AtomicU64::new(0),
            read_conflicts: AtomicU64::new(0),
            node_allocs: AtomicU64::new(0),
            node_frees: AtomicU64::new(0),
            levels: (0..=MAX_LEVEL).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    pub(crate) fn record_alloc(&self) {
        self.node_allocs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insert(&self, level: usize) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
        self.levels[level].fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insert_conflict(&self) {
        self.insert_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_soft_delete(&self) {
        self.soft_deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_read_conflict(&self) {
        self.read_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_free(&self, level: usize) {
        self.node_frees.fetch_add(1, Ordering::Relaxed);
        self.levels[level].fetch_sub(1, Ordering::Relaxed);
    }

    pub fn inserts(&self) -> u64 {
        self.inserts.load(Ordering::Relaxed)
    }

    pub fn soft_deletes(&self) -> u64 {
        self.soft_deletes.load(Ordering::Relaxed)
    }

    /// Nodes handed to the epoch collector so far
    pub fn node_frees(&self) -> u64 {
        self.node_frees.load(Ordering::Relaxed)
    }

    /// Nodes allocated and not yet handed to the epoch collector
    pub fn live_nodes(&self) -> u64 {
        self.node_allocs
            .load(Ordering::Relaxed)
            .saturating_sub(self.node_frees.load(Ordering::Relaxed))
    }
}

impl fmt::Display for SkiplistStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "inserts            = {}", self.inserts())?;
        writeln!(f, "insert_conflicts   = {}", self.insert_conflicts.load(Ordering::Relaxed))?;
        writeln!(f, "soft_deletes       = {}", self.soft_deletes())?;
        writeln!(f, "read_conflicts     = {}", self.read_conflicts.load(Ordering::Relaxed))?;
        writeln!(f, "node_allocs        = {}", self.node_allocs.load(Ordering::Relaxed))?;
        writeln!(f, "node_frees         = {}", self.node_frees())?;
        writeln!(f, "live_nodes         = {}", self.live_nodes())?;
        write!(f, "level_distribution =")?;
        for (level, count) in self.levels.iter().enumerate() {
            let count = count.load(Ordering::Relaxed);
            if count > 0 {
                write!(f, " L{}:{}", level, count)?;
            }
        }
        writeln!(f)
    }
}
