//! Skiplist Module
//!
//! Lock-free ordered index shared by every writer and reader of a store.
//!
//! ## Responsibilities
//! - Concurrent search, insert and delete without a structure-wide lock
//! - Logical delete (tagging successor links) followed by cooperative
//!   physical unlinking by whichever thread meets the marked node next
//! - Safe reclamation of unlinked nodes through `crossbeam::epoch`
//!
//! ## Ordering
//! The list never interprets its elements. Every operation takes the
//! comparator that defines the order, so the same structure backs both the
//! item index (key, then sequence number) and the snapshot index (sequence
//! number only).
//!
//! ## Reclamation
//! A node may still be linked at upper levels while its inserter is working
//! and while its deleter runs the cleanup search. Each of the two clears its
//! own bit in the node's link state; the thread that observes the other bit
//! already cleared hands the node to the epoch collector.

mod iter;
mod node;
mod stats;

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::epoch::{self, Guard, Owned, Shared};
use crossbeam::utils::CachePadded;

pub(crate) use iter::Cursor;
pub use iter::SkiplistIter;
pub use node::ActionBuffer;
pub use stats::SkiplistStats;

use node::{Node, LINKING, UNLINKED};

/// Highest level index a node can be linked at
pub const MAX_LEVEL: usize = 32;

/// Concurrent skip list
pub struct Skiplist<T> {
    head: Box<Node<T>>,

    /// Highest level currently in use
    level: CachePadded<AtomicUsize>,

    stats: SkiplistStats,
}

impl<T> Skiplist<T> {
    /// Create an empty skip list
    pub fn new() -> Self {
        Self {
            head: Box::new(Node::head()),
            level: CachePadded::new(AtomicUsize::new(0)),
            stats: SkiplistStats::new(),
        }
    }

    /// Allocate scratch space for operations on this list
    pub fn make_buf(&self) -> ActionBuffer<T> {
        ActionBuffer::new()
    }

    pub fn stats(&self) -> &SkiplistStats {
        &self.stats
    }

    fn head_ptr<'g>(&self) -> Shared<'g, Node<T>> {
        Shared::from(&*self.head as *const Node<T>)
    }

    /// Geometric level: one coin flip per additional level.
    fn random_level(rng: &mut fastrand::Rng) -> usize {
        let mut level = 0;
        while level < MAX_LEVEL && rng.bool() {
            level += 1;
        }
        level
    }

    /// Record the predecessor and successor of `query` at every level.
    ///
    /// Returns whether the level-0 successor compares equal to `query`.
    pub(crate) fn find_path<'g, Q, F>(
        &self,
        query: &Q,
        cmp: &F,
        buf: &mut ActionBuffer<T>,
        guard: &'g Guard,
    ) -> bool
    where
        Q: ?Sized,
        F: Fn(&T, &Q) -> CmpOrdering,
    {
        self.search(query, cmp, None, buf, guard)
    }

    /// Search shared by lookups and unlink cleanup.
    ///
    /// With a `target`, equal elements other than the target are walked past,
    /// so the search reaches the target wherever it sits in a run of equals.
    fn search<'g, Q, F>(
        &self,
        query: &Q,
        cmp: &F,
        target: Option<Shared<'g, Node<T>>>,
        buf: &mut ActionBuffer<T>,
        guard: &'g Guard,
    ) -> bool
    where
        Q: ?Sized,
        F: Fn(&T, &Q) -> CmpOrdering,
    {
        'retry: loop {
            let mut prev = self.head_ptr();
            let mut ord = CmpOrdering::Greater;
            let top = self.level.load(Ordering::Acquire);

            for level in (0..=top).rev() {
                // SAFETY: `prev` is the head or a node reached under `guard`.
                let mut curr = unsafe { prev.deref() }.get_next(level, guard).0;

                loop {
                    // SAFETY: non-null links point at nodes protected by `guard`.
                    let curr_ref = match unsafe { curr.as_ref() } {
                        Some(node) => node,
                        None => {
                            ord = CmpOrdering::Greater;
                            break;
                        }
                    };

                    let (next, deleted) = curr_ref.get_next(level, guard);
                    if deleted {
                        if !self.help_delete(level, prev, curr, next, guard) {
                            self.stats.record_read_conflict();
                            continue 'retry;
                        }
                        // SAFETY: as above.
                        curr = unsafe { prev.deref() }.get_next(level, guard).0;
                        continue;
                    }

                    ord = cmp(curr_ref.elem(), query);
                    let walk_past = match ord {
                        CmpOrdering::Less => true,
                        CmpOrdering::Equal => target.map_or(false, |t| t != curr),
                        CmpOrdering::Greater => false,
                    };
                    if !walk_past {
                        break;
                    }
                    prev = curr;
                    curr = next;
                }

                buf.preds[level] = prev.as_raw();
                buf.succs[level] = curr.as_raw();
            }

            return ord == CmpOrdering::Equal;
        }
    }

    /// Swing `prev` past a marked `curr`.
    fn help_delete<'g>(
        &self,
        level: usize,
        prev: Shared<'g, Node<T>>,
        curr: Shared<'g, Node<T>>,
        next: Shared<'g, Node<T>>,
        guard: &'g Guard,
    ) -> bool {
        // SAFETY: `prev` is the head or a node protected by `guard`.
        unsafe { prev.deref() }.cas_next(level, curr, next, false, false, guard)
    }

    /// Insert `elem` at the position defined by `cmp`.
    ///
    /// An element comparing equal to one already present is handed back.
    pub fn insert<F>(
        &self,
        elem: T,
        cmp: &F,
        buf: &mut ActionBuffer<T>,
        rng: &mut fastrand::Rng,
    ) -> Result<(), T>
    where
        F: Fn(&T, &T) -> CmpOrdering,
    {
        let guard = &epoch::pin();
        let level = Self::random_level(rng);
        self.level.fetch_max(level, Ordering::AcqRel);

        let node = Owned::new(Node::new(elem, level)).into_shared(guard);
        // SAFETY: freshly allocated; only this call can free it before publication.
        let node_ref = unsafe { node.deref() };

        loop {
            if self.find_path(node_ref.elem(), cmp, buf, guard) {
                // SAFETY: the node was never published.
                let owned = unsafe { node.into_owned() };
                return Err(owned.into_box().into_elem());
            }

            for i in 0..=level {
                node_ref.set_next(i, buf.succ(i));
            }

            // SAFETY: predecessors are the head or nodes protected by `guard`.
            let pred = unsafe { buf.pred(0).deref() };
            if pred.cas_next(0, buf.succ(0), node, false, false, guard) {
                break;
            }
            self.stats.record_insert_conflict();
        }

        self.stats.record_alloc();
        self.stats.record_insert(level);

        'levels: for i in 1..=level {
            loop {
                let (node_next, deleted) = node_ref.get_next(i, guard);
                let next = buf.succ(i);
                if deleted
                    || (node_next != next
                        && !node_ref.cas_next(i, node_next, next, false, false, guard))
                {
                    break 'levels;
                }

                // SAFETY: as above.
                let pred = unsafe { buf.pred(i).deref() };
                if pred.cas_next(i, next, node, false, false, guard) {
                    break;
                }
                self.stats.record_insert_conflict();
                self.find_path(node_ref.elem(), cmp, buf, guard);
            }
        }

        // A delete may have raced with the upper-level links.
        if (0..=level).any(|i| node_ref.is_marked(i, guard)) {
            self.search(node_ref.elem(), cmp, Some(node), buf, guard);
        }

        if node_ref.state.fetch_and(!LINKING, Ordering::AcqRel) & UNLINKED != 0 {
            self.retire(node, guard);
        }

        Ok(())
    }

    /// Delete the element comparing equal to `query`.
    ///
    /// Returns `false` when nothing matched or another thread won the delete.
    pub fn delete<Q, F>(&self, query: &Q, cmp: &F, buf: &mut ActionBuffer<T>) -> bool
    where
        Q: ?Sized,
        F: Fn(&T, &Q) -> CmpOrdering,
    {
        let guard = &epoch::pin();
        if !self.find_path(query, cmp, buf, guard) {
            return false;
        }

        let node = buf.succ(0);
        // SAFETY: `find_path` matched a node protected by `guard`.
        let node_ref = unsafe { node.deref() };
        if !Self::soft_delete(node_ref, guard) {
            return false;
        }
        self.stats.record_soft_delete();

        self.search(query, cmp, Some(node), buf, guard);

        if node_ref.state.fetch_or(UNLINKED, Ordering::AcqRel) & LINKING == 0 {
            self.retire(node, guard);
        }
        true
    }

    /// Mark every link of `node`, top level first.
    ///
    /// Returns `true` for the single caller whose CAS marked level 0.
    fn soft_delete(node: &Node<T>, guard: &Guard) -> bool {
        let mut marked = false;
        for level in (0..=node.level()).rev() {
            let (mut next, mut deleted) = node.get_next(level, guard);
            while !deleted {
                if node.cas_next(level, next, next, false, true, guard) && level == 0 {
                    marked = true;
                }
                (next, deleted) = node.get_next(level, guard);
            }
        }
        marked
    }

    fn retire<'g>(&self, node: Shared<'g, Node<T>>, guard: &'g Guard) {
        // SAFETY: the node is unlinked at every level and both its inserter
        // and deleter are done with it.
        unsafe {
            self.stats.record_free(node.deref().level());
            guard.defer_destroy(node);
        }
    }

    /// Walk every level and check that elements are strictly ascending and
    /// that no marked node is left linked.
    pub fn is_well_formed<F>(&self, cmp: &F) -> bool
    where
        F: Fn(&T, &T) -> CmpOrdering,
    {
        let guard = &epoch::pin();
        let top = self.level.load(Ordering::Acquire);
        for level in 0..=top {
            let mut prev: Option<&T> = None;
            let mut curr = self.head.get_next(level, guard).0;
            // SAFETY: nodes reached under `guard` stay allocated.
            while let Some(node) = unsafe { curr.as_ref() } {
                let (next, deleted) = node.get_next(level, guard);
                if deleted {
                    return false;
                }
                if let Some(prev) = prev {
                    if cmp(prev, node.elem()) != CmpOrdering::Less {
                        return false;
                    }
                }
                prev = Some(node.elem());
                curr = next;
            }
        }
        true
    }
}

impl<T> Default for Skiplist<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Skiplist<T> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` rules out concurrent access; every node still
        // reachable at level 0 is owned by the list alone.
        unsafe {
            let guard = epoch::unprotected();
            let mut curr = self.head.get_next(0, guard).0;
            while !curr.is_null() {
                let next = curr.deref().get_next(0, guard).0;
                drop(curr.into_owned());
                curr = next;
            }
        }
    }
}
