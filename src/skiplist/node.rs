//! Skip list nodes and traversal scratch space.
//!
//! Every successor link is an epoch-managed pointer whose low tag bit marks the
//! *owning* node as logically deleted at that level.

use std::sync::atomic::{AtomicU8, Ordering};

use crossbeam::epoch::{Atomic, Guard, Shared};

use super::MAX_LEVEL;

/// Tag value carried by a link whose owner has been logically deleted
const DELETED: usize = 1;

/// Link state: the inserting thread has not finished linking upper levels
pub(crate) const LINKING: u8 = 0b01;

/// Link state: the deleting thread has finished its cleanup search
pub(crate) const UNLINKED: u8 = 0b10;

pub(crate) struct Node<T> {
    /// `None` only for the head sentinel
    elem: Option<T>,
    level: usize,
    next: Box<[Atomic<Node<T>>]>,
    pub(crate) state: AtomicU8,
}

impl<T> Node<T> {
    pub(crate) fn head() -> Self {
        Self {
            elem: None,
            level: MAX_LEVEL,
            next: (0..=MAX_LEVEL).map(|_| Atomic::null()).collect(),
            state: AtomicU8::new(0),
        }
    }

    pub(crate) fn new(elem: T, level: usize) -> Self {
        Self {
            elem: Some(elem),
            level,
            next: (0..=level).map(|_| Atomic::null()).collect(),
            state: AtomicU8::new(LINKING),
        }
    }

    pub(crate) fn elem(&self) -> &T {
        match self.elem {
            Some(ref elem) => elem,
            None => unreachable!("the head sentinel is never compared"),
        }
    }

    pub(crate) fn into_elem(self) -> T {
        match self.elem {
            Some(elem) => elem,
            None => unreachable!("the head sentinel is never handed back"),
        }
    }

    pub(crate) fn level(&self) -> usize {
        self.level
    }

    /// Successor at `level` plus whether this node is marked at that level.
    pub(crate) fn get_next<'g>(&self, level: usize, guard: &'g Guard) -> (Shared<'g, Node<T>>, bool) {
        let next = self.next[level].load(Ordering::Acquire, guard);
        (next.with_tag(0), next.tag() == DELETED)
    }

    /// Plain store, only valid before the node is published.
    pub(crate) fn set_next(&self, level: usize, next: Shared<'_, Node<T>>) {
        self.next[level].store(next.with_tag(0), Ordering::Relaxed);
    }

    /// Double-compare-and-swap on the (pointer, deleted) pair of one link.
    pub(crate) fn cas_next<'g>(
        &self,
        level: usize,
        old: Shared<'g, Node<T>>,
        new: Shared<'g, Node<T>>,
        old_deleted: bool,
        new_deleted: bool,
        guard: &'g Guard,
    ) -> bool {
        let old = old.with_tag(if old_deleted { DELETED } else { 0 });
        let new = new.with_tag(if new_deleted { DELETED } else { 0 });
        self.next[level]
            .compare_exchange(old, new, Ordering::AcqRel, Ordering::Acquire, guard)
            .is_ok()
    }

    pub(crate) fn is_marked(&self, level: usize, guard: &Guard) -> bool {
        self.get_next(level, guard).1
    }
}

/// Predecessor / successor arrays filled by a search.
///
/// Owned by exactly one in-flight operation; the pointers are only meaningful
/// under the epoch guard of the operation that produced them.
pub struct ActionBuffer<T> {
    pub(crate) preds: Vec<*const Node<T>>,
    pub(crate) succs: Vec<*const Node<T>>,
}

// SAFETY: the raw pointers are scratch values rewritten by every search and
// never dereferenced outside the guard that validated them.
unsafe impl<T: Send + Sync> Send for ActionBuffer<T> {}

impl<T> ActionBuffer<T> {
    pub fn new() -> Self {
        Self {
            preds: vec![std::ptr::null(); MAX_LEVEL + 1],
            succs: vec![std::ptr::null(); MAX_LEVEL + 1],
        }
    }

    pub(crate) fn pred<'g>(&self, level: usize) -> Shared<'g, Node<T>> {
        Shared::from(self.preds[level])
    }

    pub(crate) fn succ<'g>(&self, level: usize) -> Shared<'g, Node<T>> {
        Shared::from(self.succs[level])
    }
}

impl<T> Default for ActionBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}
