//! Skip list cursors
//!
//! `Cursor` is the bare (prev, curr) position used by callers that manage
//! their own epoch guard and scratch buffer. `SkiplistIter` bundles all of
//! that for scans that borrow the list.

use std::cmp::Ordering as CmpOrdering;
use std::ptr;

use crossbeam::epoch::{self, Guard, Shared};

use super::node::{ActionBuffer, Node};
use super::Skiplist;

/// Level-0 position. A null `curr` means exhausted.
pub(crate) struct Cursor<T> {
    prev: *const Node<T>,
    curr: *const Node<T>,
}

// SAFETY: positions are only dereferenced under the guard that produced them,
// which the owner keeps alongside the cursor.
unsafe impl<T: Send + Sync> Send for Cursor<T> {}

impl<T> Cursor<T> {
    pub(crate) fn new() -> Self {
        Self {
            prev: ptr::null(),
            curr: ptr::null(),
        }
    }

    pub(crate) fn valid(&self) -> bool {
        !self.curr.is_null()
    }
}

impl<T> Skiplist<T> {
    pub(crate) fn cursor_seek_first(&self, cursor: &mut Cursor<T>, guard: &Guard) {
        let head = self.head_ptr();
        // SAFETY: the head lives as long as the list.
        cursor.curr = unsafe { head.deref() }.get_next(0, guard).0.as_raw();
        cursor.prev = head.as_raw();
    }

    /// Position at the first element not less than `query`.
    pub(crate) fn cursor_seek<Q, F>(
        &self,
        cursor: &mut Cursor<T>,
        query: &Q,
        cmp: &F,
        buf: &mut ActionBuffer<T>,
        guard: &Guard,
    ) -> bool
    where
        Q: ?Sized,
        F: Fn(&T, &Q) -> CmpOrdering,
    {
        let found = self.find_path(query, cmp, buf, guard);
        cursor.prev = buf.preds[0];
        cursor.curr = buf.succs[0];
        found
    }

    pub(crate) fn cursor_get<'g>(&self, cursor: &Cursor<T>, _guard: &'g Guard) -> Option<&'g T> {
        // SAFETY: `cursor` was positioned under `_guard`, which is still pinned.
        unsafe { Shared::<'g, Node<T>>::from(cursor.curr).as_ref() }.map(Node::elem)
    }

    /// Advance one element, finishing the unlink of the current node when it
    /// has been deleted underneath the cursor.
    pub(crate) fn cursor_next<F>(
        &self,
        cursor: &mut Cursor<T>,
        cmp: &F,
        buf: &mut ActionBuffer<T>,
        guard: &Guard,
    ) where
        F: Fn(&T, &T) -> CmpOrdering,
    {
        let prev = Shared::from(cursor.prev);
        let curr = Shared::from(cursor.curr);
        // SAFETY: positioned under `guard`.
        let curr_ref = match unsafe { curr.as_ref() } {
            Some(node) => node,
            None => return,
        };

        let (next, deleted) = curr_ref.get_next(0, guard);
        if !deleted {
            cursor.prev = cursor.curr;
            cursor.curr = next.as_raw();
            return;
        }

        if self.help_delete(0, prev, curr, next, guard) {
            cursor.curr = next.as_raw();
            return;
        }

        // The predecessor changed; re-derive the position after `curr`.
        self.stats.record_read_conflict();
        self.find_path(curr_ref.elem(), cmp, buf, guard);
        cursor.prev = buf.preds[0];
        cursor.curr = buf.succs[0];
    }
}

/// Scanning iterator borrowing a skip list.
///
/// Holds an epoch guard for its whole lifetime, so nodes it can reach are not
/// reclaimed until it is dropped.
pub struct SkiplistIter<'a, T, F> {
    list: &'a Skiplist<T>,
    cmp: F,
    buf: ActionBuffer<T>,
    cursor: Cursor<T>,
    guard: Guard,
}

impl<'a, T, F> SkiplistIter<'a, T, F>
where
    F: Fn(&T, &T) -> CmpOrdering,
{
    pub fn new(list: &'a Skiplist<T>, cmp: F) -> Self {
        Self {
            list,
            cmp,
            buf: list.make_buf(),
            cursor: Cursor::new(),
            guard: epoch::pin(),
        }
    }

    pub fn seek_first(&mut self) {
        self.list.cursor_seek_first(&mut self.cursor, &self.guard);
    }

    /// Position at the first element not less than `elem`; returns whether it
    /// compares equal.
    pub fn seek(&mut self, elem: &T) -> bool {
        self.list
            .cursor_seek(&mut self.cursor, elem, &self.cmp, &mut self.buf, &self.guard)
    }

    pub fn valid(&self) -> bool {
        self.cursor.valid()
    }

    pub fn get(&self) -> Option<&T> {
        self.list.cursor_get(&self.cursor, &self.guard)
    }

    pub fn next(&mut self) {
        self.list
            .cursor_next(&mut self.cursor, &self.cmp, &mut self.buf, &self.guard);
    }
}
