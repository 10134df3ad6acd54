//! Versioned items

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

/// Orders two blobs by their key part only
pub type KeyCompare = fn(&[u8], &[u8]) -> CmpOrdering;

/// Compares the common prefix of two blobs.
///
/// A shorter blob therefore matches any blob it is a prefix of, which lets a
/// bare key act as a query for a full key+value blob.
pub fn default_key_compare(this: &[u8], that: &[u8]) -> CmpOrdering {
    let len = this.len().min(that.len());
    this[..len].cmp(&that[..len])
}

/// Set in the death word when a newer version of the key took over
const SUPERSEDED: u64 = 1 << 32;

/// One version of a key.
///
/// `born_sn` and `seq` are stamped once by the writer before insertion. The
/// death word is 0 while the version is alive; it then holds `dead_sn` in its
/// low half, plus the `SUPERSEDED` bit when a put (not a delete) retired it.
#[derive(Debug)]
pub struct Item {
    data: Bytes,
    pub(crate) born_sn: u32,
    /// Store-wide insertion order, breaks ties between equal `born_sn`
    pub(crate) seq: u64,
    dead: AtomicU64,
}

impl Item {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            born_sn: 0,
            seq: 0,
            dead: AtomicU64::new(0),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the blob
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn born_sn(&self) -> u32 {
        self.born_sn
    }

    pub fn dead_sn(&self) -> u32 {
        self.dead.load(Ordering::Acquire) as u32
    }

    pub fn is_alive(&self) -> bool {
        self.dead.load(Ordering::Acquire) == 0
    }

    /// Whether a newer version of the key retired this one
    pub fn is_superseded(&self) -> bool {
        self.dead.load(Ordering::Acquire) & SUPERSEDED != 0
    }

    /// Alive -> deleted at `sn`. Fails if another thread retired it first.
    pub(crate) fn mark_dead(&self, sn: u32) -> bool {
        self.retire(u64::from(sn))
    }

    /// Alive -> superseded at `sn`. Fails if another thread retired it first.
    pub(crate) fn mark_superseded(&self, sn: u32) -> bool {
        self.retire(u64::from(sn) | SUPERSEDED)
    }

    fn retire(&self, word: u64) -> bool {
        self.dead
            .compare_exchange(0, word, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Superseded -> alive. Deleted versions stay dead.
    pub(crate) fn revive(&self) -> bool {
        let word = self.dead.load(Ordering::Acquire);
        word & SUPERSEDED != 0
            && self
                .dead
                .compare_exchange(word, 0, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    /// Whether a reader pinned at `sn` can observe this version
    pub fn is_visible_at(&self, sn: u32) -> bool {
        let dead_sn = self.dead_sn();
        self.born_sn <= sn && (dead_sn == 0 || dead_sn > sn)
    }
}
