//! MemStore Module
//!
//! Multi-version key/value store on top of the lock-free skip list.
//!
//! ## Responsibilities
//! - Stamp every version with the sequence number current at insertion
//! - Resolve the newest visible version of a key
//! - Pin consistent read horizons (snapshots) and iterate through them
//! - Reclaim versions no open snapshot can observe
//!
//! ## Versions
//! Versions of one key sit next to each other in the index, ordered by
//! `born_sn` and then insertion order, so the newest version is the last of
//! the run. A put links its version first and then marks the older ones
//! superseded; a delete marks the newest one deleted. Versions retired at the
//! sequence number they were born at are also unlinked right away. Rollback
//! revives superseded versions but not deleted ones.

mod gc;
mod item;
mod iterator;
mod snapshot;
mod store;
mod writer;

pub use item::{default_key_compare, Item, KeyCompare};
pub use iterator::StoreIterator;
pub use snapshot::Snapshot;
pub use store::Store;
pub use writer::Writer;
