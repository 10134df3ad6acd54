//! # StrataKV
//!
//! An in-memory, memcached-compatible key-value node with:
//! - A lock-free skip list index with epoch-based reclamation
//! - Multi-version concurrency control over sequence numbers
//! - Reference-counted snapshots for consistent iteration
//! - Watermark garbage collection of versions no snapshot can observe
//! - A memcached binary protocol front end over TCP
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                             │
//! │                  (Multiple Clients)                         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ memcached binary
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                │
//! │              (dispatch + writer pool)                       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Writers   │          │  Snapshots  │
//!   │ (put/del)   │          │ (iterators) │
//!   └──────┬──────┘          └──────┬──────┘
//!          └────────────┬───────────┘
//!                       ▼
//!               ┌──────────────┐
//!               │  MemStore    │──── GC on last snapshot close
//!               │ (skip list)  │
//!               └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod byte_item;
pub mod client;
pub mod engine;
pub mod memstore;
pub mod network;
pub mod protocol;
pub mod skiplist;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use byte_item::{byte_item_key_compare, ByteItem};
pub use client::Client;
pub use config::{Config, StoreConfig};
pub use engine::Engine;
pub use error::{Result, StrataError};
pub use memstore::{Item, Snapshot, Store, StoreIterator, Writer};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of StrataKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
