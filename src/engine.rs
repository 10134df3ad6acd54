//! Engine Module
//!
//! The dispatch layer between the wire protocol and the store.
//!
//! ## Responsibilities
//! - Own the `Store`, configured with the byte-item key comparator
//! - Lend writers out of a bounded pool, one per in-flight request
//! - Map protocol commands onto store operations and build responses
//! - Count requests for STAT

use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use crossbeam::queue::ArrayQueue;

use crate::byte_item::{byte_item_key_compare, ByteItem};
use crate::config::Config;
use crate::error::Result;
use crate::memstore::{Item, Store, Writer};
use crate::protocol::{Command, Request, Response, Status};

/// Flags returned with every GET; the store keeps no flags
const GET_FLAGS: [u8; 4] = [0; 4];

/// The node's storage engine
///
/// ## Concurrency Model: lock-free writers
///
/// - Every request checks a `Writer` out of `writers`. The writer's scratch
///   space is exclusive to that request; the store itself is shared.
/// - An empty pool hands out a fresh writer. A writer returned to a full
///   pool is dropped.
/// - No operation takes a lock; contention is resolved inside the store.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Multi-version store
    store: Arc<Store>,

    /// Idle writers
    writers: ArrayQueue<Writer>,

    /// Request counters
    sets: AtomicU64,
    gets: AtomicU64,
    deletes: AtomicU64,
}

impl Engine {
    /// Create an engine with the given config
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let mut store = Store::with_config(config.store);
        store.set_key_comparator(byte_item_key_compare);

        Ok(Self {
            writers: ArrayQueue::new(config.writer_pool_size),
            store: Arc::new(store),
            config,
            sets: AtomicU64::new(0),
            gets: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        })
    }

    /// Check a writer out of the pool
    fn writer(&self) -> PooledWriter<'_> {
        let writer = self
            .writers
            .pop()
            .unwrap_or_else(|| self.store.new_writer());
        PooledWriter {
            pool: &self.writers,
            writer: ManuallyDrop::new(writer),
        }
    }

    /// Execute a request
    ///
    /// Returns the responses to send back, in order. Every command produces
    /// exactly one response except STAT.
    pub fn execute(&self, request: &Request) -> Vec<Response> {
        let opcode = request.opcode;
        let opaque = request.opaque;

        let command = match request.command() {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!("Rejecting request 0x{:02x}: {}", opcode, e);
                return vec![Response::error(
                    opcode,
                    opaque,
                    Status::InvalidArguments,
                    &e.to_string(),
                )];
            }
        };

        let response = match command {
            Command::Get { key } => match self.get(&key) {
                Ok(Some(value)) => Response::ok(opcode, opaque)
                    .with_extras(GET_FLAGS.to_vec())
                    .with_value(value.to_vec()),
                Ok(None) => Response::error(opcode, opaque, Status::KeyNotFound, "Not found"),
                Err(e) => invalid(opcode, opaque, &e.to_string()),
            },
            Command::Set {
                key,
                value,
                flags,
                expiration,
            } => {
                if flags != 0 || expiration != 0 {
                    tracing::trace!(flags, expiration, "SET extras are not stored");
                }
                match self.set(&key, &value) {
                    Ok(()) => Response::ok(opcode, opaque),
                    Err(e) => invalid(opcode, opaque, &e.to_string()),
                }
            }
            Command::Delete { key } => match self.delete(&key) {
                Ok(true) => Response::ok(opcode, opaque),
                Ok(false) => Response::error(opcode, opaque, Status::KeyNotFound, "Not found"),
                Err(e) => invalid(opcode, opaque, &e.to_string()),
            },
            Command::Flush { delay } => {
                if delay > 0 {
                    tracing::warn!(delay, "Delayed flush is not supported, flushing now");
                }
                self.flush();
                Response::ok(opcode, opaque)
            }
            Command::Stat => {
                let mut responses: Vec<Response> = self
                    .stats()
                    .into_iter()
                    .map(|(name, value)| {
                        Response::ok(opcode, opaque)
                            .with_key(name.into_bytes())
                            .with_value(value.into_bytes())
                    })
                    .collect();
                responses.push(Response::ok(opcode, opaque));
                return responses;
            }
            Command::Noop | Command::Quit => Response::ok(opcode, opaque),
            Command::Version => {
                Response::ok(opcode, opaque).with_value(crate::VERSION.as_bytes().to_vec())
            }
            Command::Unknown { .. } => Response::error(
                opcode,
                opaque,
                Status::UnknownCommand,
                "Unknown command",
            ),
        };

        vec![response]
    }

    /// Get the current value of a key
    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        let query = Item::new(ByteItem::key_only(key)?.into_bytes());

        match self.writer().get(&query) {
            Some(item) => {
                let blob = ByteItem::from_bytes(item.data().clone())?;
                Ok(Some(blob.value_bytes()))
            }
            None => Ok(None),
        }
    }

    /// Store a key-value pair
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.sets.fetch_add(1, Ordering::Relaxed);
        let item = Item::new(ByteItem::new(key, value)?.into_bytes());
        self.writer().put(item);
        Ok(())
    }

    /// Delete a key
    ///
    /// Returns `false` if the key had no live value.
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        let query = Item::new(ByteItem::key_only(key)?.into_bytes());
        Ok(self.writer().delete(&query))
    }

    /// Delete every live key
    ///
    /// Returns the number of keys deleted. Keys written while the flush runs
    /// may survive it.
    pub fn flush(&self) -> usize {
        let mut live = Vec::new();
        if let Some(mut iter) = self.store.new_iterator(None) {
            iter.seek_first();
            while let Some(item) = iter.get() {
                live.push(Item::new(item.data().clone()));
                iter.next();
            }
        }

        let mut writer = self.writer();
        let deleted = live.iter().filter(|query| writer.delete(query)).count();
        tracing::debug!(deleted, "Flushed all keys");
        deleted
    }

    /// Named statistics in reporting order
    pub fn stats(&self) -> Vec<(String, String)> {
        vec![
            ("sets".to_string(), self.sets.load(Ordering::Relaxed).to_string()),
            ("gets".to_string(), self.gets.load(Ordering::Relaxed).to_string()),
            ("deletes".to_string(), self.deletes.load(Ordering::Relaxed).to_string()),
            ("curr_items".to_string(), self.store.items_count().to_string()),
            ("snapshots".to_string(), self.store.get_snapshots().len().to_string()),
            ("curr_sn".to_string(), self.store.current_sn().to_string()),
        ]
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the underlying store
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Number of writers waiting in the pool
    pub fn idle_writers(&self) -> usize {
        self.writers.len()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn invalid(opcode: u8, opaque: u32, message: &str) -> Response {
    Response::error(opcode, opaque, Status::InvalidArguments, message)
}

/// A writer on loan from the pool; goes back on drop
struct PooledWriter<'a> {
    pool: &'a ArrayQueue<Writer>,
    writer: ManuallyDrop<Writer>,
}

impl Deref for PooledWriter<'_> {
    type Target = Writer;

    fn deref(&self) -> &Writer {
        &self.writer
    }
}

impl DerefMut for PooledWriter<'_> {
    fn deref_mut(&mut self) -> &mut Writer {
        &mut self.writer
    }
}

impl Drop for PooledWriter<'_> {
    fn drop(&mut self) {
        // SAFETY: `writer` is never touched again after this point.
        let writer = unsafe { ManuallyDrop::take(&mut self.writer) };
        // A full pool drops the writer
        let _ = self.pool.push(writer);
    }
}
