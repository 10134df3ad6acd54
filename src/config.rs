//! Configuration for StrataKV
//!
//! Centralized configuration with sensible defaults.

use crate::error::{Result, StrataError};

/// Main configuration for a StrataKV node
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Store Configuration
    // -------------------------------------------------------------------------
    /// Storage engine settings
    pub store: StoreConfig,

    /// Idle writers kept in the engine's pool
    pub writer_pool_size: usize,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

/// Storage engine settings
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    /// Run collection passes on a spawned thread instead of the thread that
    /// closed the last snapshot reference
    pub background_gc: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            background_gc: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            writer_pool_size: 128,
            listen_addr: "127.0.0.1:11212".to_string(),
            max_connections: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the node cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.writer_pool_size == 0 {
            return Err(StrataError::Config(
                "writer_pool_size must be at least 1".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(StrataError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.listen_addr.is_empty() {
            return Err(StrataError::Config("listen_addr is empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Run GC passes in the background (default) or inline
    pub fn background_gc(mut self, enabled: bool) -> Self {
        self.config.store.background_gc = enabled;
        self
    }

    /// Set the number of pooled writers
    pub fn writer_pool_size(mut self, size: usize) -> Self {
        self.config.writer_pool_size = size;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
