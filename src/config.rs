//! Configuration for memlink
//!
//! Centralized configuration with sensible defaults.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use crate::error::{MemlinkError, Result};

/// Main configuration for a memlink handler
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Cache server address (host:port)
    pub server_addr: String,

    /// Connect timeout (milliseconds, 0 = OS default)
    pub connect_timeout_ms: u64,

    /// Socket read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Socket write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,

    /// Disable Nagle's algorithm
    pub nodelay: bool,

    // -------------------------------------------------------------------------
    // Buffer Configuration
    // -------------------------------------------------------------------------
    /// Capacity of the buffered reader (bytes)
    pub read_buffer_size: usize,

    /// Capacity of the buffered writer (bytes)
    pub write_buffer_size: usize,

    /// Max idle response headers kept for reuse
    pub header_pool_capacity: usize,

    // -------------------------------------------------------------------------
    // Batch Configuration
    // -------------------------------------------------------------------------
    /// Results a batched get may read ahead of its consumer (0 = lockstep)
    pub batch_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:11211".to_string(),
            connect_timeout_ms: 0,
            read_timeout_ms: 0,
            write_timeout_ms: 0,
            nodelay: true,
            read_buffer_size: 8 * 1024,
            write_buffer_size: 8 * 1024,
            header_pool_capacity: 64,
            batch_buffer: 16,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Resolve the server address to the first socket address it names
    pub fn resolve_addr(&self) -> Result<SocketAddr> {
        self.server_addr
            .to_socket_addrs()
            .map_err(|e| MemlinkError::Config(format!("cannot resolve {}: {}", self.server_addr, e)))?
            .next()
            .ok_or_else(|| MemlinkError::Config(format!("no address for {}", self.server_addr)))
    }

    pub(crate) fn connect_timeout(&self) -> Option<Duration> {
        millis(self.connect_timeout_ms)
    }

    pub(crate) fn read_timeout(&self) -> Option<Duration> {
        millis(self.read_timeout_ms)
    }

    pub(crate) fn write_timeout(&self) -> Option<Duration> {
        millis(self.write_timeout_ms)
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the cache server address
    pub fn server_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.server_addr = addr.into();
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
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

    /// Enable or disable TCP_NODELAY
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.config.nodelay = enabled;
        self
    }

    /// Set the read buffer capacity (in bytes)
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Set the write buffer capacity (in bytes)
    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.config.write_buffer_size = size;
        self
    }

    /// Set how many idle response headers are kept for reuse
    pub fn header_pool_capacity(mut self, capacity: usize) -> Self {
        self.config.header_pool_capacity = capacity;
        self
    }

    /// Set how far a batched get may read ahead of its consumer
    pub fn batch_buffer(mut self, results: usize) -> Self {
        self.config.batch_buffer = results;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
