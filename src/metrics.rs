//! Handler metrics
//!
//! Atomic counters for local byte traffic and command outcomes. Recording
//! is a side channel only: nothing in the handler reads these back.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub bytes_written_local: u64,
    pub bytes_read_local: u64,
    pub commands: u64,
    pub misses: u64,
    pub errors: u64,
}

/// Thread-safe counters shared by a handler and its batch workers.
///
/// `Ordering::Relaxed` throughout: counters are independent.
#[derive(Debug, Default)]
pub struct Metrics {
    bytes_written_local: AtomicU64,
    bytes_read_local: AtomicU64,
    commands: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_bytes_written(&self, n: u64) {
        self.bytes_written_local.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_bytes_read(&self, n: u64) {
        self.bytes_read_local.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_command(&self) {
        self.commands.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_written_local: self.bytes_written_local.load(Ordering::Relaxed),
            bytes_read_local: self.bytes_read_local.load(Ordering::Relaxed),
            commands: self.commands.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
