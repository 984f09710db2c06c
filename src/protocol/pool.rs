//! Response header pool
//!
//! Decoded headers are recycled through a bounded free list. A
//! [`PooledHeader`] is a borrowed view that is valid until it is released;
//! anything needed afterwards has to be copied out by [`PooledHeader::release`].

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::response::ResponseHeader;

/// Bounded free list of response headers
pub struct HeaderPool {
    free: Mutex<Vec<Box<ResponseHeader>>>,
    capacity: usize,
    /// Headers allocated because the free list was empty
    allocations: AtomicU64,
}

impl HeaderPool {
    /// Create a pool keeping at most `capacity` idle headers
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
            allocations: AtomicU64::new(0),
        }
    }

    /// Take a cleared header from the pool, allocating when it is empty
    pub fn acquire(&self) -> PooledHeader<'_> {
        let header = self.free.lock().pop().unwrap_or_else(|| {
            self.allocations.fetch_add(1, Ordering::Relaxed);
            Box::default()
        });

        PooledHeader {
            header: Some(header),
            pool: self,
        }
    }

    /// Number of idle headers ready for reuse
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    /// Max idle headers kept
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total headers ever allocated by this pool
    pub fn allocations(&self) -> u64 {
        self.allocations.load(Ordering::Relaxed)
    }

    fn put(&self, mut header: Box<ResponseHeader>) {
        header.clear();
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(header);
        }
    }
}

impl Default for HeaderPool {
    fn default() -> Self {
        Self::new(64)
    }
}

/// A header on loan from a [`HeaderPool`].
///
/// Returned to the pool exactly once: by [`release`](Self::release) or on drop.
pub struct PooledHeader<'a> {
    header: Option<Box<ResponseHeader>>,
    pool: &'a HeaderPool,
}

impl PooledHeader<'_> {
    /// Copy the header out and hand the pooled one back.
    pub fn release(self) -> ResponseHeader {
        *self
    }
}

impl Deref for PooledHeader<'_> {
    type Target = ResponseHeader;

    fn deref(&self) -> &ResponseHeader {
        // Only `Drop` takes the header out.
        self.header.as_deref().unwrap_or(&EMPTY_HEADER)
    }
}

impl DerefMut for PooledHeader<'_> {
    fn deref_mut(&mut self) -> &mut ResponseHeader {
        self.header.get_or_insert_with(Box::default)
    }
}

impl fmt::Debug for PooledHeader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PooledHeader").field(&**self).finish()
    }
}

impl Drop for PooledHeader<'_> {
    fn drop(&mut self) {
        if let Some(header) = self.header.take() {
            self.pool.put(header);
        }
    }
}

static EMPTY_HEADER: ResponseHeader = ResponseHeader {
    opcode: 0,
    key_length: 0,
    extras_length: 0,
    data_type: 0,
    status: 0,
    total_body_length: 0,
    opaque: 0,
    cas: 0,
};
