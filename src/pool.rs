//! Fixed-size pool of reusable download buffers.
//!
//! The pool holds at most `concurrency` buffers, and acquisition suspends
//! when all of them are checked out. That suspension is the subsystem's
//! admission control: no separate semaphore limits concurrent downloads.
//! Exhaustion is backpressure, not an error.

use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    slots: Arc<Semaphore>,
    free: Mutex<Vec<BytesMut>>,
    default_capacity: usize,
}

impl BufferPool {
    /// `concurrency` bounds how many buffers may be checked out at once;
    /// `default_capacity` pre-sizes buffers when the source length is
    /// unknown.
    pub fn new(concurrency: usize, default_capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                slots: Arc::new(Semaphore::new(concurrency.max(1))),
                free: Mutex::new(Vec::with_capacity(concurrency.max(1))),
                default_capacity,
            }),
        }
    }

    /// Take a buffer out of the pool, waiting for one to be released when
    /// all are checked out. A positive `size_hint` pre-allocates capacity
    /// to avoid reallocation during fill; `0` means unknown length.
    ///
    /// Returned buffers are reused across requests: capacity is retained,
    /// contents are not zeroed, and the logical length starts at zero.
    pub async fn acquire(&self, size_hint: usize) -> PooledBuf {
        if self.inner.slots.available_permits() == 0 {
            debug!("buffer pool exhausted, waiting for a release");
        }
        let slot = Arc::clone(&self.inner.slots)
            .acquire_owned()
            .await
            .expect("buffer pool semaphore is never closed");

        let wanted = if size_hint > 0 {
            size_hint
        } else {
            self.inner.default_capacity
        };
        let mut buf = self.inner.free.lock().pop().unwrap_or_default();
        if buf.capacity() < wanted {
            buf.reserve(wanted);
        }

        PooledBuf {
            buf,
            pool: Arc::clone(&self.inner),
            _slot: slot,
        }
    }
}

/// A buffer checked out of a [`BufferPool`].
///
/// Dropping the guard returns the buffer (cleared, capacity retained) to
/// the pool and frees its admission slot. Release happens exactly once,
/// on success and failure paths alike.
#[derive(Debug)]
pub struct PooledBuf {
    buf: BytesMut,
    pool: Arc<PoolInner>,
    _slot: OwnedSemaphorePermit,
}

impl PooledBuf {
    pub fn extend_from_slice(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }
}

impl AsRef<[u8]> for PooledBuf {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        let mut buf = std::mem::take(&mut self.buf);
        buf.clear();
        self.pool.free.lock().push(buf);
        // the slot permit drops after the buffer is back in the free list
    }
}
