//! Reusable byte buffers for encode attempts.
//!
//! A size search encodes the same image a dozen times at different widths.
//! Each attempt writes into a scratch `Vec<u8>`; pooling those vectors keeps
//! their capacity alive across attempts and across searches, so a batch run
//! settles into a steady state with no allocation churn.
//!
//! ## Contract
//!
//! - [`BufferPool::acquire`] hands out an **empty** buffer that no other
//!   caller holds. The guard owns the vector, so two searches can never share
//!   one.
//! - The buffer goes back to the pool exactly once, when its
//!   [`PooledBuffer`] guard drops. Callers write the guard's content to their
//!   sink first; the data is cleared on release and never observed again.
//! - The pool is bounded; buffers returned to a full pool are freed.
//!
//! ```rust
//! use downsize::pool::BufferPool;
//!
//! let pool = BufferPool::new(4);
//! {
//!     let mut buf = pool.acquire();
//!     buf.extend_from_slice(b"encoded bytes");
//! } // released here
//! assert_eq!(pool.available(), 1);
//! assert!(pool.acquire().is_empty());
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};

/// Default number of idle buffers kept by [`BufferPool::default`].
const DEFAULT_MAX_IDLE: usize = 16;

/// A bounded, thread-safe pool of byte buffers.
#[derive(Debug)]
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    max_idle: usize,
}

impl BufferPool {
    /// Create a pool that keeps at most `max_idle` buffers between uses.
    pub fn new(max_idle: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
        }
    }

    /// Take an empty buffer, reusing a released one when available.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let buf = self
            .buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default();
        debug_assert!(buf.is_empty());
        PooledBuffer { buf, pool: self }
    }

    fn release(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        if buffers.len() < self.max_idle {
            buffers.push(buf);
        }
    }

    /// Number of idle buffers waiting in the pool.
    pub fn available(&self) -> usize {
        self.buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE)
    }
}

/// A buffer on loan from a [`BufferPool`]. Returns itself on drop.
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    buf: Vec<u8>,
    pool: &'a BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_from_empty_pool_allocates() {
        let pool = BufferPool::new(2);
        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn released_buffer_is_reused_empty_with_capacity() {
        let pool = BufferPool::new(2);
        {
            let mut buf = pool.acquire();
            buf.extend_from_slice(&[7u8; 4096]);
        }
        assert_eq!(pool.available(), 1);

        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 4096);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn pool_is_bounded() {
        let pool = BufferPool::new(1);
        let a = pool.acquire();
        let b = pool.acquire();
        drop(a);
        drop(b);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn concurrent_holders_get_distinct_buffers() {
        let pool = BufferPool::new(4);
        let mut a = pool.acquire();
        let mut b = pool.acquire();
        a.push(1);
        b.push(2);
        assert_eq!(a.as_slice(), &[1]);
        assert_eq!(b.as_slice(), &[2]);
    }

    #[test]
    fn shared_across_threads() {
        let pool = BufferPool::new(8);
        std::thread::scope(|s| {
            for i in 0..4u8 {
                let pool = &pool;
                s.spawn(move || {
                    for _ in 0..50 {
                        let mut buf = pool.acquire();
                        assert!(buf.is_empty());
                        buf.push(i);
                    }
                });
            }
        });
        assert!(pool.available() <= 4);
    }
}
