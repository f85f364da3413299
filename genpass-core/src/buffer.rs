// SPDX-License-Identifier: MIT
//
// genpass: Secure Token Generator
// Copyright (c) 2025 genpass Contributors

//! Reusable index scratch buffers
//!
//! Every string is rendered from a buffer of sampled charset indices. The
//! pool keeps those buffers alive between generations, so a batch allocates
//! scratch space once per concurrent worker instead of once per string.
//! The rendered string itself is the caller's output and is allocated at its
//! exact size by the generator.
//!
//! # Design
//!
//! - Uses `parking_lot::Mutex` around a free list, held only to push or pop
//! - A [`PooledBuffer`] guard returns its buffer on drop, so every exit path
//!   (success, error, cancellation, panic unwinding) gives it back
//! - Buffers are zeroed, spare capacity included, before they re-enter the free list

use parking_lot::Mutex;
use serde::Serialize;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use zeroize::Zeroize;

/// Pool of zeroize-on-return index buffers
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    free: Mutex<Vec<Vec<u64>>>,
    buffer_capacity: usize,
    max_pooled: usize,
    stats: Mutex<PoolStats>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub acquired: u64,
    pub reused: u64,
    pub allocated: u64,
    pub returned: u64,
    pub discarded: u64,
}

impl BufferPool {
    /// Create a pool whose fresh buffers reserve `buffer_capacity` slots
    /// and which keeps at most `max_pooled` idle buffers
    pub fn new(buffer_capacity: usize, max_pooled: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::with_capacity(max_pooled)),
                buffer_capacity,
                max_pooled,
                stats: Mutex::new(PoolStats::default()),
            }),
        }
    }

    /// Borrow a buffer of exactly `len` zeroed slots
    pub fn get(&self, len: usize) -> PooledBuffer {
        let recycled = self.inner.free.lock().pop();

        let mut stats = self.inner.stats.lock();
        stats.acquired += 1;
        let mut buf = match recycled {
            Some(buf) => {
                stats.reused += 1;
                buf
            }
            None => {
                stats.allocated += 1;
                Vec::with_capacity(self.inner.buffer_capacity.max(len))
            }
        };
        drop(stats);

        buf.clear();
        buf.resize(len, 0);

        PooledBuffer {
            buf,
            pool: Arc::clone(&self.inner),
        }
    }

    /// Number of idle buffers ready for reuse
    pub fn idle(&self) -> usize {
        self.inner.free.lock().len()
    }

    pub fn stats(&self) -> PoolStats {
        *self.inner.stats.lock()
    }
}

impl PoolInner {
    fn put(&self, mut buf: Vec<u64>) {
        // Wipes the elements and the spare capacity, leaving it empty
        buf.zeroize();

        let mut free = self.free.lock();
        if free.len() < self.max_pooled {
            free.push(buf);
            drop(free);
            self.stats.lock().returned += 1;
        } else {
            drop(free);
            self.stats.lock().discarded += 1;
        }
    }
}

/// Buffer borrowed from a [`BufferPool`], returned and wiped on drop
pub struct PooledBuffer {
    buf: Vec<u64>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledBuffer {
    type Target = Vec<u64>;

    fn deref(&self) -> &Vec<u64> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Vec<u64> {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_put_reuses() {
        let pool = BufferPool::new(64, 4);
        {
            let mut buf = pool.get(16);
            assert_eq!(buf.len(), 16);
            buf.iter_mut().for_each(|slot| *slot = 0xdead);
            assert!(buf.capacity() >= 64);
        }
        assert_eq!(pool.idle(), 1);

        let buf = pool.get(8);
        assert_eq!(buf.len(), 8);
        assert!(buf.iter().all(|&slot| slot == 0));
        assert!(buf.capacity() >= 64);
        assert_eq!(pool.idle(), 0);

        let stats = pool.stats();
        assert_eq!(stats.acquired, 2);
        assert_eq!(stats.allocated, 1);
        assert_eq!(stats.reused, 1);
        assert_eq!(stats.returned, 1);
    }

    #[test]
    fn test_grows_to_requested_len() {
        let pool = BufferPool::new(8, 2);
        let buf = pool.get(1024);
        assert_eq!(buf.len(), 1024);
        drop(buf);

        // A recycled buffer keeps its larger allocation
        let buf = pool.get(4);
        assert!(buf.capacity() >= 1024);
        assert_eq!(pool.stats().allocated, 1);
    }

    #[test]
    fn test_returned_on_error_path() {
        fn fails(pool: &BufferPool) -> Result<u64, ()> {
            let mut buf = pool.get(8);
            buf[0] = 42;
            Err(())
        }

        let pool = BufferPool::new(8, 2);
        assert!(fails(&pool).is_err());
        assert_eq!(pool.idle(), 1);
        assert!(pool.get(8).iter().all(|&slot| slot == 0));
    }

    #[test]
    fn test_discards_beyond_max_pooled() {
        let pool = BufferPool::new(8, 1);
        let a = pool.get(8);
        let b = pool.get(8);
        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 1);
        assert_eq!(pool.stats().discarded, 1);
    }

    #[test]
    fn test_shared_across_threads() {
        let pool = BufferPool::new(32, 8);
        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let mut buf = pool.get(32);
                        buf[0] = i;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(pool.stats().acquired, 800);
        assert!(pool.idle() <= 8);
    }
}
