// SPDX-License-Identifier: MIT
//
// genpass: Secure Token Generator
// Copyright (c) 2025 genpass Contributors

//! Cryptographically secure entropy source with fail-closed health tracking
//!
//! The source wraps the operating system CSPRNG. Any read failure flips the
//! source to unhealthy for the rest of its life; later calls fail immediately
//! without touching the OS again.

use crate::{Error, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::error;
use zeroize::{Zeroize, Zeroizing};

/// Provider of raw random bytes
///
/// Implemented by [`OsByteSource`] in production. Kept as a trait so a
/// generator can be wired to any CSPRNG-backed provider.
pub trait ByteSource: Send + Sync {
    /// Fill `dest` entirely with random bytes
    fn try_fill(&self, dest: &mut [u8]) -> std::result::Result<(), rand::Error>;
}

/// Operating system CSPRNG (`getrandom` under the hood)
#[derive(Debug, Clone, Copy, Default)]
pub struct OsByteSource;

impl ByteSource for OsByteSource {
    fn try_fill(&self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        OsRng.try_fill_bytes(dest)
    }
}

/// Counters exposed by [`EntropySource::stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntropyStats {
    pub bytes_generated: u64,
    pub errors: u64,
}

/// Fail-closed entropy source
///
/// Health flag and counters are plain atomics, so the source can be shared
/// by every worker without a lock and read from any thread.
pub struct EntropySource {
    source: Box<dyn ByteSource>,
    healthy: AtomicBool,
    bytes_generated: AtomicU64,
    errors: AtomicU64,
}

impl Default for EntropySource {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EntropySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntropySource")
            .field("healthy", &self.is_healthy())
            .field("stats", &self.stats())
            .finish()
    }
}

impl EntropySource {
    /// Create a source backed by the OS CSPRNG
    pub fn new() -> Self {
        Self::with_source(OsByteSource)
    }

    /// Create a source backed by a custom byte provider
    pub fn with_source(source: impl ByteSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            healthy: AtomicBool::new(true),
            bytes_generated: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Fill `dest` with random bytes
    ///
    /// On failure `dest` is zeroed and the source becomes permanently unhealthy.
    pub fn fill(&self, dest: &mut [u8]) -> Result<()> {
        if !self.healthy.load(Ordering::Acquire) {
            return Err(Error::EntropyUnavailable);
        }

        if let Err(e) = self.source.try_fill(dest) {
            dest.zeroize();
            self.errors.fetch_add(1, Ordering::Relaxed);
            if self.healthy.swap(false, Ordering::AcqRel) {
                error!("Entropy source failed, refusing further requests: {}", e);
            }
            return Err(Error::EntropyUnavailable);
        }

        self.bytes_generated
            .fetch_add(dest.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Generate `n` random bytes, zeroed when dropped
    pub fn bytes(&self, n: usize) -> Result<Zeroizing<Vec<u8>>> {
        let mut buf = Zeroizing::new(vec![0u8; n]);
        self.fill(&mut buf)?;
        Ok(buf)
    }

    /// Generate a random `u64` from 8 little-endian bytes
    pub fn uint64(&self) -> Result<u64> {
        let mut buf = Zeroizing::new([0u8; 8]);
        self.fill(&mut *buf)?;
        Ok(u64::from_le_bytes(*buf))
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> EntropyStats {
        EntropyStats {
            bytes_generated: self.bytes_generated.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FailingSource, SequenceSource};
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_bytes_and_counters() {
        let source = EntropySource::new();
        let a = source.bytes(32).unwrap();
        let b = source.bytes(32).unwrap();
        assert_eq!(a.len(), 32);
        assert_ne!(*a, *b);

        source.uint64().unwrap();
        assert_eq!(source.stats().bytes_generated, 72);
        assert_eq!(source.stats().errors, 0);
        assert!(source.is_healthy());
    }

    #[test]
    fn test_uint64_is_little_endian() {
        let source = EntropySource::with_source(SequenceSource::new(vec![0x0102_0304_0506_0708]));
        assert_eq!(source.uint64().unwrap(), 0x0102_0304_0506_0708);
    }

    #[test]
    fn test_fail_closed_without_retrying_provider() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = EntropySource::with_source(FailingSource {
            calls: Arc::clone(&calls),
        });

        assert!(matches!(source.uint64(), Err(Error::EntropyUnavailable)));
        assert!(!source.is_healthy());
        assert!(matches!(source.bytes(16), Err(Error::EntropyUnavailable)));
        assert!(matches!(source.uint64(), Err(Error::EntropyUnavailable)));

        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(source.stats().errors, 1);
        assert_eq!(source.stats().bytes_generated, 0);
    }

    #[test]
    fn test_counters_visible_across_threads() {
        let source = Arc::new(EntropySource::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let source = Arc::clone(&source);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        source.uint64().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(source.stats().bytes_generated, 4 * 100 * 8);
    }
}
