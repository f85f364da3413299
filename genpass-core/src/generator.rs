// SPDX-License-Identifier: MIT
//
// genpass: Secure Token Generator
// Copyright (c) 2025 genpass Contributors

//! Single-string generation
//!
//! [`CryptoGenerator`] owns one entropy source, one buffer pool, one
//! concurrency limiter and one metrics collector. Cloning it is cheap and
//! shares all of them; separate instances share nothing.

use crate::buffer::BufferPool;
use crate::config::{Format, GeneratorConfig, ValidatedConfig};
use crate::entropy::EntropySource;
use crate::metrics::{Metrics, StatsSnapshot};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Cryptographically secure string generator
#[derive(Clone)]
pub struct CryptoGenerator {
    inner: Arc<GeneratorInner>,
}

struct GeneratorInner {
    entropy: EntropySource,
    buffers: BufferPool,
    limiter: Semaphore,
    max_concurrency: usize,
    metrics: Metrics,
}

impl Default for CryptoGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoGenerator {
    /// Generator over the OS CSPRNG allowing [`crate::MAX_WORKERS`] concurrent generations
    pub fn new() -> Self {
        Self::with_entropy(EntropySource::new(), crate::MAX_WORKERS)
    }

    /// Generator over a specific entropy source and concurrency limit
    pub fn with_entropy(entropy: EntropySource, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            inner: Arc::new(GeneratorInner {
                entropy,
                buffers: BufferPool::new(crate::DEFAULT_BUFFER_CAPACITY, crate::DEFAULT_POOL_BUFFERS),
                limiter: Semaphore::new(max_concurrency),
                max_concurrency,
                metrics: Metrics::new(),
            }),
        }
    }

    pub fn entropy(&self) -> &EntropySource {
        &self.inner.entropy
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    pub fn buffers(&self) -> &BufferPool {
        &self.inner.buffers
    }

    /// Snapshot of every counter the generator tracks
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot::collect(
            &self.inner.metrics,
            self.inner.entropy.is_healthy(),
            self.inner.entropy.stats(),
            self.inner.buffers.stats(),
            self.inner.max_concurrency - self.inner.limiter.available_permits(),
            self.inner.max_concurrency,
        )
    }

    #[cfg(test)]
    pub(crate) fn limiter(&self) -> &Semaphore {
        &self.inner.limiter
    }

    /// Generate one string
    ///
    /// The configuration is validated before any entropy is drawn; `count`
    /// and the concurrency knobs are ignored here.
    pub async fn generate(
        &self,
        config: &GeneratorConfig,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let config = config.validate()?;
        self.generate_validated(&config, cancel).await
    }

    /// Generate one string from an already validated configuration
    ///
    /// Waits for a generation slot first; the slot is released on every
    /// return path when the permit drops.
    pub(crate) async fn generate_validated(
        &self,
        config: &ValidatedConfig,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let start = Instant::now();

        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            permit = self.inner.limiter.acquire() => permit
                .map_err(|_| Error::Internal("generation limiter closed".to_string()))?,
        };

        let result = self.render(config, cancel);
        match &result {
            Ok(_) => self
                .inner
                .metrics
                .record_success(config.output_len(), start.elapsed()),
            Err(e) if !e.is_cancelled() => self.inner.metrics.record_failure(start.elapsed()),
            Err(_) => {}
        }
        result
    }

    fn render(&self, config: &ValidatedConfig, cancel: &CancellationToken) -> Result<String> {
        let sampler = config.sampler();
        let charset = sampler.charset();

        let (symbols, separators) = match config.format() {
            Format::Compact => (config.length(), 0),
            Format::Hyphenated => (
                crate::HYPHENATED_GROUPS * crate::HYPHENATED_GROUP_LEN,
                crate::HYPHENATED_GROUPS - 1,
            ),
        };

        // Groups are drawn in order, so one pass over the indices covers 1-2-3
        let mut indices = self.inner.buffers.get(symbols);
        sampler.sample_into(&self.inner.entropy, &mut indices, cancel)?;

        let bytes: usize = indices.iter().map(|&i| charset.at(i).len_utf8()).sum();
        let separator_bytes = separators * crate::HYPHENATED_SEPARATOR.len_utf8();
        let mut out = String::with_capacity(bytes + separator_bytes);

        match config.format() {
            Format::Compact => out.extend(indices.iter().map(|&i| charset.at(i))),
            Format::Hyphenated => {
                for (group, chunk) in indices.chunks(crate::HYPHENATED_GROUP_LEN).enumerate() {
                    if group > 0 {
                        out.push(crate::HYPHENATED_SEPARATOR);
                    }
                    out.extend(chunk.iter().map(|&i| charset.at(i)));
                }
            }
        }

        Ok(out)
    }
}
