// SPDX-License-Identifier: MIT
//
// genpass: Secure Token Generator
// Copyright (c) 2025 genpass Contributors

//! Metrics collection and reporting

use crate::buffer::PoolStats;
use crate::entropy::EntropyStats;
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const MAX_LATENCY_SAMPLES: usize = 10_000;

/// Per-generator metrics collector
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    start_time: Instant,

    strings_generated: AtomicU64,
    strings_failed: AtomicU64,
    symbols_generated: AtomicU64,
    total_duration_nanos: AtomicU64,

    // Latency tracking (microseconds)
    latencies: RwLock<Vec<u64>>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                start_time: Instant::now(),
                strings_generated: AtomicU64::new(0),
                strings_failed: AtomicU64::new(0),
                symbols_generated: AtomicU64::new(0),
                total_duration_nanos: AtomicU64::new(0),
                latencies: RwLock::new(Vec::with_capacity(MAX_LATENCY_SAMPLES)),
            }),
        }
    }

    pub fn record_success(&self, symbols: usize, elapsed: Duration) {
        self.inner.strings_generated.fetch_add(1, Ordering::Relaxed);
        self.inner
            .symbols_generated
            .fetch_add(symbols as u64, Ordering::Relaxed);
        self.add_duration(elapsed);

        let mut latencies = self.inner.latencies.write();
        latencies.push(elapsed.as_micros() as u64);
        if latencies.len() > MAX_LATENCY_SAMPLES {
            latencies.drain(0..MAX_LATENCY_SAMPLES / 2);
        }
    }

    pub fn record_failure(&self, elapsed: Duration) {
        self.inner.strings_failed.fetch_add(1, Ordering::Relaxed);
        self.add_duration(elapsed);
    }

    fn add_duration(&self, elapsed: Duration) {
        self.inner
            .total_duration_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn strings_generated(&self) -> u64 {
        self.inner.strings_generated.load(Ordering::Relaxed)
    }

    pub fn strings_failed(&self) -> u64 {
        self.inner.strings_failed.load(Ordering::Relaxed)
    }

    pub fn symbols_generated(&self) -> u64 {
        self.inner.symbols_generated.load(Ordering::Relaxed)
    }

    /// Total time spent in generation divided by successful strings
    pub fn average_duration(&self) -> Duration {
        let generated = self.strings_generated();
        if generated == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.inner.total_duration_nanos.load(Ordering::Relaxed) / generated)
    }

    pub fn uptime(&self) -> Duration {
        self.inner.start_time.elapsed()
    }

    pub fn strings_per_second(&self) -> f64 {
        let uptime = self.uptime().as_secs_f64();
        if uptime > 0.0 {
            self.strings_generated() as f64 / uptime
        } else {
            0.0
        }
    }

    pub fn latency_percentile(&self, percentile: f64) -> Option<u64> {
        let latencies = self.inner.latencies.read();
        if latencies.is_empty() {
            return None;
        }

        let mut sorted = latencies.clone();
        sorted.sort_unstable();
        let index = ((sorted.len() as f64 * percentile).ceil() as usize).min(sorted.len() - 1);
        Some(sorted[index])
    }

    pub fn latency_p50(&self) -> Option<u64> {
        self.latency_percentile(0.50)
    }

    pub fn latency_p99(&self) -> Option<u64> {
        self.latency_percentile(0.99)
    }
}

/// Read-only view over generator, entropy and pool counters
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub strings_generated: u64,
    pub strings_failed: u64,
    pub symbols_generated: u64,
    pub average_duration_micros: u64,
    pub latency_p50_micros: Option<u64>,
    pub latency_p99_micros: Option<u64>,
    pub entropy_healthy: bool,
    pub entropy: EntropyStats,
    pub buffers: PoolStats,
    pub workers_busy: usize,
    pub workers_capacity: usize,
}

impl StatsSnapshot {
    pub(crate) fn collect(
        metrics: &Metrics,
        entropy_healthy: bool,
        entropy: EntropyStats,
        buffers: PoolStats,
        workers_busy: usize,
        workers_capacity: usize,
    ) -> Self {
        Self {
            strings_generated: metrics.strings_generated(),
            strings_failed: metrics.strings_failed(),
            symbols_generated: metrics.symbols_generated(),
            average_duration_micros: metrics.average_duration().as_micros() as u64,
            latency_p50_micros: metrics.latency_p50(),
            latency_p99_micros: metrics.latency_p99(),
            entropy_healthy,
            entropy,
            buffers,
            workers_busy,
            workers_capacity,
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Generated: {} strings", self.strings_generated)?;
        writeln!(f, "Total Errors: {}", self.strings_failed)?;
        writeln!(
            f,
            "Average Duration: {:?} per string",
            Duration::from_micros(self.average_duration_micros)
        )?;
        if let (Some(p50), Some(p99)) = (self.latency_p50_micros, self.latency_p99_micros) {
            writeln!(f, "Latency p50/p99: {}us/{}us", p50, p99)?;
        }
        writeln!(f, "Entropy Generated: {} bytes", self.entropy.bytes_generated)?;
        writeln!(f, "Entropy Errors: {}", self.entropy.errors)?;
        writeln!(
            f,
            "Entropy Source: {}",
            if self.entropy_healthy { "healthy" } else { "unhealthy" }
        )?;
        writeln!(
            f,
            "Buffers: {} acquired, {} reused",
            self.buffers.acquired, self.buffers.reused
        )?;
        write!(
            f,
            "Worker Utilization: {}/{}",
            self.workers_busy, self.workers_capacity
        )
    }
}
