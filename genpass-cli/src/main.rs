// SPDX-License-Identifier: MIT
//
// genpass: Secure Token Generator
// Copyright (c) 2025 genpass Contributors

//! genpass - Secure password generator
//!
//! Prints one cryptographically secure string per line on stdout. Logs and
//! statistics go to stderr so the output can be piped safely.
//!
//! Configuration is read from `GENPASS_*` environment variables first; any
//! command-line flag overrides the matching variable.

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use genpass_core::{CryptoGenerator, Format, GeneratorConfig};
use std::io::{self, BufWriter, Write};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "genpass", version)]
#[command(about = "Secure password generator")]
#[command(long_about = "Generate cryptographically secure passwords.

Formats:
  hyphenated  6char-6char-6char (default)
  compact     custom length string")]
struct Args {
    /// Output format (hyphenated|compact)
    #[arg(short = 't', long = "type", value_name = "FORMAT")]
    format: Option<Format>,

    /// Length for compact format
    #[arg(short, long)]
    length: Option<usize>,

    /// Number of passwords
    #[arg(short, long)]
    count: Option<usize>,

    /// Character set
    #[arg(short = 's', long)]
    charset: Option<String>,

    /// Parallel generation
    #[arg(short, long, value_name = "BOOL")]
    parallel: Option<bool>,

    /// Worker threads (0 = number of CPUs)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Timeout in milliseconds (0 = none)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Show statistics
    #[arg(long)]
    stats: bool,

    /// Show statistics as JSON
    #[arg(long)]
    stats_json: bool,

    /// Stream output
    #[arg(long)]
    stream: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    /// Overlay command-line flags on top of a base configuration
    fn apply(&self, mut config: GeneratorConfig) -> GeneratorConfig {
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(length) = self.length {
            config.length = length;
        }
        if let Some(count) = self.count {
            config.count = count;
        }
        if let Some(charset) = &self.charset {
            config.charset = charset.clone();
        }
        if let Some(parallel) = self.parallel {
            config.parallel = parallel;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        config
    }
}

/// Generate in batch mode; nothing is printed unless every string succeeded
async fn run_batch(
    generator: &CryptoGenerator,
    config: &GeneratorConfig,
    cancel: &CancellationToken,
) -> Result<usize> {
    let results = generator
        .generate_batch(config, cancel)
        .await
        .context("generation failed")?;

    let mut out = BufWriter::new(io::stdout().lock());
    for result in &results {
        writeln!(out, "{}", result)?;
    }
    out.flush()?;
    Ok(results.len())
}

/// Generate in streaming mode, printing each string as soon as it exists
async fn run_stream(
    generator: &CryptoGenerator,
    config: &GeneratorConfig,
    cancel: &CancellationToken,
) -> Result<usize> {
    let mut stream = Box::pin(generator.generate_stream(config, cancel));
    let mut generated = 0;
    while let Some(item) = stream.next().await {
        match item {
            Ok(s) => {
                let mut out = io::stdout().lock();
                writeln!(out, "{}", s)?;
                out.flush()?;
                generated += 1;
            }
            Err(e) if e.is_cancelled() => {
                warn!("Stream cancelled after {} strings", generated);
                break;
            }
            Err(e) => warn!("Skipping failed string: {}", e),
        }
    }
    Ok(generated)
}

fn print_stats(
    generator: &CryptoGenerator,
    elapsed: Duration,
    produced: usize,
    as_json: bool,
) -> Result<()> {
    let snapshot = generator.stats();
    let throughput = if elapsed.as_secs_f64() > 0.0 {
        produced as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    let mut err = io::stderr().lock();
    if as_json {
        let report = serde_json::json!({
            "batch_duration_micros": elapsed.as_micros() as u64,
            "throughput_per_sec": throughput,
            "generator": snapshot,
        });
        writeln!(err, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        writeln!(err, "\n--- Generation Statistics ---")?;
        writeln!(err, "Batch Duration: {:?}", elapsed)?;
        writeln!(err, "Throughput: {:.2} strings/sec", throughput)?;
        writeln!(err, "{}", snapshot)?;
    }
    Ok(())
}

/// Cancel the run on Ctrl+C
async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("Received Ctrl+C signal, cancelling");
            cancel.cancel();
        }
        Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Initialize tracing on stderr; stdout carries generated strings only
    let log_level = args
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::WARN);

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(io::stderr)
        .json()
        .init();

    // Environment first, flags on top, then a single validation pass
    let base =
        GeneratorConfig::from_env().context("Failed to load configuration from environment")?;
    let config = args.apply(base);
    let validated = config.validate().context("invalid configuration")?;
    info!(
        format = %validated.format(),
        count = validated.count(),
        parallel = validated.parallel(),
        workers = validated.workers(),
        "genpass v{}",
        genpass_core::VERSION
    );

    let generator = CryptoGenerator::new();
    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let start = Instant::now();
    let produced = if args.stream {
        run_stream(&generator, &config, &cancel).await?
    } else {
        run_batch(&generator, &config, &cancel).await?
    };
    let elapsed = start.elapsed();

    if args.stats || args.stats_json {
        print_stats(&generator, elapsed, produced, args.stats_json)?;
    }
    Ok(())
}
