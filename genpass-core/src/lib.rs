// SPDX-License-Identifier: MIT
//
// genpass: Secure Token Generator
// Copyright (c) 2025 genpass Contributors

//! genpass Core Library
//!
//! This crate generates cryptographically secure random strings (passwords,
//! tokens) from a caller-supplied alphabet, drawing all randomness from the
//! operating system CSPRNG and mapping it onto the alphabet without modulo bias.
//!
//! # Architecture
//!
//! The library is organized into modules representing core concerns:
//! - `entropy`: Fail-closed wrapper around the OS random source
//! - `charset`: Deduplicated, ordered alphabets
//! - `sampler`: Unbiased index selection (bitmask or rejection sampling)
//! - `generator`: Single-string generation in hyphenated or compact shape
//! - `batch`: Ordered batch generation over a bounded worker pool, and streaming
//! - `buffer`: Reusable, zeroize-on-return index scratch buffers
//! - `config`: Configuration management with validation
//! - `metrics`: Counters and latency tracking
//! - `error`: Unified error types
//!
//! # Example
//!
//! ```no_run
//! use genpass_core::{CryptoGenerator, GeneratorConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> genpass_core::Result<()> {
//! let generator = CryptoGenerator::new();
//! let config = GeneratorConfig {
//!     count: 5,
//!     ..GeneratorConfig::compact(24)
//! };
//! for token in generator.generate_batch(&config, &CancellationToken::new()).await? {
//!     println!("{}", token);
//! }
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod buffer;
pub mod charset;
pub mod config;
pub mod entropy;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod sampler;

pub use charset::CharacterSet;
pub use config::{Format, GeneratorConfig, ValidatedConfig};
pub use entropy::{ByteSource, EntropySource, OsByteSource};
pub use error::{Error, Result};
pub use generator::CryptoGenerator;
pub use metrics::StatsSnapshot;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Largest alphabet a selection can address
pub const MAX_CHARSET_SIZE: usize = 256;

/// Longest compact string
pub const MAX_STRING_LENGTH: usize = 1024;

/// Most strings per batch
pub const MAX_BATCH_SIZE: usize = 1000;

/// Upper bound on concurrent workers
pub const MAX_WORKERS: usize = 32;

/// Hyphenated shape: `XXXXXX-XXXXXX-XXXXXX`
pub const HYPHENATED_GROUPS: usize = 3;
pub const HYPHENATED_GROUP_LEN: usize = 6;
pub const HYPHENATED_SEPARATOR: char = '-';
pub const HYPHENATED_LEN: usize = HYPHENATED_GROUPS * HYPHENATED_GROUP_LEN + HYPHENATED_GROUPS - 1;

/// Initial capacity of pooled index buffers (slots)
pub const DEFAULT_BUFFER_CAPACITY: usize = MAX_STRING_LENGTH;

/// Idle buffers kept per generator
pub const DEFAULT_POOL_BUFFERS: usize = 1024;
