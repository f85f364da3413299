// SPDX-License-Identifier: MIT
//
// genpass: Secure Token Generator
// Copyright (c) 2025 genpass Contributors

//! Configuration management for string generation

use crate::charset::{CharacterSet, ALPHANUMERIC};
use crate::sampler::UnbiasedSampler;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Output shape
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Three groups of six symbols joined by `-`
    #[default]
    #[serde(alias = "h")]
    Hyphenated,
    /// One run of `length` symbols
    #[serde(alias = "c")]
    Compact,
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hyphenated" | "h" => Ok(Format::Hyphenated),
            "compact" | "c" => Ok(Format::Compact),
            other => Err(Error::InvalidConfig(format!(
                "unknown format '{}' (expected hyphenated or compact)",
                other
            ))),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Hyphenated => f.write_str("hyphenated"),
            Format::Compact => f.write_str("compact"),
        }
    }
}

/// Generation request as supplied by a caller
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneratorConfig {
    /// Output shape
    #[serde(default)]
    pub format: Format,

    /// Symbols per string; the hyphenated shape ignores it but it must still be in range
    #[serde(default = "default_length")]
    pub length: usize,

    /// Number of strings to produce
    #[serde(default = "default_count")]
    pub count: usize,

    /// Raw alphabet; repeated symbols are dropped
    #[serde(default = "default_charset")]
    pub charset: String,

    /// Generate batch items concurrently
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Concurrent workers (0 = host parallelism)
    #[serde(default)]
    pub workers: usize,

    /// Overall timeout in milliseconds (0 = none)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            format: Format::default(),
            length: default_length(),
            count: default_count(),
            charset: default_charset(),
            parallel: default_true(),
            workers: 0,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl GeneratorConfig {
    /// Compact strings of `length` symbols, other fields defaulted
    pub fn compact(length: usize) -> Self {
        Self {
            format: Format::Compact,
            length,
            ..Self::default()
        }
    }

    /// Hyphenated strings, other fields defaulted
    pub fn hyphenated() -> Self {
        Self::default()
    }

    /// Load configuration from `GENPASS_*` environment variables
    ///
    /// Only parses; callers overlay their own overrides and then [`validate`](Self::validate).
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from `GENPASS_*` key/value pairs without validating
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        Ok(envy::prefixed("GENPASS_").from_iter(vars)?)
    }

    /// Validate configuration and resolve derived values
    ///
    /// Never touches the entropy source.
    pub fn validate(&self) -> Result<ValidatedConfig> {
        if self.length == 0 || self.length > crate::MAX_STRING_LENGTH {
            return Err(Error::InvalidConfig(format!(
                "length must be between 1 and {}",
                crate::MAX_STRING_LENGTH
            )));
        }

        if self.count == 0 || self.count > crate::MAX_BATCH_SIZE {
            return Err(Error::InvalidConfig(format!(
                "count must be between 1 and {}",
                crate::MAX_BATCH_SIZE
            )));
        }

        let charset = CharacterSet::new(&self.charset)?;

        Ok(ValidatedConfig {
            format: self.format,
            length: self.length,
            count: self.count,
            sampler: UnbiasedSampler::new(Arc::new(charset)),
            parallel: self.parallel,
            workers: resolve_workers(self.workers),
            timeout: self.timeout(),
        })
    }

    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_ms > 0 {
            Some(Duration::from_millis(self.timeout_ms))
        } else {
            None
        }
    }
}

/// Configuration that passed validation
///
/// Only obtainable through [`GeneratorConfig::validate`].
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    format: Format,
    length: usize,
    count: usize,
    sampler: UnbiasedSampler,
    parallel: bool,
    workers: usize,
    timeout: Option<Duration>,
}

impl ValidatedConfig {
    pub fn format(&self) -> Format {
        self.format
    }

    /// Symbols per string, including separators for the hyphenated shape
    pub fn output_len(&self) -> usize {
        match self.format {
            Format::Hyphenated => crate::HYPHENATED_LEN,
            Format::Compact => self.length,
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn charset(&self) -> &CharacterSet {
        self.sampler.charset()
    }

    /// Sampler over the validated charset, built once per request
    pub fn sampler(&self) -> &UnbiasedSampler {
        &self.sampler
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

fn resolve_workers(requested: usize) -> usize {
    let workers = if requested == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        requested
    };
    workers.min(crate::MAX_WORKERS)
}

// Default value functions
fn default_length() -> usize {
    15
}

fn default_count() -> usize {
    1
}

fn default_charset() -> String {
    ALPHANUMERIC.to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    30_000
}
