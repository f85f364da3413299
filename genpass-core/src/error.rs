// SPDX-License-Identifier: MIT
//
// genpass: Secure Token Generator
// Copyright (c) 2025 genpass Contributors

//! Error types for genpass
//!
//! Provides a unified error taxonomy using `thiserror` for ergonomic error handling.
//! Messages are deliberately generic: no variant ever carries random values,
//! selected indices or partial output.

pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for generation operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration validation failed (length, count or worker bounds)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Character set is empty after deduplication
    #[error("Character set cannot be empty")]
    EmptyCharset,

    /// Character set has more distinct symbols than a selection can address
    #[error("Character set too large: {0} distinct symbols (max {})", crate::MAX_CHARSET_SIZE)]
    CharsetTooLarge(usize),

    /// The OS entropy source failed, now or on an earlier call
    #[error("Entropy source unavailable")]
    EntropyUnavailable,

    /// Rejection sampling exceeded its retry cap
    #[error("Random sampling exceeded retry limit")]
    ExcessiveRejection,

    /// Caller cancelled the operation or its timeout expired
    #[error("Operation cancelled")]
    Cancelled,

    /// Failure of one item of a batch
    #[error("Generating string {index}: {source}")]
    AtIndex {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap an error with the batch position it occurred at
    pub fn at_index(index: usize, source: Error) -> Self {
        Error::AtIndex {
            index,
            source: Box::new(source),
        }
    }

    /// Strip batch annotations and return the underlying failure
    pub fn root(&self) -> &Error {
        match self {
            Error::AtIndex { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if error means the generator can no longer be trusted to serve randomness
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.root(),
            Error::EntropyUnavailable | Error::ExcessiveRejection
        )
    }

    /// Check if error was caused by cancellation or timeout
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Error::Cancelled)
    }
}

impl From<envy::Error> for Error {
    fn from(e: envy::Error) -> Self {
        Error::InvalidConfig(format!("Failed to parse environment variables: {}", e))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_cancelled() {
            Error::Cancelled
        } else {
            Error::Internal("generation task panicked".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_unwraps_nested_annotations() {
        let err = Error::at_index(3, Error::at_index(1, Error::ExcessiveRejection));
        assert!(matches!(err.root(), Error::ExcessiveRejection));
        assert!(err.is_fatal());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_messages_are_generic() {
        let err = Error::at_index(7, Error::EntropyUnavailable);
        assert_eq!(
            err.to_string(),
            "Generating string 7: Entropy source unavailable"
        );
        assert_eq!(
            Error::CharsetTooLarge(300).to_string(),
            "Character set too large: 300 distinct symbols (max 256)"
        );
    }
}
