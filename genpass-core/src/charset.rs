// SPDX-License-Identifier: MIT
//
// genpass: Secure Token Generator
// Copyright (c) 2025 genpass Contributors

//! Deduplicated, ordered alphabets

use crate::{Error, Result, MAX_CHARSET_SIZE};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

pub const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
pub const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const DIGITS: &str = "0123456789";

/// Lowercase, uppercase and digits (62 symbols), the default alphabet
pub const ALPHANUMERIC: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Immutable alphabet used for index selection
///
/// Symbols keep their first-seen order so a given index always maps to the
/// same symbol. When the size is a power of two, `mask` is `len - 1` and
/// selection can use a bitwise AND instead of rejection sampling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterSet {
    chars: Vec<char>,
    mask: u64,
    power_of_two: bool,
}

impl CharacterSet {
    /// Build a character set from raw input, dropping repeated symbols
    pub fn new(raw: &str) -> Result<Self> {
        let mut seen = HashSet::new();
        let chars: Vec<char> = raw.chars().filter(|c| seen.insert(*c)).collect();

        if chars.is_empty() {
            return Err(Error::EmptyCharset);
        }
        if chars.len() > MAX_CHARSET_SIZE {
            return Err(Error::CharsetTooLarge(chars.len()));
        }

        let power_of_two = chars.len().is_power_of_two();
        let mask = if power_of_two {
            chars.len() as u64 - 1
        } else {
            0
        };

        Ok(Self {
            chars,
            mask,
            power_of_two,
        })
    }

    /// Symbol for an arbitrary index, wrapping by mask or modulo
    pub fn at(&self, index: u64) -> char {
        if self.power_of_two {
            self.chars[(index & self.mask) as usize]
        } else {
            self.chars[(index % self.chars.len() as u64) as usize]
        }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Always false: construction rejects empty sets
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn is_power_of_two(&self) -> bool {
        self.power_of_two
    }

    /// `len - 1` for power-of-two sets, zero otherwise
    pub fn mask(&self) -> u64 {
        self.mask
    }

    pub fn contains(&self, c: char) -> bool {
        self.chars.contains(&c)
    }

    pub fn symbols(&self) -> &[char] {
        &self.chars
    }
}

impl Default for CharacterSet {
    fn default() -> Self {
        Self {
            chars: ALPHANUMERIC.chars().collect(),
            mask: 0,
            power_of_two: false,
        }
    }
}

impl FromStr for CharacterSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for CharacterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.chars.iter().try_for_each(|c| write!(f, "{}", c))
    }
}
