// SPDX-License-Identifier: MIT
//
// genpass: Secure Token Generator
// Copyright (c) 2025 genpass Contributors

//! Unbiased index selection over a character set
//!
//! A uniformly random `u64` reduced with `% n` over-represents low remainders
//! whenever `n` does not divide 2^64. The sampler removes that bias:
//!
//! - **Power-of-two sets**: the low `log2(n)` bits of a uniform value are
//!   themselves uniform, so `value & (n - 1)` is exact.
//! - **Other sets**: values at or above `limit = u64::MAX - (u64::MAX % n)` are
//!   discarded and redrawn. Every accepted value lies in a range that is an
//!   exact multiple of `n`, so `value % n` is uniform.
//!
//! Each redraw is accepted with probability above 1/2 for any `n <= 256`, so
//! the retry cap is an invariant check against a degraded source rather than
//! an operational path.

use crate::charset::CharacterSet;
use crate::entropy::EntropySource;
use crate::{Error, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use zeroize::Zeroizing;

/// Maximum redraws per character before giving up
pub const MAX_REJECTIONS: u32 = 10;

/// Maps raw entropy onto indices of one [`CharacterSet`]
#[derive(Debug, Clone)]
pub struct UnbiasedSampler {
    charset: Arc<CharacterSet>,
    limit: u64,
}

impl UnbiasedSampler {
    pub fn new(charset: Arc<CharacterSet>) -> Self {
        let n = charset.len() as u64;
        let limit = u64::MAX - (u64::MAX % n);
        Self { charset, limit }
    }

    pub fn charset(&self) -> &CharacterSet {
        &self.charset
    }

    /// Exclusive upper bound on accepted raw values for the rejection path
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Draw one index in `[0, charset.len())`
    pub fn sample(&self, entropy: &EntropySource) -> Result<u64> {
        let mut value = Zeroizing::new(entropy.uint64()?);

        if self.charset.is_power_of_two() {
            return Ok(*value & self.charset.mask());
        }

        let mut retries = 0;
        while *value >= self.limit {
            if retries >= MAX_REJECTIONS {
                warn!(
                    charset_len = self.charset.len(),
                    retries, "Rejection sampling retry cap exceeded, entropy source may be degraded"
                );
                return Err(Error::ExcessiveRejection);
            }
            *value = entropy.uint64()?;
            retries += 1;
        }

        Ok(*value % self.charset.len() as u64)
    }

    /// Fill `out` with indices, stopping early if `cancel` fires
    ///
    /// On error the slots written so far are zeroed before returning.
    pub fn sample_into(
        &self,
        entropy: &EntropySource,
        out: &mut [u64],
        cancel: &CancellationToken,
    ) -> Result<()> {
        for i in 0..out.len() {
            let drawn = if cancel.is_cancelled() {
                Err(Error::Cancelled)
            } else {
                self.sample(entropy)
            };
            match drawn {
                Ok(index) => out[i] = index,
                Err(e) => {
                    out[..i].iter_mut().for_each(|slot| *slot = 0);
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::ALPHANUMERIC;
    use crate::entropy::testing::SequenceSource;
    use proptest::prelude::*;
    use std::sync::atomic::Ordering;

    fn sampler(raw: &str) -> UnbiasedSampler {
        UnbiasedSampler::new(Arc::new(CharacterSet::new(raw).unwrap()))
    }

    fn frequencies(sampler: &UnbiasedSampler, draws: usize) -> Vec<usize> {
        let entropy = EntropySource::new();
        let mut counts = vec![0usize; sampler.charset().len()];
        for _ in 0..draws {
            counts[sampler.sample(&entropy).unwrap() as usize] += 1;
        }
        counts
    }

    fn chi_square(counts: &[usize], draws: usize) -> f64 {
        let expected = draws as f64 / counts.len() as f64;
        counts
            .iter()
            .map(|&c| (c as f64 - expected).powi(2) / expected)
            .sum()
    }

    #[test]
    fn test_limit_is_multiple_of_len() {
        for n in 1..=256usize {
            let raw: String = (0..n as u32).filter_map(|i| char::from_u32(0x100 + i)).collect();
            let s = sampler(&raw);
            assert_eq!(s.limit() % n as u64, 0, "n = {}", n);
            assert!(u64::MAX - s.limit() < n as u64);
        }
    }

    #[test]
    fn test_rejects_overflow_region_and_redraws() {
        let source = SequenceSource::new(vec![u64::MAX, 5]);
        let draws = source.draws();
        let entropy = EntropySource::with_source(source);
        let s = sampler(ALPHANUMERIC);

        assert_eq!(s.sample(&entropy).unwrap(), 5);
        assert_eq!(draws.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_accepts_value_just_below_limit() {
        let s = sampler(ALPHANUMERIC);
        let entropy = EntropySource::with_source(SequenceSource::new(vec![s.limit() - 1]));
        assert_eq!(s.sample(&entropy).unwrap(), (s.limit() - 1) % 62);
    }

    #[test]
    fn test_power_of_two_never_rejects() {
        let s = sampler("0123456789abcdef");
        let source = SequenceSource::new(vec![u64::MAX]);
        let draws = source.draws();
        let entropy = EntropySource::with_source(source);

        assert_eq!(s.sample(&entropy).unwrap(), 15);
        assert_eq!(draws.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_excessive_rejection_after_cap() {
        let source = SequenceSource::new(vec![u64::MAX]);
        let draws = source.draws();
        let entropy = EntropySource::with_source(source);

        let err = sampler(ALPHANUMERIC).sample(&entropy).unwrap_err();
        assert!(matches!(err, Error::ExcessiveRejection));
        assert_eq!(draws.load(Ordering::Relaxed), 1 + MAX_REJECTIONS as usize);
        assert!(entropy.is_healthy());
    }

    #[test]
    fn test_sample_into_honours_cancellation() {
        let source = SequenceSource::new(vec![1, 2, 3]);
        let draws = source.draws();
        let entropy = EntropySource::with_source(source);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut out = [0u64; 8];
        let err = sampler(ALPHANUMERIC)
            .sample_into(&entropy, &mut out, &cancel)
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(draws.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_sample_into_zeroes_partial_output_on_error() {
        // Two good draws, then a value stuck in the rejection region
        let mut values = vec![7, 9];
        values.extend(std::iter::repeat(u64::MAX).take(64));
        let entropy = EntropySource::with_source(SequenceSource::new(values));

        let mut out = [0u64; 4];
        let err = sampler(ALPHANUMERIC)
            .sample_into(&entropy, &mut out, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::ExcessiveRejection));
        assert_eq!(out, [0; 4]);
    }

    #[test]
    fn test_uniform_over_non_power_of_two() {
        const DRAWS: usize = 100_000;
        let s = sampler(ALPHANUMERIC);
        let counts = frequencies(&s, DRAWS);
        let expected = DRAWS as f64 / 62.0;

        for (i, &c) in counts.iter().enumerate() {
            assert!(
                (c as f64 - expected).abs() < expected * 0.2,
                "symbol {} drawn {} times, expected ~{:.0}",
                i,
                c,
                expected
            );
        }
        // 61 degrees of freedom; 150 is far beyond any plausible fluctuation
        assert!(chi_square(&counts, DRAWS) < 150.0);
    }

    #[test]
    fn test_uniform_over_power_of_two() {
        const DRAWS: usize = 100_000;
        let s = sampler("ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/");
        assert!(s.charset().is_power_of_two());
        let counts = frequencies(&s, DRAWS);
        let expected = DRAWS as f64 / 64.0;

        for &c in &counts {
            assert!((c as f64 - expected).abs() < expected * 0.2);
        }
        assert!(chi_square(&counts, DRAWS) < 150.0);
    }

    proptest! {
        #[test]
        fn prop_index_in_range(n in 1usize..=256, values in proptest::collection::vec(any::<u64>(), 1..16)) {
            let raw: String = (0..n as u32).filter_map(|i| char::from_u32(0x100 + i)).collect();
            let s = sampler(&raw);
            let entropy = EntropySource::with_source(SequenceSource::new(values));
            match s.sample(&entropy) {
                Ok(index) => prop_assert!(index < n as u64),
                Err(e) => prop_assert!(matches!(e, Error::ExcessiveRejection)),
            }
        }
    }
}
