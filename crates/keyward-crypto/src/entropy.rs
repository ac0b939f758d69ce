//! Randomness sources.
//!
//! Two capabilities are kept apart: [`SecureEntropy`] reads the OS RNG and is
//! never reproducible, while [`crate::DeterministicBitGenerator`] yields a
//! reproducible stream for a given seed. Both implement [`RandomSource`], and
//! each consumer is handed one explicitly.

use num_bigint::BigUint;
use num_traits::ToPrimitive;

use crate::error::CryptoError;

/// Upper bound on rejection-sampling draws in [`uniform_in_range`].
///
/// Each draw lands in range with probability above one half, so exhausting
/// this bound indicates a broken source.
pub const MAX_SAMPLING_ATTEMPTS: u32 = 256;

/// A source of random bytes.
pub trait RandomSource {
    /// Fill `buf` entirely with random bytes.
    fn fill_bytes(&mut self, buf: &mut [u8]) -> Result<(), CryptoError>;
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn fill_bytes(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
        (**self).fill_bytes(buf)
    }
}

/// OS cryptographic RNG (getrandom).
///
/// Suitable for seeding and for draws that must not be reproducible. Must
/// not be used where a test or protocol requires a repeatable stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecureEntropy;

impl SecureEntropy {
    /// Create a handle to the OS RNG.
    pub fn new() -> Self {
        Self
    }
}

impl RandomSource for SecureEntropy {
    fn fill_bytes(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
        getrandom::fill(buf)
            .map_err(|e| CryptoError::EntropyUnavailable { reason: e.to_string() })
    }
}

/// Draw an integer uniformly from the inclusive range `[low, high]`.
///
/// Uses masked rejection sampling: the span is drawn in its minimal byte
/// width with excess high bits cleared, and out-of-range candidates are
/// discarded.
///
/// # Errors
///
/// - `InvalidArgument` if `low > high`
/// - `SamplingExhausted` if no candidate lands in range within
///   [`MAX_SAMPLING_ATTEMPTS`] draws
pub fn uniform_in_range<R: RandomSource + ?Sized>(
    source: &mut R,
    low: &BigUint,
    high: &BigUint,
) -> Result<BigUint, CryptoError> {
    if low > high {
        return Err(CryptoError::invalid_argument(format!(
            "empty sampling range [{low}, {high}]"
        )));
    }

    let span = high - low + 1u32;
    let bits = span.bits();
    let width = bits.div_ceil(8) as usize;
    let excess = (width as u64 * 8 - bits) as u32;
    let top_mask = 0xFFu8 >> excess;

    let mut buf = vec![0u8; width];
    for _ in 0..MAX_SAMPLING_ATTEMPTS {
        source.fill_bytes(&mut buf)?;
        buf[0] &= top_mask;

        let candidate = BigUint::from_bytes_be(&buf);
        if candidate < span {
            return Ok(low + candidate);
        }
    }

    Err(CryptoError::SamplingExhausted { attempts: MAX_SAMPLING_ATTEMPTS })
}

/// Draw a `u32` uniformly from the inclusive range `[low, high]`.
pub fn uniform_u32<R: RandomSource + ?Sized>(
    source: &mut R,
    low: u32,
    high: u32,
) -> Result<u32, CryptoError> {
    let value = uniform_in_range(source, &BigUint::from(low), &BigUint::from(high))?;
    value.to_u32().ok_or_else(|| CryptoError::domain("sample exceeded u32 range"))
}
