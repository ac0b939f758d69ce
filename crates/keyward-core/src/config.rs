//! Pipeline configuration.

use keyward_crypto::{DEFAULT_ITERATIONS, DeterministicBitGenerator, PrimeRange, drbg};

use crate::error::ExchangeError;

/// Tunables for key generation, key stretching and the bit generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Range from which signing primes are drawn. Must be wide enough that
    /// `N` exceeds the digest values it signs, or signing reduces digests
    /// mod `N`
    pub prime_range: PrimeRange,
    /// Hash iterations in key derivation (linear cost)
    pub kdf_iterations: u32,
    /// Bytes per bit generator draw, at most the digest length
    pub prng_output_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            prime_range: PrimeRange::default(),
            kdf_iterations: DEFAULT_ITERATIONS,
            prng_output_size: drbg::DEFAULT_OUTPUT_SIZE,
        }
    }
}

impl PipelineConfig {
    /// Check every field against its accepted range.
    pub fn validate(&self) -> Result<(), ExchangeError> {
        self.prime_range
            .validate()
            .map_err(|e| ExchangeError::Config(format!("prime_range: {e}")))?;

        if self.kdf_iterations == 0 {
            return Err(ExchangeError::Config("kdf_iterations must be positive".to_string()));
        }

        if self.prng_output_size == 0 || self.prng_output_size > drbg::MAX_OUTPUT_SIZE {
            return Err(ExchangeError::Config(format!(
                "prng_output_size {} outside 1..={}",
                self.prng_output_size,
                drbg::MAX_OUTPUT_SIZE
            )));
        }

        Ok(())
    }

    /// A seeded bit generator drawing [`prng_output_size`](Self::prng_output_size)
    /// bytes per block.
    ///
    /// # Errors
    ///
    /// - `Config` if the output size is out of range
    pub fn bit_generator(&self, seed: &[u8]) -> Result<DeterministicBitGenerator, ExchangeError> {
        DeterministicBitGenerator::from_seed(seed)
            .with_output_size(self.prng_output_size)
            .map_err(|e| ExchangeError::Config(format!("prng_output_size: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use keyward_crypto::RandomSource;

    use super::*;

    #[test]
    fn default_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.prime_range, PrimeRange { min: 200, max: 300 });
        assert_eq!(config.kdf_iterations, 10_000);
        assert_eq!(config.prng_output_size, 8);
    }

    #[test]
    fn rejects_zero_iterations() {
        let config = PipelineConfig { kdf_iterations: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ExchangeError::Config(_))));
    }

    #[test]
    fn rejects_oversized_output() {
        let config = PipelineConfig { prng_output_size: 33, ..Default::default() };
        assert!(matches!(config.validate(), Err(ExchangeError::Config(_))));

        let config = PipelineConfig { prng_output_size: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn bit_generator_uses_output_size() {
        let narrow = PipelineConfig { prng_output_size: 1, ..Default::default() };
        let wide = PipelineConfig { prng_output_size: 32, ..Default::default() };

        let mut a = narrow.bit_generator(b"seed").unwrap();
        let mut b = wide.bit_generator(b"seed").unwrap();
        assert_eq!(a.output_size(), 1);
        assert_eq!(b.output_size(), 32);

        // Same first block, but the narrow generator ratchets after every byte
        let mut from_narrow = [0u8; 16];
        let mut from_wide = [0u8; 16];
        a.fill_bytes(&mut from_narrow).unwrap();
        b.fill_bytes(&mut from_wide).unwrap();
        assert_eq!(from_narrow[0], from_wide[0]);
        assert_ne!(from_narrow, from_wide);
    }

    #[test]
    fn bit_generator_rejects_invalid_output_size() {
        let config = PipelineConfig { prng_output_size: 0, ..Default::default() };
        assert!(matches!(config.bit_generator(b"seed"), Err(ExchangeError::Config(_))));
    }

    #[test]
    fn rejects_degenerate_prime_range() {
        let config = PipelineConfig {
            prime_range: PrimeRange { min: 300, max: 200 },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ExchangeError::Config(msg)) if msg.starts_with("prime_range")
        ));
    }
}
