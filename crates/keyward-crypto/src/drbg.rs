//! HMAC-chained deterministic bit generator
//!
//! # Security Properties
//!
//! - Ratchet: every draw replaces the state with `HMAC(state, output)`, and
//!   the old state is zeroized
//! - Determinism: identical seeds and identical call sequences in
//!   deterministic mode produce identical outputs
//! - Non-deterministic draws mix fresh OS entropy into each output block and
//!   are never reproducible

use std::time::{SystemTime, UNIX_EPOCH};

use num_bigint::BigUint;
use zeroize::Zeroize;

use crate::{
    entropy::{RandomSource, SecureEntropy},
    error::CryptoError,
    hash::{DIGEST_LEN, hmac_sha256, sha256},
};

/// Largest output a single draw can return (one HMAC-SHA256 block)
pub const MAX_OUTPUT_SIZE: usize = DIGEST_LEN;

/// Output width used by [`DeterministicBitGenerator::new`]
pub const DEFAULT_OUTPUT_SIZE: usize = 8;

/// Prefix of every generate message
const GENERATE_LABEL: &[u8] = b"generate";

/// Bytes of OS entropy mixed into non-deterministic draws and default
/// `add_entropy` calls
const FRESH_ENTROPY_LEN: usize = 16;

/// Stateful HMAC-SHA256 bit generator.
///
/// The generator starts uninitialized; every draw before
/// [`initialize_seed`](Self::initialize_seed) fails with
/// [`CryptoError::NotInitialized`].
///
/// Each [`generate_number`](Self::generate_number) call:
/// 1. Computes `block = HMAC(state, "generate" [|| fresh bytes])`
/// 2. Replaces `state` with `HMAC(state, block)`
/// 3. Returns the leading bytes of `block` as a big-endian integer
///
/// A single instance must not be shared between threads without external
/// locking; independent instances are cheap.
pub struct DeterministicBitGenerator {
    /// Current internal state, absent until seeded
    state: Option<[u8; DIGEST_LEN]>,
    /// Bytes consumed per block when serving as a [`RandomSource`]
    output_size: usize,
}

impl DeterministicBitGenerator {
    /// Create an unseeded generator with the default output size.
    pub fn new() -> Self {
        Self { state: None, output_size: DEFAULT_OUTPUT_SIZE }
    }

    /// Create a generator already seeded with `seed`.
    pub fn from_seed(seed: &[u8]) -> Self {
        Self { state: Some(sha256(seed)), output_size: DEFAULT_OUTPUT_SIZE }
    }

    /// Set the number of bytes taken from each block when this generator is
    /// used as a [`RandomSource`].
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `output_size` is zero or exceeds
    ///   [`MAX_OUTPUT_SIZE`]
    pub fn with_output_size(mut self, output_size: usize) -> Result<Self, CryptoError> {
        check_output_size(output_size)?;
        self.output_size = output_size;
        Ok(self)
    }

    /// Bytes taken per block when used as a [`RandomSource`].
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Whether `initialize_seed` has been called.
    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Seed the generator and return the seed material used.
    ///
    /// With `None`, seed material is synthesized from the wall clock, the
    /// process id and 8 bytes of OS entropy. That path is NOT reproducible.
    pub fn initialize_seed(&mut self, seed: Option<&[u8]>) -> Result<Vec<u8>, CryptoError> {
        let seed_used = match seed {
            Some(seed) => seed.to_vec(),
            None => synthesize_seed()?,
        };

        self.replace_state(sha256(&seed_used));
        tracing::debug!(seed_len = seed_used.len(), "bit generator seeded");

        Ok(seed_used)
    }

    /// Mix additional input into the state: `state = H(state || input)`.
    ///
    /// With `None`, 16 bytes of OS entropy are mixed in.
    pub fn add_entropy(&mut self, input: Option<&[u8]>) -> Result<(), CryptoError> {
        let state = self.state.as_ref().ok_or(CryptoError::NotInitialized)?;

        let mut material = state.to_vec();
        match input {
            Some(input) => material.extend_from_slice(input),
            None => {
                let mut fresh = [0u8; FRESH_ENTROPY_LEN];
                SecureEntropy.fill_bytes(&mut fresh)?;
                material.extend_from_slice(&fresh);
            },
        }

        let next = sha256(&material);
        material.zeroize();
        self.replace_state(next);
        Ok(())
    }

    /// Draw one integer of at most `output_size` bytes.
    ///
    /// In deterministic mode the output depends only on the state. Otherwise
    /// fresh OS entropy is appended to the generate message.
    ///
    /// # Errors
    ///
    /// - `NotInitialized` before seeding
    /// - `InvalidArgument` if `output_size` is zero or exceeds
    ///   [`MAX_OUTPUT_SIZE`]
    pub fn generate_number(
        &mut self,
        output_size: usize,
        deterministic: bool,
    ) -> Result<BigUint, CryptoError> {
        check_output_size(output_size)?;
        let mut block = self.generate_block(deterministic)?;
        let value = BigUint::from_bytes_be(&block[..output_size]);
        block.zeroize();
        Ok(value)
    }

    /// Draw one full 32-byte output block and ratchet the state.
    pub fn generate_block(&mut self, deterministic: bool) -> Result<[u8; DIGEST_LEN], CryptoError> {
        let state = self.state.as_ref().ok_or(CryptoError::NotInitialized)?;

        let mut message = GENERATE_LABEL.to_vec();
        if !deterministic {
            let mut fresh = [0u8; FRESH_ENTROPY_LEN];
            SecureEntropy.fill_bytes(&mut fresh)?;
            message.extend_from_slice(&fresh);
        }

        let block = hmac_sha256(state, &message);
        let next = hmac_sha256(state, &block);
        self.replace_state(next);

        Ok(block)
    }

    /// Zeroize the old state and install `next`.
    fn replace_state(&mut self, next: [u8; DIGEST_LEN]) {
        if let Some(old) = self.state.as_mut() {
            old.zeroize();
        }
        self.state = Some(next);
    }
}

impl Default for DeterministicBitGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DeterministicBitGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeterministicBitGenerator")
            .field("initialized", &self.is_initialized())
            .field("output_size", &self.output_size)
            .finish_non_exhaustive()
    }
}

/// Deterministic draws only: a seeded generator used as a source yields a
/// reproducible byte stream.
impl RandomSource for DeterministicBitGenerator {
    fn fill_bytes(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
        let width = self.output_size;
        for chunk in buf.chunks_mut(width) {
            let mut block = self.generate_block(true)?;
            chunk.copy_from_slice(&block[..chunk.len()]);
            block.zeroize();
        }
        Ok(())
    }
}

impl Drop for DeterministicBitGenerator {
    fn drop(&mut self) {
        if let Some(state) = self.state.as_mut() {
            state.zeroize();
        }
    }
}

fn check_output_size(output_size: usize) -> Result<(), CryptoError> {
    if output_size == 0 || output_size > MAX_OUTPUT_SIZE {
        return Err(CryptoError::invalid_argument(format!(
            "output size {output_size} outside 1..={MAX_OUTPUT_SIZE}"
        )));
    }
    Ok(())
}

/// `"{unix_time}_{pid}_{16 hex chars}"`
#[allow(clippy::disallowed_methods)]
fn synthesize_seed() -> Result<Vec<u8>, CryptoError> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();

    let mut nonce = [0u8; 8];
    SecureEntropy.fill_bytes(&mut nonce)?;

    let seed = format!(
        "{}.{:09}_{}_{}",
        now.as_secs(),
        now.subsec_nanos(),
        std::process::id(),
        hex::encode(nonce)
    );
    Ok(seed.into_bytes())
}
