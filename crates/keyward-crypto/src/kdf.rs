//! Iterated-hash key stretching
//!
//! `material = decimal(shared_secret)`, then `material = SHA-256(material)`
//! exactly `iterations` times. The iteration count is the only cost knob.
//! This slows guessing of the small shared secrets produced by toy domain
//! parameters; it does not replace HKDF or PBKDF2.

use std::fmt;

use num_bigint::BigUint;
use zeroize::Zeroize;

use crate::{
    error::CryptoError,
    hash::{DIGEST_LEN, encode_integer, sha256},
};

/// Length of a derived key in bytes
pub const DERIVED_KEY_LEN: usize = DIGEST_LEN;

/// Iteration count used when no configuration overrides it
pub const DEFAULT_ITERATIONS: u32 = 10_000;

/// A stretched symmetric key. Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKey([u8; DERIVED_KEY_LEN]);

impl DerivedKey {
    /// Wrap raw key bytes (for keys agreed out of band).
    pub fn from_bytes(bytes: [u8; DERIVED_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; DERIVED_KEY_LEN] {
        &self.0
    }

    /// Lowercase hex of the key bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Stretch `shared_secret` into a 32-byte key.
///
/// Performs exactly `iterations` hash calls regardless of input.
///
/// # Errors
///
/// - `InvalidArgument` if `iterations` is zero
pub fn derive_key(shared_secret: &BigUint, iterations: u32) -> Result<DerivedKey, CryptoError> {
    if iterations == 0 {
        return Err(CryptoError::invalid_argument("iteration count must be positive"));
    }

    let mut seed = encode_integer(shared_secret);
    let mut material = [0u8; DERIVED_KEY_LEN];

    for i in 0..iterations {
        let next = if i == 0 { sha256(&seed) } else { sha256(&material) };
        material.zeroize();
        material = next;

        if is_progress_point(i, iterations) {
            tracing::trace!(iteration = i + 1, iterations, "key stretching progress");
        }
    }
    seed.zeroize();

    tracing::debug!(iterations, "derived symmetric key");
    Ok(DerivedKey(material))
}

/// Every tenth of the run, starting with the first hash.
fn is_progress_point(index: u32, iterations: u32) -> bool {
    index % (iterations / 10).max(1) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_stretch(secret: &str, iterations: u32) -> [u8; 32] {
        let mut material = secret.as_bytes().to_vec();
        for _ in 0..iterations {
            material = sha256(&material).to_vec();
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&material);
        out
    }

    #[test]
    fn single_iteration_hashes_decimal_text() {
        let key = derive_key(&BigUint::from(924u32), 1).unwrap();
        assert_eq!(key.as_bytes(), &sha256(b"924"));
    }

    #[test]
    fn matches_reference_construction() {
        let key = derive_key(&BigUint::from(924u32), 37).unwrap();
        assert_eq!(key.as_bytes(), &reference_stretch("924", 37));
    }

    #[test]
    fn derive_is_deterministic() {
        let secret = BigUint::from(1_234_567u32);
        let first = derive_key(&secret, DEFAULT_ITERATIONS).unwrap();
        let second = derive_key(&secret, DEFAULT_ITERATIONS).unwrap();
        assert_eq!(first, second, "same inputs must produce same output");
    }

    #[test]
    fn iteration_count_changes_key() {
        let secret = BigUint::from(924u32);
        assert_ne!(derive_key(&secret, 10).unwrap(), derive_key(&secret, 11).unwrap());
    }

    #[test]
    fn different_secrets_produce_different_keys() {
        let a = derive_key(&BigUint::from(924u32), 100).unwrap();
        let b = derive_key(&BigUint::from(925u32), 100).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn zero_iterations_rejected() {
        let result = derive_key(&BigUint::from(924u32), 0);
        assert!(matches!(result, Err(CryptoError::InvalidArgument { .. })));
    }

    #[test]
    fn hex_and_debug() {
        let key = derive_key(&BigUint::from(924u32), 1).unwrap();
        assert_eq!(key.to_hex(), hex::encode(sha256(b"924")));
        assert_eq!(format!("{key:?}"), "DerivedKey(..)");
    }

    #[test]
    fn progress_reported_every_tenth_from_the_first_hash() {
        let points: Vec<u32> =
            (0..DEFAULT_ITERATIONS).filter(|&i| is_progress_point(i, DEFAULT_ITERATIONS)).collect();
        assert_eq!(points, (0..10).map(|k| k * 1_000).collect::<Vec<_>>());

        // Short runs report every hash
        assert!((0..7).all(|i| is_progress_point(i, 7)));
        assert!(is_progress_point(0, 1));
    }
}
