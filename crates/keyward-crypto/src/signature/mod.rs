//! Textbook RSA-style signatures over SHA-256 digests.
//!
//! `sign(d, N, m) = H(m)^d mod N` and verification checks
//! `s^e mod N == H(m) mod N`. No padding and no domain separation are
//! applied, so the scheme is existentially forgeable through multiplicative
//! relations between signatures. It exists to make the authentication step
//! of the exchange visible, not to provide real unforgeability.
//!
//! # Components
//!
//! - [`keygen`]: prime selection, exponent choice, modular inverse

pub mod keygen;

use std::fmt;

use num_bigint::BigUint;
use num_traits::Zero;

pub use keygen::{PrimeRange, generate_keypair};

use crate::{error::CryptoError, hash::digest_to_integer};

/// Public verification key `(e, N)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    /// Public exponent
    pub e: BigUint,
    /// Modulus
    pub n: BigUint,
}

/// Private signing key `(d, N)`.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    /// Private exponent
    pub d: BigUint,
    /// Modulus
    pub n: BigUint,
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey").field("n", &self.n).finish_non_exhaustive()
    }
}

/// A participant's signing key pair. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    /// Verification half, shared with peers
    pub public: PublicKey,
    /// Signing half, never leaves its owner
    pub private: PrivateKey,
}

/// A signature: `H(m)^d mod N`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(pub BigUint);

impl Signature {
    /// The signature as an integer.
    pub fn value(&self) -> &BigUint {
        &self.0
    }
}

/// Sign `message` with `key`.
///
/// # Errors
///
/// - `Validation` if the modulus is below 2
pub fn sign(key: &PrivateKey, message: &[u8]) -> Result<Signature, CryptoError> {
    check_modulus(&key.n)?;
    let digest = digest_to_integer(message);
    Ok(Signature(digest.modpow(&key.d, &key.n)))
}

/// Verify `signature` over `message` against `key`.
///
/// Returns `Ok(false)` on a mismatch; only malformed inputs are errors.
///
/// # Errors
///
/// - `Validation` if the modulus is below 2, the exponent is zero, or the
///   signature is not smaller than the modulus
pub fn verify(key: &PublicKey, message: &[u8], signature: &Signature) -> Result<bool, CryptoError> {
    check_modulus(&key.n)?;
    if key.e.is_zero() {
        return Err(CryptoError::validation("public exponent is zero"));
    }
    if signature.0 >= key.n {
        return Err(CryptoError::validation("signature is not smaller than the modulus"));
    }

    let digest = digest_to_integer(message) % &key.n;
    Ok(signature.0.modpow(&key.e, &key.n) == digest)
}

fn check_modulus(n: &BigUint) -> Result<(), CryptoError> {
    if *n < BigUint::from(2u32) {
        return Err(CryptoError::validation(format!("modulus {n} is below 2")));
    }
    Ok(())
}
