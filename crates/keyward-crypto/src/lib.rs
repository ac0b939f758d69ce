//! Keyward Cryptographic Primitives
//!
//! Building blocks for an authenticated key exchange that ends in a secure
//! channel. Functions are pure apart from the randomness they are handed:
//! every random draw goes through a caller-supplied [`RandomSource`], so tests
//! can substitute a seeded [`DeterministicBitGenerator`] for the OS RNG.
//!
//! # Pipeline
//!
//! ```text
//! Diffie-Hellman shared secret (authenticated by signatures)
//!        │
//!        ▼
//! Iterated SHA-256 → DerivedKey (32 bytes)
//!        │
//!        ▼
//! AES-256-CBC + HMAC-SHA256 (encrypt-then-MAC) → SecureMessage
//! ```
//!
//! # Security
//!
//! The signature scheme is unpadded textbook RSA over SHA-256 digests and
//! the default prime range yields moduli of about 16 bits. Both exist to keep
//! the arithmetic human-scale. Neither resists a motivated attacker; no
//! side-channel hardening is attempted.
//!
//! Integrity:
//! - The tag is computed over the ciphertext and verified in constant time
//! - A message that fails verification is never decrypted
//! - Padding failures after a valid tag report one generic error
//!
//! Randomness:
//! - [`SecureEntropy`] is the only source suitable for seeding
//! - [`DeterministicBitGenerator`] ratchets its state on every draw

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod channel;
pub mod drbg;
pub mod entropy;
pub mod error;
pub mod hash;
pub mod kdf;
pub mod signature;

pub use channel::{IV_LEN, KEY_LEN, SecureMessage, TAG_LEN, decrypt, encrypt};
pub use drbg::DeterministicBitGenerator;
pub use entropy::{RandomSource, SecureEntropy, uniform_in_range};
pub use error::CryptoError;
pub use hash::{digest_to_integer, encode_integer, hmac_sha256, sha256};
pub use kdf::{DEFAULT_ITERATIONS, DERIVED_KEY_LEN, DerivedKey, derive_key};
pub use signature::{
    KeyPair, PrimeRange, PrivateKey, PublicKey, Signature, generate_keypair, sign, verify,
};
