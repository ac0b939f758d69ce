//! Error types for Keyward cryptographic primitives

use thiserror::Error;

/// Errors from signature, generator, derivation and channel operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// A mathematical precondition could not be met (equal primes, no coprime
    /// exponent, out-of-range value)
    #[error("domain error: {reason}")]
    Domain {
        /// What precondition failed
        reason: String,
    },

    /// Key or signature material is malformed
    #[error("validation error: {reason}")]
    Validation {
        /// What was malformed
        reason: String,
    },

    /// A caller-supplied argument is out of its accepted range
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Which argument and why
        reason: String,
    },

    /// The bit generator was used before `initialize_seed`
    #[error("bit generator not initialized: call initialize_seed first")]
    NotInitialized,

    /// MAC verification failed; the ciphertext was not decrypted
    #[error("integrity check failed: tag does not match ciphertext")]
    Integrity,

    /// Decrypted padding was malformed
    #[error("decryption failed")]
    Padding,

    /// The OS entropy source could not be read
    #[error("entropy unavailable: {reason}")]
    EntropyUnavailable {
        /// Underlying OS error
        reason: String,
    },

    /// Rejection sampling did not land in range within the attempt bound
    #[error("uniform sampling exhausted after {attempts} attempts")]
    SamplingExhausted {
        /// Number of draws made
        attempts: u32,
    },
}

impl CryptoError {
    /// Shorthand for [`CryptoError::Domain`]
    pub fn domain(reason: impl Into<String>) -> Self {
        Self::Domain { reason: reason.into() }
    }

    /// Shorthand for [`CryptoError::Validation`]
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation { reason: reason.into() }
    }

    /// Shorthand for [`CryptoError::InvalidArgument`]
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument { reason: reason.into() }
    }

    /// Returns true if this error means the input must be discarded.
    ///
    /// Fatal errors indicate tampering or malformed peer material. Other
    /// errors stem from local misuse or a transient entropy failure and can
    /// be corrected by the caller.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Integrity | Self::Padding | Self::Validation { .. } => true,

            Self::Domain { .. }
            | Self::InvalidArgument { .. }
            | Self::NotInitialized
            | Self::EntropyUnavailable { .. }
            | Self::SamplingExhausted { .. } => false,
        }
    }
}
