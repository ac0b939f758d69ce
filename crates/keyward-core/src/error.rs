//! Error types for the Keyward exchange and session layers.
//!
//! Each failure class of the pipeline is a distinct variant so callers can
//! tell an authentication rejection from a transport hiccup. Authentication
//! and integrity failures are never turned into default values.

use keyward_crypto::CryptoError;
use thiserror::Error;

use crate::exchange::ExchangePhase;

/// Errors from the exchange state machine, wire codec, transport and
/// session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// A value violates a mathematical precondition (peer value outside
    /// `(1, p)`, malformed domain parameters)
    #[error("domain error: {reason}")]
    Domain {
        /// What precondition failed
        reason: String,
    },

    /// The peer's signature over its public value did not verify, or the
    /// peer presented an unexpected verification key. The exchange is
    /// aborted and no secret is produced.
    #[error("authentication failure: {reason}")]
    AuthenticationFailure {
        /// Why the peer was rejected
        reason: String,
    },

    /// Operation not allowed in the current phase
    #[error("invalid state transition: cannot {operation} from {phase:?}")]
    InvalidState {
        /// Phase when the operation was attempted
        phase: ExchangePhase,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// A sealed message arrived out of order or was replayed
    #[error("sequence mismatch: expected {expected}, got {actual}")]
    SequenceMismatch {
        /// Next sequence number the receiver accepts
        expected: u64,
        /// Sequence number carried by the message
        actual: u64,
    },

    /// Failure in an underlying primitive
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Payload could not be encoded or decoded
    #[error("codec error: {0}")]
    Codec(String),

    /// Transport could not deliver or receive
    #[error("transport error: {0}")]
    Transport(String),

    /// Invalid pipeline configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl ExchangeError {
    /// Shorthand for [`ExchangeError::Domain`]
    pub fn domain(reason: impl Into<String>) -> Self {
        Self::Domain { reason: reason.into() }
    }

    /// Shorthand for [`ExchangeError::AuthenticationFailure`]
    pub fn authentication(reason: impl Into<String>) -> Self {
        Self::AuthenticationFailure { reason: reason.into() }
    }

    /// Returns true if the session or exchange must be discarded.
    ///
    /// Fatal errors indicate a forged, tampered or malformed peer input.
    /// Transport errors and out-of-range values can be retried with fresh
    /// input; local misuse is corrected by the caller.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::AuthenticationFailure { .. } | Self::SequenceMismatch { .. } => true,
            Self::Crypto(err) => err.is_fatal(),

            Self::Domain { .. }
            | Self::InvalidState { .. }
            | Self::Codec(_)
            | Self::Transport(_)
            | Self::Config(_) => false,
        }
    }

    /// Returns true if retrying the same step may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_failure_is_fatal() {
        assert!(ExchangeError::authentication("bad signature").is_fatal());
        assert!(ExchangeError::Crypto(CryptoError::Integrity).is_fatal());
        assert!(ExchangeError::SequenceMismatch { expected: 2, actual: 1 }.is_fatal());
    }

    #[test]
    fn local_errors_are_not_fatal() {
        assert!(!ExchangeError::domain("peer value out of range").is_fatal());
        assert!(
            !ExchangeError::InvalidState { phase: ExchangePhase::Init, operation: "publish" }
                .is_fatal()
        );
        assert!(!ExchangeError::Crypto(CryptoError::NotInitialized).is_fatal());
    }

    #[test]
    fn only_transport_is_transient() {
        assert!(ExchangeError::Transport("queue closed".to_string()).is_transient());
        assert!(!ExchangeError::Codec("truncated".to_string()).is_transient());
        assert!(!ExchangeError::authentication("x").is_transient());
    }

    #[test]
    fn crypto_errors_display_transparently() {
        let err = ExchangeError::from(CryptoError::Integrity);
        assert_eq!(err.to_string(), CryptoError::Integrity.to_string());
    }

    #[test]
    fn invalid_state_display() {
        let err = ExchangeError::InvalidState {
            phase: ExchangePhase::SecretDerived,
            operation: "begin",
        };
        assert_eq!(err.to_string(), "invalid state transition: cannot begin from SecretDerived");
    }
}
