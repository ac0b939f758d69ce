//! CBOR encoding of the messages participants exchange.
//!
//! Integers travel as big-endian byte strings so the encoding does not
//! depend on their magnitude.

use keyward_crypto::{PublicKey, Signature, TAG_LEN};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::{error::ExchangeError, exchange::PublicOffer, transport::ParticipantId};

/// Largest payload [`WireMessage::decode`] accepts
pub const MAX_WIRE_LEN: usize = 64 * 1024;

/// A message on the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireMessage {
    /// Signed Diffie-Hellman public value with its verification key
    Offer {
        /// Originating participant
        sender: ParticipantId,
        /// `g^a mod p`, big-endian
        public_value: Vec<u8>,
        /// Signature over the decimal public value, big-endian
        signature: Vec<u8>,
        /// Verification exponent, big-endian
        e: Vec<u8>,
        /// Verification modulus, big-endian
        n: Vec<u8>,
    },

    /// Channel output from a [`SecureSession`](crate::session::SecureSession)
    Sealed {
        /// Originating participant
        sender: ParticipantId,
        /// Per-direction message counter
        sequence: u64,
        /// AES-256-CBC ciphertext
        ciphertext: Vec<u8>,
        /// HMAC-SHA256 over the ciphertext
        tag: Vec<u8>,
    },
}

impl WireMessage {
    /// Wrap a public offer.
    pub fn offer(sender: ParticipantId, offer: &PublicOffer) -> Self {
        Self::Offer {
            sender,
            public_value: offer.public_value.to_bytes_be(),
            signature: offer.signature.value().to_bytes_be(),
            e: offer.verification_key.e.to_bytes_be(),
            n: offer.verification_key.n.to_bytes_be(),
        }
    }

    /// The participant that sent this message.
    pub fn sender(&self) -> ParticipantId {
        match self {
            Self::Offer { sender, .. } | Self::Sealed { sender, .. } => *sender,
        }
    }

    /// Rebuild the public offer carried by an `Offer` message.
    ///
    /// # Errors
    ///
    /// - `Codec` if this is not an `Offer`
    pub fn to_offer(&self) -> Result<PublicOffer, ExchangeError> {
        let Self::Offer { public_value, signature, e, n, .. } = self else {
            return Err(ExchangeError::Codec("expected an offer message".to_string()));
        };

        Ok(PublicOffer {
            public_value: BigUint::from_bytes_be(public_value),
            signature: Signature(BigUint::from_bytes_be(signature)),
            verification_key: PublicKey {
                e: BigUint::from_bytes_be(e),
                n: BigUint::from_bytes_be(n),
            },
        })
    }

    /// Serialize to CBOR.
    pub fn encode(&self) -> Result<Vec<u8>, ExchangeError> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(self, &mut out)
            .map_err(|e| ExchangeError::Codec(format!("CBOR encode failed: {e}")))?;
        Ok(out)
    }

    /// Parse a CBOR payload.
    ///
    /// # Errors
    ///
    /// - `Codec` if the payload is oversized, malformed, or a `Sealed`
    ///   message carries a tag of the wrong length
    pub fn decode(bytes: &[u8]) -> Result<Self, ExchangeError> {
        if bytes.len() > MAX_WIRE_LEN {
            return Err(ExchangeError::Codec(format!(
                "payload of {} bytes exceeds {MAX_WIRE_LEN}",
                bytes.len()
            )));
        }

        let message: Self = ciborium::de::from_reader(bytes)
            .map_err(|e| ExchangeError::Codec(format!("CBOR decode failed: {e}")))?;

        if let Self::Sealed { tag, .. } = &message
            && tag.len() != TAG_LEN
        {
            return Err(ExchangeError::Codec(format!(
                "tag is {} bytes, expected {TAG_LEN}",
                tag.len()
            )));
        }

        Ok(message)
    }
}
