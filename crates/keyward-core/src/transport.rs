//! Message delivery between participants.
//!
//! The exchange never talks to a network itself. A [`Participant`] hands
//! opaque payloads to a [`Transport`] and polls it for replies; in-memory,
//! simulated or real network transports all fit behind the same trait.
//!
//! [`Participant`]: crate::participant::Participant

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ExchangeError;

/// Identifies a participant on a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "participant-{}", self.0)
    }
}

/// Carries encoded payloads between participants.
///
/// Delivery is unauthenticated. Anything read from a transport must pass
/// signature or tag verification before it is trusted.
pub trait Transport {
    /// Queue `payload` for delivery to `to`.
    ///
    /// # Errors
    ///
    /// - `Transport` if the payload cannot be handed off
    fn send(&mut self, to: ParticipantId, payload: Vec<u8>) -> Result<(), ExchangeError>;

    /// Take the next payload addressed to `me`. `Ok(None)` means nothing is
    /// waiting yet.
    ///
    /// # Errors
    ///
    /// - `Transport` if the underlying channel failed
    fn receive(&mut self, me: ParticipantId) -> Result<Option<Vec<u8>>, ExchangeError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, to: ParticipantId, payload: Vec<u8>) -> Result<(), ExchangeError> {
        (**self).send(to, payload)
    }

    fn receive(&mut self, me: ParticipantId) -> Result<Option<Vec<u8>>, ExchangeError> {
        (**self).receive(me)
    }
}
