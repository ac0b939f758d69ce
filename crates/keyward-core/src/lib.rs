//! Keyward Core
//!
//! Authenticated Diffie-Hellman key agreement and the secure session that
//! follows it.
//!
//! # Architecture
//!
//! ```text
//! Participant ──offer──> Transport ──offer──> Participant
//!     │                                           │
//! KeyExchange (verify peer signature)     KeyExchange
//!     │                                           │
//! derive_key(shared secret)               derive_key(shared secret)
//!     │                                           │
//! SecureSession <──────── sealed ────────> SecureSession
//! ```
//!
//! [`KeyExchange`] is a pure state machine. [`Participant`] owns one
//! exchange and one signing identity and drives them over a [`Transport`].
//! A shared secret is never computed from a peer value whose signature has
//! not verified.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod exchange;
pub mod participant;
pub mod session;
pub mod transport;
pub mod wire;

pub use config::PipelineConfig;
pub use error::ExchangeError;
pub use exchange::{
    DomainParameters, ExchangePhase, KeyExchange, PrivateExponent, PublicOffer, SharedSecret,
    begin_exchange,
};
pub use participant::Participant;
pub use session::{SealedMessage, SecureSession};
pub use transport::{ParticipantId, Transport};
pub use wire::WireMessage;
