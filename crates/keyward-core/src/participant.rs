//! Participant driver.
//!
//! A `Participant` owns one signing identity and one [`KeyExchange`], and
//! wires them to a [`Transport`]:
//!
//! ```text
//! send_offer ──> Transport ──> peer.poll_offer
//! poll_offer <── Transport <── peer.send_offer
//!        │
//!        ▼
//! establish_session ──> SecureSession
//! ```
//!
//! Secret material never leaves the participant. Only public offers and
//! sealed messages reach the transport.

use keyward_crypto::{KeyPair, PublicKey, RandomSource, derive_key, generate_keypair};

use crate::{
    config::PipelineConfig,
    error::ExchangeError,
    exchange::{DomainParameters, ExchangePhase, KeyExchange},
    session::SecureSession,
    transport::{ParticipantId, Transport},
    wire::WireMessage,
};

/// One side of an authenticated exchange.
pub struct Participant {
    id: ParticipantId,
    config: PipelineConfig,
    keypair: KeyPair,
    exchange: KeyExchange,
    /// Sender of the accepted offer
    peer: Option<ParticipantId>,
}

impl Participant {
    /// Create a participant and generate its signing key pair.
    ///
    /// # Errors
    ///
    /// - `Config` if `config` fails validation
    /// - `Crypto` if key generation exhausts its retries
    pub fn new<R: RandomSource + ?Sized>(
        id: ParticipantId,
        params: DomainParameters,
        config: PipelineConfig,
        rng: &mut R,
    ) -> Result<Self, ExchangeError> {
        config.validate()?;
        let keypair = generate_keypair(config.prime_range, rng)?;
        tracing::debug!(%id, n = %keypair.public.n, "generated signing key");

        Ok(Self { id, config, keypair, exchange: KeyExchange::new(params), peer: None })
    }

    /// Our id on the transport.
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    /// The key peers verify our offers with.
    pub fn verification_key(&self) -> &PublicKey {
        &self.keypair.public
    }

    /// Phase of the underlying exchange.
    pub fn phase(&self) -> ExchangePhase {
        self.exchange.phase()
    }

    /// The underlying exchange.
    pub fn exchange(&self) -> &KeyExchange {
        &self.exchange
    }

    /// Only accept offers signed under `key`.
    pub fn pin_peer_key(&mut self, key: PublicKey) {
        self.exchange.pin_peer_key(key);
    }

    /// Choose our exponent ahead of sending, so [`poll_offer`](Self::poll_offer)
    /// can accept a peer offer that arrives first.
    pub fn prepare<R>(&mut self, rng: &mut R) -> Result<(), ExchangeError>
    where
        R: RandomSource + ?Sized,
    {
        self.exchange.begin(rng).map(drop)
    }

    /// Sign our public value and send it to `peer`, choosing the exponent
    /// first unless [`prepare`](Self::prepare) already did.
    pub fn send_offer<T, R>(
        &mut self,
        transport: &mut T,
        peer: ParticipantId,
        rng: &mut R,
    ) -> Result<(), ExchangeError>
    where
        T: Transport + ?Sized,
        R: RandomSource + ?Sized,
    {
        if self.exchange.phase() == ExchangePhase::Init {
            self.exchange.begin(rng)?;
        }
        let offer = self.exchange.publish(&self.keypair)?;
        let payload = WireMessage::offer(self.id, &offer).encode()?;

        tracing::debug!(id = %self.id, %peer, public_value = %offer.public_value, "sending offer");
        transport.send(peer, payload)
    }

    /// Take one payload from `transport` and accept it as the peer's offer.
    ///
    /// Returns `Ok(false)` if nothing is waiting, or while no exponent has
    /// been chosen yet; a queued offer then stays on the transport until
    /// [`prepare`](Self::prepare) or [`send_offer`](Self::send_offer) runs.
    ///
    /// # Errors
    ///
    /// - `Codec` if the payload is not a well-formed offer
    /// - `AuthenticationFailure` if the offer does not verify; the exchange
    ///   is aborted
    pub fn poll_offer<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> Result<bool, ExchangeError> {
        if self.exchange.phase() == ExchangePhase::Init {
            return Ok(false);
        }
        let Some(payload) = transport.receive(self.id)? else {
            return Ok(false);
        };

        let message = WireMessage::decode(&payload)?;
        let sender = message.sender();
        if sender == self.id {
            return Err(ExchangeError::authentication("offer claims to come from ourselves"));
        }
        let offer = message.to_offer()?;

        self.exchange.accept_offer(&offer).inspect_err(|e| {
            tracing::warn!(id = %self.id, %sender, error = %e, "rejected offer");
        })?;
        self.peer = Some(sender);

        tracing::debug!(id = %self.id, %sender, "accepted offer");
        Ok(true)
    }

    /// Stretch the shared secret into a session key and open a session with
    /// `peer`.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if no secret has been derived
    /// - `AuthenticationFailure` if `peer` is not who the offer came from
    pub fn establish_session(&self, peer: ParticipantId) -> Result<SecureSession, ExchangeError> {
        let Some(secret) = self.exchange.shared_secret() else {
            return Err(ExchangeError::InvalidState {
                phase: self.exchange.phase(),
                operation: "establish_session",
            });
        };

        if self.peer != Some(peer) {
            return Err(ExchangeError::authentication(format!(
                "no verified offer from {peer}"
            )));
        }

        let key = derive_key(secret.value(), self.config.kdf_iterations)?;
        tracing::debug!(id = %self.id, %peer, "session established");
        Ok(SecureSession::new(self.id, peer, key))
    }
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("id", &self.id)
            .field("phase", &self.exchange.phase())
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}
