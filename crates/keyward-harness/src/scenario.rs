//! Two-party exchange scenarios.
//!
//! A [`Scenario`] runs the whole handshake between two participants over a
//! [`MemoryTransport`], optionally rewriting one offer in flight, and hands
//! back everything a test needs to inspect the result.

use keyward_core::{
    DomainParameters, ExchangeError, Participant, ParticipantId, PipelineConfig, SecureSession,
    Transport, WireMessage,
};
use keyward_crypto::DeterministicBitGenerator;

use crate::memory_transport::MemoryTransport;

/// First participant
pub const ALICE: ParticipantId = ParticipantId(1);

/// Second participant
pub const BOB: ParticipantId = ParticipantId(2);

type OfferTamper = Box<dyn FnMut(&mut WireMessage)>;

/// Builder for a two-party handshake.
pub struct Scenario {
    seed: u64,
    params: DomainParameters,
    config: PipelineConfig,
    pin_keys: bool,
    tamper: Option<(ParticipantId, OfferTamper)>,
}

/// State after both participants have polled for an offer.
pub struct Outcome {
    /// First participant
    pub alice: Participant,
    /// Second participant
    pub bob: Participant,
    /// Network, with anything still undelivered
    pub transport: MemoryTransport,
    /// Bit generator the handshake drew from, seeded from the scenario seed
    pub rng: DeterministicBitGenerator,
    /// Result of Alice polling for Bob's offer
    pub alice_poll: Result<bool, ExchangeError>,
    /// Result of Bob polling for Alice's offer
    pub bob_poll: Result<bool, ExchangeError>,
}

impl Scenario {
    /// Toy parameters and a fast key derivation. Randomness comes from the
    /// configured bit generator seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            params: DomainParameters::toy(),
            config: PipelineConfig { kdf_iterations: 100, ..PipelineConfig::default() },
            pin_keys: false,
            tamper: None,
        }
    }

    /// Override the pipeline configuration.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the domain parameters.
    #[must_use]
    pub fn with_params(mut self, params: DomainParameters) -> Self {
        self.params = params;
        self
    }

    /// Have each participant pin the other's verification key before the
    /// exchange.
    #[must_use]
    pub fn with_pinned_keys(mut self) -> Self {
        self.pin_keys = true;
        self
    }

    /// Rewrite the offer addressed to `target` before it is delivered.
    #[must_use]
    pub fn tamper_offer_to(
        mut self,
        target: ParticipantId,
        tamper: impl FnMut(&mut WireMessage) + 'static,
    ) -> Self {
        self.tamper = Some((target, Box::new(tamper)));
        self
    }

    /// Generate both identities, exchange offers and poll once each.
    ///
    /// # Errors
    ///
    /// Setup failures only (configuration, key generation, sending). Offer
    /// rejections are reported in [`Outcome`].
    pub fn run(self) -> Result<Outcome, ExchangeError> {
        tracing::info!(seed = self.seed, pinned = self.pin_keys, "running scenario");

        let mut rng = self.config.bit_generator(&self.seed.to_be_bytes())?;
        let mut transport = MemoryTransport::new();

        let mut alice =
            Participant::new(ALICE, self.params.clone(), self.config.clone(), &mut rng)?;
        let mut bob = Participant::new(BOB, self.params, self.config, &mut rng)?;

        if self.pin_keys {
            alice.pin_peer_key(bob.verification_key().clone());
            bob.pin_peer_key(alice.verification_key().clone());
        }

        alice.send_offer(&mut transport, BOB, &mut rng)?;
        bob.send_offer(&mut transport, ALICE, &mut rng)?;

        if let Some((target, mut tamper)) = self.tamper
            && let Some(payload) = transport.intercept(target)
        {
            let mut message = WireMessage::decode(&payload)?;
            tamper(&mut message);
            transport.inject(target, message.encode()?);
        }

        let alice_poll = alice.poll_offer(&mut transport);
        let bob_poll = bob.poll_offer(&mut transport);

        Ok(Outcome { alice, bob, transport, rng, alice_poll, bob_poll })
    }
}

impl Outcome {
    /// Whether both sides accepted the other's offer.
    pub fn both_accepted(&self) -> bool {
        matches!(self.alice_poll, Ok(true)) && matches!(self.bob_poll, Ok(true))
    }

    /// Open a session on each side.
    pub fn sessions(&self) -> Result<(SecureSession, SecureSession), ExchangeError> {
        Ok((self.alice.establish_session(BOB)?, self.bob.establish_session(ALICE)?))
    }
}

/// Send `plaintext` from `from` and open it on `to`, through `transport`.
pub fn relay<T: Transport + ?Sized>(
    transport: &mut T,
    from: &mut SecureSession,
    to: &mut SecureSession,
    plaintext: &[u8],
) -> Result<Option<Vec<u8>>, ExchangeError> {
    from.send(transport, plaintext)?;
    to.receive(transport)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn honest_run_succeeds() {
        let outcome = Scenario::new(1).run().unwrap();
        assert!(outcome.both_accepted());
        let (alice, bob) = outcome.sessions().unwrap();
        assert_eq!(alice.key(), bob.key());
    }

    #[test]
    fn same_seed_same_keys() {
        let first = Scenario::new(42).run().unwrap().sessions().unwrap();
        let second = Scenario::new(42).run().unwrap().sessions().unwrap();
        assert_eq!(first.0.key(), second.0.key());
    }

    #[test]
    fn draws_at_configured_output_size() {
        let config = PipelineConfig {
            prng_output_size: 4,
            kdf_iterations: 100,
            ..PipelineConfig::default()
        };
        let outcome = Scenario::new(8).with_config(config.clone()).run().unwrap();
        assert_eq!(outcome.rng.output_size(), 4);
        assert!(outcome.both_accepted());

        let again = Scenario::new(8).with_config(config).run().unwrap();
        assert_eq!(outcome.alice.verification_key(), again.alice.verification_key());
        assert_eq!(
            outcome.alice.exchange().public_value(),
            again.alice.exchange().public_value()
        );
    }

    #[test]
    fn invalid_config_fails_setup() {
        let config = PipelineConfig { prng_output_size: 0, ..PipelineConfig::default() };
        assert!(matches!(
            Scenario::new(1).with_config(config).run(),
            Err(ExchangeError::Config(_))
        ));
    }
}
