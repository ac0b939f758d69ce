//! Authenticated Diffie-Hellman exchange state machine.
//!
//! Pure state machine: no I/O. Public values leave as a [`PublicOffer`] and
//! peer values enter through [`KeyExchange::accept_peer_value`]. Moving the
//! offer between participants is the driver's job.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐ begin ┌────────────────┐ publish ┌────────────────┐
//! │ Init │──────>│ ExponentChosen │────────>│ ValuePublished │
//! └──────┘       └────────────────┘         └────────────────┘
//!                        │  accept_peer_value       │
//!                        └───────────┬──────────────┘
//!                                    ↓
//!                         ┌───────────────────┐  bad signature  ┌─────────┐
//!                         │ PeerValueReceived │────────────────>│ Aborted │
//!                         └───────────────────┘                 └─────────┘
//!                                    │ verified
//!                                    ↓
//!                       ┌───────────────────────┐         ┌───────────────┐
//!                       │ PeerSignatureVerified │────────>│ SecretDerived │
//!                       └───────────────────────┘         └───────────────┘
//! ```
//!
//! The shared secret is computed only after the peer's signature verifies.
//! A peer value accepted from `ExponentChosen` leaves our offer owed:
//! [`KeyExchange::publish`] still signs it from `SecretDerived` without
//! changing the phase.

use std::fmt;

use keyward_crypto::{
    KeyPair, PublicKey, RandomSource, Signature, encode_integer, sign, uniform_in_range, verify,
};
use num_bigint::BigUint;
use num_traits::One;

use crate::error::ExchangeError;

/// Prime modulus of the toy domain parameters
pub const TOY_PRIME: u32 = 3011;

/// Generator of the toy domain parameters
pub const TOY_GENERATOR: u32 = 2;

/// Public prime modulus `p` and generator `g`, agreed out of band.
///
/// Treated as trusted input: only their shape is checked, not primality or
/// the order of `g`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainParameters {
    p: BigUint,
    g: BigUint,
}

impl DomainParameters {
    /// Build parameters from `p` and `g`.
    ///
    /// # Errors
    ///
    /// - `Domain` if `p < 5` or `g` is not in `(1, p - 1)`
    pub fn new(p: BigUint, g: BigUint) -> Result<Self, ExchangeError> {
        if p < BigUint::from(5u32) {
            return Err(ExchangeError::domain(format!("modulus {p} is too small")));
        }
        if g <= BigUint::one() || g >= &p - 1u32 {
            return Err(ExchangeError::domain(format!("generator {g} not in (1, {p} - 1)")));
        }
        Ok(Self { p, g })
    }

    /// `p = 3011, g = 2`. Human-scale, not secure.
    pub fn toy() -> Self {
        Self { p: BigUint::from(TOY_PRIME), g: BigUint::from(TOY_GENERATOR) }
    }

    /// Prime modulus.
    pub fn p(&self) -> &BigUint {
        &self.p
    }

    /// Generator.
    pub fn g(&self) -> &BigUint {
        &self.g
    }

    /// Inclusive private exponent range `[2, p - 2]`.
    pub fn exponent_range(&self) -> (BigUint, BigUint) {
        (BigUint::from(2u32), &self.p - 2u32)
    }

    /// Reject values outside `(1, p)`; guards against identity and
    /// small-subgroup inputs.
    pub fn check_public_value(&self, value: &BigUint) -> Result<(), ExchangeError> {
        if *value <= BigUint::one() || *value >= self.p {
            return Err(ExchangeError::domain(format!(
                "public value {value} not in (1, {})",
                self.p
            )));
        }
        Ok(())
    }

    /// `g^exponent mod p`
    fn public_value_for(&self, exponent: &BigUint) -> BigUint {
        self.g.modpow(exponent, &self.p)
    }
}

/// A private Diffie-Hellman exponent. Never serialized; `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateExponent(BigUint);

impl PrivateExponent {
    /// The exponent value.
    pub fn value(&self) -> &BigUint {
        &self.0
    }
}

impl fmt::Debug for PrivateExponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateExponent(..)")
    }
}

/// The agreed Diffie-Hellman value. `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(BigUint);

impl SharedSecret {
    /// The secret as an integer.
    pub fn value(&self) -> &BigUint {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// What a participant publishes: its public value, a signature over the
/// value's decimal encoding, and the key that verifies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicOffer {
    /// `g^a mod p`
    pub public_value: BigUint,
    /// Signature over `decimal(public_value)`
    pub signature: Signature,
    /// Signer's verification key
    pub verification_key: PublicKey,
}

/// Exchange phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangePhase {
    /// Nothing chosen yet
    Init,
    /// Private exponent drawn, public value computed
    ExponentChosen,
    /// Signed public value handed out
    ValuePublished,
    /// Peer value in range, signature not yet checked
    PeerValueReceived,
    /// Peer signature verified
    PeerSignatureVerified,
    /// Shared secret available (terminal)
    SecretDerived,
    /// Verification failed; no secret will be derived (terminal)
    Aborted,
}

impl ExchangePhase {
    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::SecretDerived | Self::Aborted)
    }
}

/// Draw a private exponent uniformly from `[2, p - 2]` and compute the
/// matching public value.
pub fn begin_exchange<R: RandomSource + ?Sized>(
    params: &DomainParameters,
    rng: &mut R,
) -> Result<(BigUint, PrivateExponent), ExchangeError> {
    let (low, high) = params.exponent_range();
    let exponent = uniform_in_range(rng, &low, &high)?;
    let public_value = params.public_value_for(&exponent);
    Ok((public_value, PrivateExponent(exponent)))
}

/// One participant's side of the exchange. Owned by that participant alone.
pub struct KeyExchange {
    phase: ExchangePhase,
    params: DomainParameters,
    private_exponent: Option<PrivateExponent>,
    public_value: Option<BigUint>,
    /// Whether our signed value has been handed out
    published: bool,
    peer_public_value: Option<BigUint>,
    shared_secret: Option<SharedSecret>,
    /// If set, the only verification key accepted from the peer
    pinned_peer_key: Option<PublicKey>,
}

impl KeyExchange {
    /// Create an exchange in [`ExchangePhase::Init`].
    pub fn new(params: DomainParameters) -> Self {
        Self {
            phase: ExchangePhase::Init,
            params,
            private_exponent: None,
            public_value: None,
            published: false,
            peer_public_value: None,
            shared_secret: None,
            pinned_peer_key: None,
        }
    }

    /// Only accept peer offers signed under `key`.
    #[must_use]
    pub fn with_pinned_peer_key(mut self, key: PublicKey) -> Self {
        self.pin_peer_key(key);
        self
    }

    /// Only accept peer offers signed under `key`. Replaces any earlier pin.
    pub fn pin_peer_key(&mut self, key: PublicKey) {
        self.pinned_peer_key = Some(key);
    }

    /// Current phase.
    pub fn phase(&self) -> ExchangePhase {
        self.phase
    }

    /// Domain parameters of this exchange.
    pub fn params(&self) -> &DomainParameters {
        &self.params
    }

    /// Our public value, once chosen.
    pub fn public_value(&self) -> Option<&BigUint> {
        self.public_value.as_ref()
    }

    /// Whether our value still has to be published, including after a peer
    /// value was accepted early.
    pub fn offer_pending(&self) -> bool {
        !self.published
            && matches!(self.phase, ExchangePhase::ExponentChosen | ExchangePhase::SecretDerived)
    }

    /// The peer's public value, once received.
    pub fn peer_public_value(&self) -> Option<&BigUint> {
        self.peer_public_value.as_ref()
    }

    /// The shared secret. `None` unless in [`ExchangePhase::SecretDerived`].
    pub fn shared_secret(&self) -> Option<&SharedSecret> {
        self.shared_secret.as_ref()
    }

    /// Draw the private exponent and compute our public value.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if not in `Init`
    pub fn begin<R: RandomSource + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<BigUint, ExchangeError> {
        self.require(ExchangePhase::Init, "begin")?;
        let (public_value, exponent) = begin_exchange(&self.params, rng)?;
        Ok(self.install_exponent(public_value, exponent))
    }

    /// Use a fixed private exponent (test vectors, reproductions).
    ///
    /// # Errors
    ///
    /// - `InvalidState` if not in `Init`
    /// - `Domain` if `exponent` is outside `[2, p - 2]`
    pub fn begin_with_exponent(&mut self, exponent: BigUint) -> Result<BigUint, ExchangeError> {
        self.require(ExchangePhase::Init, "begin_with_exponent")?;

        let (low, high) = self.params.exponent_range();
        if exponent < low || exponent > high {
            return Err(ExchangeError::domain(format!(
                "private exponent not in [{low}, {high}]"
            )));
        }

        let public_value = self.params.public_value_for(&exponent);
        Ok(self.install_exponent(public_value, PrivateExponent(exponent)))
    }

    /// Sign our public value and produce the offer to send to the peer.
    ///
    /// Moves `ExponentChosen` to `ValuePublished`. After an early accept the
    /// exchange is already in `SecretDerived` and stays there.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless [`offer_pending`](Self::offer_pending)
    pub fn publish(&mut self, signer: &KeyPair) -> Result<PublicOffer, ExchangeError> {
        if !self.offer_pending() {
            return Err(ExchangeError::InvalidState { phase: self.phase, operation: "publish" });
        }
        let Some(public_value) = self.public_value.clone() else {
            unreachable!("public value is set once an exponent is chosen");
        };

        let signature = sign(&signer.private, &encode_integer(&public_value))?;
        self.published = true;
        if self.phase == ExchangePhase::ExponentChosen {
            self.transition(ExchangePhase::ValuePublished);
        }

        Ok(PublicOffer { public_value, signature, verification_key: signer.public.clone() })
    }

    /// Verify the peer's signed value and derive the shared secret.
    ///
    /// Accepted from `ExponentChosen` or `ValuePublished`, since the peer's
    /// value may arrive before ours goes out.
    ///
    /// # Errors
    ///
    /// - `InvalidState` outside those two phases
    /// - `Domain` if the value is outside `(1, p)`; the phase is unchanged
    /// - `AuthenticationFailure` if the signature does not verify or the key
    ///   differs from the pinned one; the exchange is aborted
    /// - `Crypto(Validation)` for a malformed key or signature; the exchange
    ///   is aborted
    pub fn accept_peer_value(
        &mut self,
        peer_value: &BigUint,
        peer_signature: &Signature,
        peer_key: &PublicKey,
    ) -> Result<&SharedSecret, ExchangeError> {
        if !matches!(self.phase, ExchangePhase::ExponentChosen | ExchangePhase::ValuePublished) {
            return Err(ExchangeError::InvalidState {
                phase: self.phase,
                operation: "accept_peer_value",
            });
        }

        self.params.check_public_value(peer_value).inspect_err(|e| {
            tracing::warn!(error = %e, "rejected out-of-range peer value");
        })?;

        self.peer_public_value = Some(peer_value.clone());
        self.transition(ExchangePhase::PeerValueReceived);

        let pin_mismatch = self.pinned_peer_key.as_ref().is_some_and(|pinned| pinned != peer_key);
        if pin_mismatch {
            return Err(self.abort_with("peer verification key does not match pinned key"));
        }

        match verify(peer_key, &encode_integer(peer_value), peer_signature) {
            Ok(true) => {},
            Ok(false) => {
                return Err(self.abort_with("signature over peer public value did not verify"));
            },
            Err(e) => {
                self.abort();
                return Err(e.into());
            },
        }
        self.transition(ExchangePhase::PeerSignatureVerified);

        let Some(exponent) = self.private_exponent.take() else {
            unreachable!("private exponent is set until the secret is derived");
        };
        let secret = SharedSecret(peer_value.modpow(exponent.value(), self.params.p()));
        drop(exponent);

        self.transition(ExchangePhase::SecretDerived);
        Ok(&*self.shared_secret.insert(secret))
    }

    /// [`accept_peer_value`](Self::accept_peer_value) for a whole offer.
    pub fn accept_offer(&mut self, offer: &PublicOffer) -> Result<&SharedSecret, ExchangeError> {
        self.accept_peer_value(&offer.public_value, &offer.signature, &offer.verification_key)
    }

    /// Abandon the exchange and discard all secret material.
    pub fn abort(&mut self) {
        self.private_exponent = None;
        self.shared_secret = None;
        self.transition(ExchangePhase::Aborted);
    }

    fn abort_with(&mut self, reason: &str) -> ExchangeError {
        tracing::warn!(reason, "aborting exchange");
        self.abort();
        ExchangeError::authentication(reason)
    }

    fn install_exponent(&mut self, public_value: BigUint, exponent: PrivateExponent) -> BigUint {
        self.private_exponent = Some(exponent);
        self.public_value = Some(public_value.clone());
        self.transition(ExchangePhase::ExponentChosen);
        public_value
    }

    fn require(&self, phase: ExchangePhase, operation: &'static str) -> Result<(), ExchangeError> {
        if self.phase != phase {
            return Err(ExchangeError::InvalidState { phase: self.phase, operation });
        }
        Ok(())
    }

    fn transition(&mut self, next: ExchangePhase) {
        tracing::debug!(from = ?self.phase, to = ?next, "exchange transition");
        self.phase = next;
    }
}

impl fmt::Debug for KeyExchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyExchange")
            .field("phase", &self.phase)
            .field("params", &self.params)
            .field("public_value", &self.public_value)
            .field("peer_public_value", &self.peer_public_value)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use keyward_crypto::{DeterministicBitGenerator, PrimeRange, generate_keypair};

    use super::*;

    fn keypair(seed: &[u8]) -> KeyPair {
        let mut rng = DeterministicBitGenerator::from_seed(seed);
        generate_keypair(PrimeRange::default(), &mut rng).unwrap()
    }

    fn fixed_exchange(exponent: u32) -> KeyExchange {
        let mut exchange = KeyExchange::new(DomainParameters::toy());
        exchange.begin_with_exponent(BigUint::from(exponent)).unwrap();
        exchange
    }

    #[test]
    fn toy_scenario_public_values() {
        let mut alice = KeyExchange::new(DomainParameters::toy());
        let mut bob = KeyExchange::new(DomainParameters::toy());

        assert_eq!(alice.begin_with_exponent(BigUint::from(5u32)).unwrap(), BigUint::from(32u32));
        assert_eq!(bob.begin_with_exponent(BigUint::from(7u32)).unwrap(), BigUint::from(128u32));
    }

    #[test]
    fn toy_scenario_shared_secret() {
        let alice_keys = keypair(b"alice");
        let bob_keys = keypair(b"bob");
        let mut alice = fixed_exchange(5);
        let mut bob = fixed_exchange(7);

        let alice_offer = alice.publish(&alice_keys).unwrap();
        let bob_offer = bob.publish(&bob_keys).unwrap();

        let alice_secret = alice.accept_offer(&bob_offer).unwrap().clone();
        let bob_secret = bob.accept_offer(&alice_offer).unwrap().clone();

        // 128^5 mod 3011 = 32^7 mod 3011 = 2^35 mod 3011 = 924
        assert_eq!(alice_secret, bob_secret);
        assert_eq!(alice_secret.value(), &BigUint::from(924u32));
        assert_eq!(alice.phase(), ExchangePhase::SecretDerived);
        assert_eq!(bob.phase(), ExchangePhase::SecretDerived);
    }

    #[test]
    fn random_exponents_agree() {
        let mut rng = DeterministicBitGenerator::from_seed(b"exponents");
        let keys_a = keypair(b"a");
        let keys_b = keypair(b"b");

        for _ in 0..20 {
            let mut a = KeyExchange::new(DomainParameters::toy());
            let mut b = KeyExchange::new(DomainParameters::toy());
            a.begin(&mut rng).unwrap();
            b.begin(&mut rng).unwrap();
            let offer_a = a.publish(&keys_a).unwrap();
            let offer_b = b.publish(&keys_b).unwrap();

            let secret_a = a.accept_offer(&offer_b).unwrap().clone();
            let secret_b = b.accept_offer(&offer_a).unwrap().clone();
            assert_eq!(secret_a, secret_b);
        }
    }

    #[test]
    fn begin_exchange_draws_in_range() {
        let params = DomainParameters::toy();
        let mut rng = DeterministicBitGenerator::from_seed(b"range");
        for _ in 0..200 {
            let (public_value, exponent) = begin_exchange(&params, &mut rng).unwrap();
            assert!(*exponent.value() >= BigUint::from(2u32));
            assert!(*exponent.value() <= BigUint::from(TOY_PRIME - 2));
            assert_eq!(public_value, params.g().modpow(exponent.value(), params.p()));
        }
    }

    #[test]
    fn peer_value_accepted_before_publishing() {
        let alice_keys = keypair(b"alice");
        let bob_keys = keypair(b"bob");
        let mut alice = fixed_exchange(5);
        let mut bob = fixed_exchange(7);
        let bob_offer = bob.publish(&bob_keys).unwrap();

        assert_eq!(alice.phase(), ExchangePhase::ExponentChosen);
        let alice_secret = alice.accept_offer(&bob_offer).unwrap().clone();
        assert_eq!(alice.phase(), ExchangePhase::SecretDerived);
        assert!(alice.offer_pending());

        // Alice still owes Bob her value
        let alice_offer = alice.publish(&alice_keys).unwrap();
        assert_eq!(alice_offer.public_value, BigUint::from(32u32));
        assert_eq!(alice.phase(), ExchangePhase::SecretDerived);
        assert!(!alice.offer_pending());

        let bob_secret = bob.accept_offer(&alice_offer).unwrap();
        assert_eq!(bob_secret, &alice_secret);
        assert_eq!(bob_secret.value(), &BigUint::from(924u32));
    }

    #[test]
    fn publish_only_once() {
        let keys = keypair(b"alice");
        let bob_keys = keypair(b"bob");
        let mut alice = fixed_exchange(5);
        alice.publish(&keys).unwrap();
        assert!(!alice.offer_pending());
        assert!(matches!(
            alice.publish(&keys),
            Err(ExchangeError::InvalidState { phase: ExchangePhase::ValuePublished, .. })
        ));

        // Accepting after publishing owes nothing more
        let mut bob = fixed_exchange(7);
        alice.accept_offer(&bob.publish(&bob_keys).unwrap()).unwrap();
        assert!(matches!(
            alice.publish(&keys),
            Err(ExchangeError::InvalidState { phase: ExchangePhase::SecretDerived, .. })
        ));
    }

    #[test]
    fn aborted_exchange_cannot_publish() {
        let keys = keypair(b"alice");
        let mut alice = fixed_exchange(5);
        alice.abort();
        assert!(!alice.offer_pending());
        assert!(matches!(
            alice.publish(&keys),
            Err(ExchangeError::InvalidState { phase: ExchangePhase::Aborted, .. })
        ));
    }

    #[test]
    fn forged_signature_aborts() {
        let bob_keys = keypair(b"bob");
        let mut alice = fixed_exchange(5);
        let mut bob = fixed_exchange(7);
        let mut offer = bob.publish(&bob_keys).unwrap();

        // Claim a different public value under Bob's original signature
        offer.public_value = BigUint::from(129u32);

        let result = alice.accept_offer(&offer);
        assert!(matches!(result, Err(ExchangeError::AuthenticationFailure { .. })));
        assert_eq!(alice.phase(), ExchangePhase::Aborted);
        assert!(alice.shared_secret().is_none());
    }

    #[test]
    fn signature_from_other_key_aborts() {
        let bob_keys = keypair(b"bob");
        let mallory_keys = keypair(b"mallory");
        let mut alice = fixed_exchange(5).with_pinned_peer_key(bob_keys.public.clone());
        let mut mallory = fixed_exchange(9);
        let offer = mallory.publish(&mallory_keys).unwrap();

        let result = alice.accept_offer(&offer);
        assert!(matches!(result, Err(ExchangeError::AuthenticationFailure { .. })));
        assert_eq!(alice.phase(), ExchangePhase::Aborted);
    }

    #[test]
    fn pinned_key_accepts_expected_peer() {
        let bob_keys = keypair(b"bob");
        let mut alice = fixed_exchange(5).with_pinned_peer_key(bob_keys.public.clone());
        let mut bob = fixed_exchange(7);
        let offer = bob.publish(&bob_keys).unwrap();

        assert!(alice.accept_offer(&offer).is_ok());
    }

    #[test]
    fn malformed_signature_aborts() {
        let bob_keys = keypair(b"bob");
        let mut alice = fixed_exchange(5);
        let signature = Signature(bob_keys.public.n.clone());

        let result = alice.accept_peer_value(&BigUint::from(128u32), &signature, &bob_keys.public);
        assert!(matches!(result, Err(ExchangeError::Crypto(_))));
        assert_eq!(alice.phase(), ExchangePhase::Aborted);
    }

    #[test]
    fn out_of_range_peer_values_rejected() {
        let bob_keys = keypair(b"bob");
        let mut alice = fixed_exchange(5);
        let signature = Signature(BigUint::from(1u32));

        for value in [0u32, 1, TOY_PRIME, TOY_PRIME + 1] {
            let result =
                alice.accept_peer_value(&BigUint::from(value), &signature, &bob_keys.public);
            assert!(matches!(result, Err(ExchangeError::Domain { .. })), "value {value}");
        }
        assert_eq!(alice.phase(), ExchangePhase::ExponentChosen);
    }

    #[test]
    fn phase_guards() {
        let keys = keypair(b"alice");
        let mut exchange = KeyExchange::new(DomainParameters::toy());

        assert!(matches!(exchange.publish(&keys), Err(ExchangeError::InvalidState { .. })));

        exchange.begin_with_exponent(BigUint::from(5u32)).unwrap();
        assert!(matches!(
            exchange.begin_with_exponent(BigUint::from(6u32)),
            Err(ExchangeError::InvalidState { .. })
        ));

        exchange.abort();
        assert!(exchange.phase().is_terminal());
        let offer = PublicOffer {
            public_value: BigUint::from(128u32),
            signature: Signature(BigUint::from(1u32)),
            verification_key: keys.public.clone(),
        };
        assert!(matches!(exchange.accept_offer(&offer), Err(ExchangeError::InvalidState { .. })));
    }

    #[test]
    fn exponent_outside_range_rejected() {
        let mut exchange = KeyExchange::new(DomainParameters::toy());
        assert!(exchange.begin_with_exponent(BigUint::from(1u32)).is_err());
        assert!(exchange.begin_with_exponent(BigUint::from(TOY_PRIME - 1)).is_err());
        assert_eq!(exchange.phase(), ExchangePhase::Init);
    }

    #[test]
    fn domain_parameter_validation() {
        assert!(DomainParameters::new(BigUint::from(3011u32), BigUint::from(2u32)).is_ok());
        assert!(DomainParameters::new(BigUint::from(3u32), BigUint::from(2u32)).is_err());
        assert!(DomainParameters::new(BigUint::from(3011u32), BigUint::from(1u32)).is_err());
        assert!(DomainParameters::new(BigUint::from(3011u32), BigUint::from(3010u32)).is_err());
    }

    #[test]
    fn debug_hides_secrets() {
        let alice = fixed_exchange(5);
        let rendered = format!("{alice:?}");
        assert!(rendered.contains("ExponentChosen"));
        assert!(!rendered.contains("private_exponent"));
        assert_eq!(format!("{:?}", SharedSecret(BigUint::from(924u32))), "SharedSecret(..)");
    }
}
