//! Fuzz target for the key exchange state machine
//!
//! Applies arbitrary operation sequences to one exchange.
//!
//! # Invariants
//!
//! - NEVER panic
//! - A shared secret exists only in `SecretDerived`
//! - Terminal phases only move to `Aborted`, and only through `abort`
//! - A Domain error never changes the phase
//! - Our value is published at most once, even after an early accept

#![no_main]

use arbitrary::Arbitrary;
use keyward_core::{DomainParameters, ExchangeError, ExchangePhase, KeyExchange};
use keyward_crypto::{
    DeterministicBitGenerator, PrimeRange, PublicKey, Signature, generate_keypair,
};
use libfuzzer_sys::fuzz_target;
use num_bigint::BigUint;

#[derive(Debug, Arbitrary)]
enum Op {
    Begin,
    BeginWith(u16),
    Publish,
    Accept { value: u32, signature: u32, e: u32, n: u32 },
    AcceptHonest { exponent: u16 },
    Abort,
}

#[derive(Debug, Arbitrary)]
struct Input {
    seed: [u8; 8],
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let mut rng = DeterministicBitGenerator::from_seed(&input.seed);
    let Ok(own_keys) = generate_keypair(PrimeRange::default(), &mut rng) else {
        return;
    };
    let Ok(peer_keys) = generate_keypair(PrimeRange::default(), &mut rng) else {
        return;
    };

    let mut exchange = KeyExchange::new(DomainParameters::toy());
    let mut publications = 0u32;

    for op in input.ops.into_iter().take(32) {
        let before = exchange.phase();
        let result: Result<(), ExchangeError> = match op {
            Op::Begin => exchange.begin(&mut rng).map(drop),
            Op::BeginWith(exponent) => {
                exchange.begin_with_exponent(BigUint::from(exponent)).map(drop)
            },
            Op::Publish => exchange.publish(&own_keys).map(|_| publications += 1),
            Op::Accept { value, signature, e, n } => exchange
                .accept_peer_value(
                    &BigUint::from(value),
                    &Signature(BigUint::from(signature)),
                    &PublicKey { e: BigUint::from(e), n: BigUint::from(n) },
                )
                .map(drop),
            Op::AcceptHonest { exponent } => {
                let mut peer = KeyExchange::new(DomainParameters::toy());
                match peer
                    .begin_with_exponent(BigUint::from(exponent))
                    .and_then(|_| peer.publish(&peer_keys))
                {
                    Ok(offer) => exchange.accept_offer(&offer).map(drop),
                    Err(_) => Ok(()),
                }
            },
            Op::Abort => {
                exchange.abort();
                Ok(())
            },
        };

        let after = exchange.phase();
        if before.is_terminal() && !matches!(after, ExchangePhase::Aborted) {
            assert_eq!(before, after, "terminal phase changed");
        }
        if matches!(result, Err(ExchangeError::Domain { .. })) {
            assert_eq!(before, after, "domain error moved the phase");
        }
        assert!(publications <= 1, "value published twice");
        assert_eq!(
            exchange.shared_secret().is_some(),
            after == ExchangePhase::SecretDerived,
            "secret present outside SecretDerived"
        );
    }
});
