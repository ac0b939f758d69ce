//! Fuzz target for authenticated decryption
//!
//! # Strategy
//!
//! - Forged: arbitrary ciphertext and tag under a fixed key
//! - Mutated: a genuine message with one byte replaced
//!
//! # Invariants
//!
//! - NEVER panic
//! - A forged or mutated message is rejected with `Integrity`
//! - The genuine message always decrypts to its plaintext

#![no_main]

use arbitrary::Arbitrary;
use keyward_crypto::{CryptoError, SecureMessage, TAG_LEN, decrypt, encrypt};
use libfuzzer_sys::fuzz_target;

const KEY: [u8; 32] = [0x5a; 32];
const IV: [u8; 16] = [0x0f; 16];

#[derive(Debug, Arbitrary)]
enum Input {
    Forged { ciphertext: Vec<u8>, tag: [u8; TAG_LEN] },
    Mutated { plaintext: Vec<u8>, position: u16, value: u8 },
}

fuzz_target!(|input: Input| {
    match input {
        Input::Forged { ciphertext, tag } => {
            let message = SecureMessage { ciphertext, tag };
            assert!(decrypt(&message, &KEY, &IV).is_err());
        },
        Input::Mutated { plaintext, position, value } => {
            let genuine = encrypt(&plaintext, &KEY, &IV).expect("valid key");
            assert_eq!(decrypt(&genuine, &KEY, &IV).expect("genuine"), plaintext);

            let mut mutated = genuine.clone();
            let total = mutated.ciphertext.len() + TAG_LEN;
            let index = position as usize % total;
            if index < mutated.ciphertext.len() {
                mutated.ciphertext[index] = value;
            } else {
                mutated.tag[index - mutated.ciphertext.len()] = value;
            }

            if mutated != genuine {
                assert_eq!(decrypt(&mutated, &KEY, &IV), Err(CryptoError::Integrity));
            }
        },
    }
});
