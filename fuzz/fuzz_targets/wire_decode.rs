//! Fuzz target for WireMessage::decode
//!
//! Arbitrary bytes are decoded as a wire message, then converted to an offer
//! or a sealed message. Every invalid input must surface as an error.
//!
//! # Invariants
//!
//! - NEVER panic on malformed CBOR
//! - A message that decodes re-encodes and decodes to itself

#![no_main]

use keyward_core::{SealedMessage, WireMessage};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(message) = WireMessage::decode(data) else {
        return;
    };

    let encoded = message.encode().expect("decoded message must encode");
    let again = WireMessage::decode(&encoded).expect("re-encoded message must decode");
    assert_eq!(again, message);

    match &message {
        WireMessage::Offer { .. } => {
            let _ = message.to_offer().expect("offer converts");
        },
        WireMessage::Sealed { .. } => {
            let _ = SealedMessage::from_wire(message).expect("validated tag length");
        },
    }
});
