//! SHA-256 and HMAC-SHA256 helpers shared by every primitive

use hmac::{Hmac, Mac};
use num_bigint::BigUint;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Output length of SHA-256 and HMAC-SHA256 in bytes
pub const DIGEST_LEN: usize = 32;

/// SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; DIGEST_LEN] {
    Sha256::digest(data).into()
}

/// HMAC-SHA256 of `message` under `key`.
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; DIGEST_LEN] {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(message);
    mac.finalize().into_bytes().into()
}

/// Verify an HMAC-SHA256 tag in constant time.
///
/// Returns false for a tag of the wrong length.
pub fn verify_hmac_sha256(key: &[u8], message: &[u8], tag: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(message);
    mac.verify_slice(tag).is_ok()
}

/// SHA-256 of `message` read as a big-endian unsigned integer.
pub fn digest_to_integer(message: &[u8]) -> BigUint {
    BigUint::from_bytes_be(&sha256(message))
}

/// Canonical byte encoding of an integer that is hashed, signed or stretched:
/// its ASCII decimal text.
pub fn encode_integer(value: &BigUint) -> Vec<u8> {
    value.to_str_radix(10).into_bytes()
}
