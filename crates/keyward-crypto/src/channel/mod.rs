//! Encrypt-then-MAC channel: AES-CBC with PKCS#7 padding, HMAC-SHA256 tag
//! over the ciphertext. The key length selects AES-128, AES-192 or AES-256;
//! sessions always use [`KEY_LEN`].
//!
//! Decryption verifies the tag first and never touches the cipher for a
//! message that fails verification.
//!
//! # Components
//!
//! - [`cbc`]: block chaining over the AES primitive
//! - [`padding`]: PKCS#7 pad and strip

pub mod cbc;
pub mod padding;

use aes::{Aes128, Aes192, Aes256, cipher::KeyInit};
use zeroize::Zeroize;

pub use cbc::BLOCK_SIZE;

use crate::{
    error::CryptoError,
    hash::{DIGEST_LEN, hmac_sha256, verify_hmac_sha256},
};

/// Initialization vector length (one AES block)
pub const IV_LEN: usize = BLOCK_SIZE;

/// Channel key length used by sessions (AES-256, shared with the MAC)
pub const KEY_LEN: usize = 32;

/// Key lengths [`encrypt`] and [`decrypt`] accept
pub const SUPPORTED_KEY_LENS: [usize; 3] = [16, 24, KEY_LEN];

/// HMAC-SHA256 tag length
pub const TAG_LEN: usize = DIGEST_LEN;

/// Ciphertext and its authentication tag. The two travel together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureMessage {
    /// Padded CBC ciphertext
    pub ciphertext: Vec<u8>,
    /// `HMAC(key, ciphertext)`
    pub tag: [u8; TAG_LEN],
}

impl SecureMessage {
    /// Hex-encode ciphertext and tag for the boundary.
    pub fn to_hex(&self) -> (String, String) {
        (hex::encode(&self.ciphertext), hex::encode(self.tag))
    }

    /// Parse hex-encoded ciphertext and tag.
    ///
    /// # Errors
    ///
    /// - `Validation` for invalid hex or a tag of the wrong length
    pub fn from_hex(ciphertext: &str, tag: &str) -> Result<Self, CryptoError> {
        let ciphertext = hex::decode(ciphertext)
            .map_err(|e| CryptoError::validation(format!("ciphertext hex: {e}")))?;
        let tag_bytes =
            hex::decode(tag).map_err(|e| CryptoError::validation(format!("tag hex: {e}")))?;

        let tag: [u8; TAG_LEN] = tag_bytes.try_into().map_err(|bytes: Vec<u8>| {
            CryptoError::validation(format!("tag is {} bytes, expected {TAG_LEN}", bytes.len()))
        })?;

        Ok(Self { ciphertext, tag })
    }
}

/// Pad, encrypt under `key` with `iv`, then tag the ciphertext.
///
/// # Errors
///
/// - `InvalidArgument` if `key` is not 16, 24 or 32 bytes
pub fn encrypt(
    plaintext: &[u8],
    key: &[u8],
    iv: &[u8; IV_LEN],
) -> Result<SecureMessage, CryptoError> {
    let cipher = BlockCipher::new(key)?;

    let mut ciphertext = padding::pad(plaintext);
    cipher.encrypt_in_place(iv, &mut ciphertext);
    let tag = hmac_sha256(key, &ciphertext);

    Ok(SecureMessage { ciphertext, tag })
}

/// Verify the tag, then decrypt and strip padding.
///
/// # Errors
///
/// - `InvalidArgument` if `key` is not 16, 24 or 32 bytes
/// - `Integrity` if the tag does not match; nothing is decrypted
/// - `Padding` if the authenticated ciphertext does not unpad cleanly
pub fn decrypt(
    message: &SecureMessage,
    key: &[u8],
    iv: &[u8; IV_LEN],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = BlockCipher::new(key)?;

    if !verify_hmac_sha256(key, &message.ciphertext, &message.tag) {
        tracing::warn!(len = message.ciphertext.len(), "rejected message with invalid tag");
        return Err(CryptoError::Integrity);
    }

    if message.ciphertext.is_empty() || message.ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::Padding);
    }

    let mut plaintext = message.ciphertext.clone();
    cipher.decrypt_in_place(iv, &mut plaintext);

    match padding::unpadded_len(&plaintext) {
        Ok(len) => {
            plaintext.truncate(len);
            Ok(plaintext)
        },
        Err(e) => {
            plaintext.zeroize();
            Err(e)
        },
    }
}

enum BlockCipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl BlockCipher {
    fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let cipher = match key.len() {
            16 => Aes128::new_from_slice(key).map(Self::Aes128),
            24 => Aes192::new_from_slice(key).map(Self::Aes192),
            32 => Aes256::new_from_slice(key).map(Self::Aes256),
            len => {
                return Err(CryptoError::invalid_argument(format!(
                    "channel key is {len} bytes, expected one of {SUPPORTED_KEY_LENS:?}"
                )));
            },
        };
        cipher.map_err(|_| CryptoError::invalid_argument("AES rejected the key length"))
    }

    fn encrypt_in_place(&self, iv: &[u8; IV_LEN], data: &mut [u8]) {
        match self {
            Self::Aes128(cipher) => cbc::encrypt_in_place(cipher, iv, data),
            Self::Aes192(cipher) => cbc::encrypt_in_place(cipher, iv, data),
            Self::Aes256(cipher) => cbc::encrypt_in_place(cipher, iv, data),
        }
    }

    fn decrypt_in_place(&self, iv: &[u8; IV_LEN], data: &mut [u8]) {
        match self {
            Self::Aes128(cipher) => cbc::decrypt_in_place(cipher, iv, data),
            Self::Aes192(cipher) => cbc::decrypt_in_place(cipher, iv, data),
            Self::Aes256(cipher) => cbc::decrypt_in_place(cipher, iv, data),
        }
    }
}
