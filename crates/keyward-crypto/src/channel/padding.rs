//! PKCS#7 block padding

use super::cbc::BLOCK_SIZE;
use crate::error::CryptoError;

/// Append `n` bytes of value `n`, `1 <= n <= BLOCK_SIZE`. Aligned input gains
/// a full block.
pub fn pad(data: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    let mut padded = Vec::with_capacity(data.len() + pad_len);
    padded.extend_from_slice(data);
    padded.resize(data.len() + pad_len, pad_len as u8);
    padded
}

/// Strip padding and return the unpadded length.
///
/// Every padding byte is inspected before deciding, and every malformation
/// maps to the same error.
pub fn unpadded_len(data: &[u8]) -> Result<usize, CryptoError> {
    if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::Padding);
    }

    let last_block = &data[data.len() - BLOCK_SIZE..];
    let pad_len = last_block[BLOCK_SIZE - 1];

    let mut bad = u8::from(pad_len == 0) | u8::from(pad_len as usize > BLOCK_SIZE);
    for (i, &byte) in last_block.iter().rev().enumerate() {
        let in_padding = u8::from(i < pad_len as usize);
        bad |= in_padding & u8::from(byte != pad_len);
    }

    if bad != 0 {
        return Err(CryptoError::Padding);
    }
    Ok(data.len() - pad_len as usize)
}
