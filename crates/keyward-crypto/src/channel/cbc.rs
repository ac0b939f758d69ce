//! Cipher block chaining over an AES block primitive

use aes::cipher::{
    BlockDecrypt, BlockEncrypt, BlockSizeUser, consts::U16, generic_array::GenericArray,
};

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Encrypt `data` in place. `data.len()` must be a multiple of
/// [`BLOCK_SIZE`]; a trailing partial block is left untouched.
///
/// `C[0] = E(P[0] ^ IV)`, `C[i] = E(P[i] ^ C[i-1])`
pub fn encrypt_in_place<C>(cipher: &C, iv: &[u8; BLOCK_SIZE], data: &mut [u8])
where
    C: BlockEncrypt + BlockSizeUser<BlockSize = U16>,
{
    debug_assert_eq!(data.len() % BLOCK_SIZE, 0);

    let mut chain = *iv;
    for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
        for (byte, prev) in chunk.iter_mut().zip(chain.iter()) {
            *byte ^= prev;
        }
        cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
        chain.copy_from_slice(chunk);
    }
}

/// Decrypt `data` in place. Same length contract as [`encrypt_in_place`].
///
/// `P[i] = D(C[i]) ^ C[i-1]`, with `C[-1] = IV`
pub fn decrypt_in_place<C>(cipher: &C, iv: &[u8; BLOCK_SIZE], data: &mut [u8])
where
    C: BlockDecrypt + BlockSizeUser<BlockSize = U16>,
{
    debug_assert_eq!(data.len() % BLOCK_SIZE, 0);

    let mut chain = *iv;
    for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
        let mut saved = [0u8; BLOCK_SIZE];
        saved.copy_from_slice(chunk);

        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
        for (byte, prev) in chunk.iter_mut().zip(chain.iter()) {
            *byte ^= prev;
        }
        chain = saved;
    }
}
