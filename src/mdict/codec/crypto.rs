//! Keyword-index decryption for MDict files.

use ripemd::{Digest, Ripemd128};

/// Key material appended to the block checksum before hashing.
const KEY_SUFFIX: [u8; 4] = [0x95, 0x36, 0x00, 0x00];

/// Derive the 16-byte stream key for an encrypted keyword index.
///
/// The key is `RIPEMD-128(checksum ++ 95 36 00 00)` where `checksum` is the
/// 4-byte field of the block's own header.
pub fn index_key(checksum: &[u8; 4]) -> [u8; 16] {
    let mut hasher = Ripemd128::new();
    hasher.update(checksum);
    hasher.update(KEY_SUFFIX);
    hasher.finalize().into()
}

/// In-place keyed stream transform over an encrypted keyword index payload.
///
/// Each byte has its nibbles swapped, then is XORed with the previous
/// ciphertext byte, its own index, and the rolling key byte. The chain seeds
/// with 0x36.
pub fn decrypt_index(data: &mut [u8], key: &[u8; 16]) {
    let mut prev = 0x36u8;
    for (i, byte) in data.iter_mut().enumerate() {
        let current = *byte;
        let rotated = current.rotate_left(4);
        *byte = rotated ^ prev ^ (i as u8) ^ key[i % key.len()];
        prev = current;
    }
}
