//! Codec layer for decompression and keyword-index decryption.
//!
//! Pure data transformations with no knowledge of file layout:
//!
//! - [`compression`]: block payload unwrap (raw, LZO1x, zlib)
//! - [`crypto`]: the keyed stream transform over encrypted keyword indexes

pub mod compression;
pub mod crypto;
