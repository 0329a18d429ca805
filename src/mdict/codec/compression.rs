//! Decompression operations for MDict blocks.

use std::io::Read;

use flate2::read::ZlibDecoder;
use lzokay::decompress::decompress as lzokay_decompress;

use super::super::error::{MdictError, Result};

/// Ceiling on a single block's decompressed size.
///
/// This is the scratch-buffer bound the LZO1x stream format carries; blocks
/// produced by the MDict builder never exceed it, so it doubles as the
/// resident-memory cap for all compressed blocks.
pub const MAX_BLOCK_DECOMP_SIZE: usize = 1_308_672;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    None,
    Lzo,
    Zlib,
}

impl TryFrom<u8> for CompressionType {
    type Error = MdictError;
    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Lzo),
            2 => Ok(Self::Zlib),
            _ => Err(MdictError::BadCompressionTag(value)),
        }
    }
}

/// Decompress a block payload and validate the result length.
///
/// LZO does not self-describe its output size, so `expected_size` drives the
/// output buffer; zlib self-describes and `expected_size` is verified after.
pub fn decompress_payload(
    payload: &[u8],
    compression: CompressionType,
    expected_size: usize,
) -> Result<Vec<u8>> {
    if compression != CompressionType::None && expected_size > MAX_BLOCK_DECOMP_SIZE {
        return Err(MdictError::DecompressionFailure(format!(
            "declared block size {} exceeds the {} byte ceiling",
            expected_size, MAX_BLOCK_DECOMP_SIZE
        )));
    }

    let decompressed = match compression {
        CompressionType::None => payload.to_vec(),
        CompressionType::Lzo => {
            let mut output = vec![0u8; expected_size];
            lzokay_decompress(payload, &mut output).map_err(|e| {
                MdictError::DecompressionFailure(format!("LZO decompression failed: {:?}", e))
            })?;
            output
        }
        CompressionType::Zlib => {
            let mut output = Vec::with_capacity(expected_size);
            let mut decoder = ZlibDecoder::new(payload);
            decoder.read_to_end(&mut output).map_err(|e| {
                MdictError::DecompressionFailure(format!("zlib decompression failed: {}", e))
            })?;
            output
        }
    };

    if decompressed.len() != expected_size {
        return Err(MdictError::DecompressionFailure(format!(
            "expected {} bytes, got {}",
            expected_size,
            decompressed.len()
        )));
    }

    Ok(decompressed)
}
