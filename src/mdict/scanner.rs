//! Byte cursor over dictionary sections.
//!
//! A [`BlockScanner`] walks one immutable buffer — a raw slice of the file or
//! a decompressed block — with big-endian integer reads and text decoding
//! driven by a per-dictionary [`ScanProfile`]. [`BlockScanner::read_block`]
//! unwraps the MDict compressed-block framing and hands back a new scanner
//! over the payload.

use adler2::adler32_slice;
use byteorder::{BigEndian, ByteOrder};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE};
use log::trace;

use super::codec::compression::{self, CompressionType};
use super::codec::crypto;
use super::error::{MdictError, Result};

/// Container generation, derived from `GeneratedByEngineVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    V1,
    V2,
}

/// Fixed decoding parameters shared by every scanner over one dictionary.
#[derive(Debug, Clone, Copy)]
pub struct ScanProfile {
    pub version: FormatVersion,
    pub encoding: &'static Encoding,
}

impl ScanProfile {
    /// Width of one text unit in bytes: 2 for UTF-16, 1 otherwise.
    pub fn bytes_per_unit(&self) -> usize {
        if self.encoding == UTF_16LE || self.encoding == UTF_16BE {
            2
        } else {
            1
        }
    }

    /// Extra terminator bytes after sized text. v2 appends one NUL unit.
    pub fn text_tail(&self) -> usize {
        match self.version {
            FormatVersion::V1 => 0,
            FormatVersion::V2 => self.bytes_per_unit(),
        }
    }
}

/// Cursor over an immutable byte buffer.
pub struct BlockScanner {
    buf: Vec<u8>,
    pos: usize,
    profile: ScanProfile,
}

impl BlockScanner {
    pub fn new(buf: Vec<u8>, profile: ScanProfile) -> Self {
        Self {
            buf,
            pos: 0,
            profile,
        }
    }

    pub fn profile(&self) -> ScanProfile {
        self.profile
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.buf.len() {
            return Err(MdictError::Truncated(format!(
                "seek to {} past end of {} byte buffer",
                pos,
                self.buf.len()
            )));
        }
        self.pos = pos;
        Ok(())
    }

    pub fn advance(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Bounds-checked view of the next `n` bytes; advances past them.
    fn take(&mut self, n: usize) -> Result<&[u8]> {
        if self.remaining() < n {
            return Err(MdictError::Truncated(format!(
                "wanted {} bytes, {} remain",
                n,
                self.remaining()
            )));
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.buf[start..start + n])
    }

    fn decode(&self, bytes: &[u8]) -> String {
        let (text, _, _) = self.profile.encoding.decode(bytes);
        text.into_owned()
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16_be(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn read_u32_be(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    /// Text-size field: one byte on v1, two big-endian bytes on v2.
    pub fn read_short(&mut self) -> Result<usize> {
        match self.profile.version {
            FormatVersion::V1 => Ok(self.read_u8()? as usize),
            FormatVersion::V2 => Ok(self.read_u16_be()? as usize),
        }
    }

    /// Numeric field: 32 bits on v1; 64 bits on v2 of which only the low 32
    /// may be populated. A nonzero high word means the file exceeds the 4 GiB
    /// this reader addresses and is rejected rather than silently truncated.
    pub fn read_num(&mut self) -> Result<u32> {
        match self.profile.version {
            FormatVersion::V1 => self.read_u32_be(),
            FormatVersion::V2 => {
                let high = self.read_u32_be()?;
                if high != 0 {
                    return Err(MdictError::Truncated(format!(
                        "64-bit field has nonzero high word {:#010x}; file exceeds 4 GiB",
                        high
                    )));
                }
                self.read_u32_be()
            }
        }
    }

    /// Read `units` text units, decode them, and skip the v2 trailing NUL unit.
    pub fn read_sized_text(&mut self, units: usize) -> Result<String> {
        let bytes = units * self.profile.bytes_per_unit();
        let encoding = self.profile.encoding;
        let tail = self.profile.text_tail();
        let raw = self.take(bytes)?;
        let (text, _, _) = encoding.decode(raw);
        let text = text.into_owned();
        self.advance(tail)?;
        Ok(text)
    }

    /// Read text up to (and past) its NUL terminator. The terminator is one
    /// unit wide: two zero bytes for UTF-16, one otherwise.
    pub fn read_nul_text(&mut self) -> Result<String> {
        let width = self.profile.bytes_per_unit();
        let tail = &self.buf[self.pos..];
        let end = if width == 2 {
            tail.chunks_exact(2)
                .position(|chunk| chunk == [0, 0])
                .map(|chunk_index| chunk_index * 2)
        } else {
            tail.iter().position(|&byte| byte == 0)
        }
        .ok_or_else(|| MdictError::InvalidFormat("missing NUL terminator in text".to_string()))?;
        let text = self.decode(&tail[..end]);
        self.pos += end + width;
        Ok(text)
    }

    /// View of the next `n` raw bytes; advances past them.
    pub fn read_raw(&mut self, n: usize) -> Result<&[u8]> {
        self.take(n)
    }

    pub fn skip_checksum(&mut self) -> Result<()> {
        self.advance(4)
    }

    /// Unwrap one compressed block at the cursor and return a scanner over
    /// its payload. The outer cursor ends up `comp_size` bytes further on.
    ///
    /// Block framing is `[tag][00 00 00][checksum; 4][payload]`. The tag is
    /// peeked, not consumed: the v1 keyword index carries no framing at all,
    /// and what the peek sees there is the high byte of a big-endian count.
    /// Raw (`tag == 0`) payloads start 8 bytes in on v2 and at byte 0 on v1.
    ///
    /// For compressed payloads, `decrypt` applies the keyword-index stream
    /// transform keyed by the checksum bytes before decompression, and the
    /// checksum is verified against the decompressed payload afterwards.
    pub fn read_block(
        &mut self,
        comp_size: usize,
        decomp_size: usize,
        decrypt: bool,
    ) -> Result<BlockScanner> {
        let start = self.pos;
        if self.remaining() < comp_size {
            return Err(MdictError::Truncated(format!(
                "block of {} bytes exceeds the {} remaining",
                comp_size,
                self.remaining()
            )));
        }
        if comp_size == 0 {
            self.pos = start;
            return Ok(BlockScanner::new(Vec::new(), self.profile));
        }

        let tag = self.buf[start];
        let compression = CompressionType::try_from(tag)?;
        trace!(
            "unwrapping block: tag={}, comp={} bytes, decomp={} bytes",
            tag,
            comp_size,
            decomp_size
        );

        let payload = match compression {
            CompressionType::None => {
                let skip = match self.profile.version {
                    FormatVersion::V1 => 0,
                    FormatVersion::V2 => 8,
                };
                if comp_size < skip {
                    return Err(MdictError::Truncated(format!(
                        "raw block of {} bytes is shorter than its header",
                        comp_size
                    )));
                }
                self.buf[start + skip..start + comp_size].to_vec()
            }
            CompressionType::Lzo | CompressionType::Zlib => {
                if comp_size < 8 {
                    return Err(MdictError::Truncated(format!(
                        "compressed block of {} bytes is shorter than its header",
                        comp_size
                    )));
                }
                let mut checksum = [0u8; 4];
                checksum.copy_from_slice(&self.buf[start + 4..start + 8]);
                let mut payload = self.buf[start + 8..start + comp_size].to_vec();
                if decrypt {
                    let key = crypto::index_key(&checksum);
                    crypto::decrypt_index(&mut payload, &key);
                }
                let decompressed =
                    compression::decompress_payload(&payload, compression, decomp_size)?;
                let expected = BigEndian::read_u32(&checksum);
                let actual = adler32_slice(&decompressed);
                if actual != expected {
                    return Err(MdictError::ChecksumMismatch { expected, actual });
                }
                decompressed
            }
        };

        self.pos = start + comp_size;
        Ok(BlockScanner::new(payload, self.profile))
    }
}
