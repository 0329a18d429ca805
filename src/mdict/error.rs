//! Custom error types for the mdict-lookup crate.

use thiserror::Error;

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum MdictError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    /// The header XML could not be parsed, has no usable root element, or
    /// carries an attribute value this reader cannot interpret.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// The `GeneratedByEngineVersion` attribute cannot be interpreted.
    #[error("Unsupported MDict version: {0}. Only v1.x and v2.x are supported.")]
    UnsupportedVersion(String),

    /// The keyword header is encrypted (`Encrypted` bit 0x01). Decrypting it
    /// needs a per-dictionary license key this library does not handle.
    #[error("Dictionary keyword header is encrypted and requires a license key")]
    UnsupportedEncryption,

    /// A read returned fewer bytes than requested, or a 64-bit field carries
    /// a nonzero high word (the file would exceed 4 GiB).
    #[error("Truncated input: {0}")]
    Truncated(String),

    /// The compression type byte of a block is not 0, 1, or 2.
    #[error("Unknown compression tag: {0:#04x}")]
    BadCompressionTag(u8),

    /// An error occurred during decompression, often due to corrupted data.
    #[error("Decompression failed: {0}")]
    DecompressionFailure(String),

    /// A block checksum did not match its decompressed payload.
    #[error("Checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// A record offset is not covered by any record block.
    #[error("Record offset {0} is outside every record block")]
    OutOfRange(u32),

    /// A `.mdd` resource path has no matching entry.
    #[error("No resource matches {0:?}")]
    ResourceNotFound(String),

    /// An `@@@LINK=` redirection chain did not terminate.
    #[error("Redirection for {0:?} did not resolve")]
    LinkLoop(String),

    /// A paged enumeration was superseded by a newer query. Internal; callers
    /// never observe this through the public entry points.
    #[error("Stale continuation discarded")]
    Cancelled,

    /// The file is structurally inconsistent with the MDict format.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// A convenience `Result` type alias using the crate's `MdictError` type.
pub type Result<T> = std::result::Result<T, MdictError>;
