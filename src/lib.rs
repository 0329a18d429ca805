//! Reader and lookup engine for the MDict binary dictionary formats.
//!
//! MDict ships two container flavors distinguished by extension: `.mdx`
//! maps keywords to text definitions, `.mdd` maps resource paths to raw
//! bytes (images, audio, CSS). Both share the same layout — a UTF-16LE XML
//! header, a two-level keyword index over compressed key blocks, and an
//! index of compressed record blocks.
//!
//! This crate parses that container from any random-access byte source and
//! answers two kinds of queries without loading the dictionary into memory:
//! keyword enumeration (prefix or `*`/`?` glob, paged across key blocks) and
//! record retrieval by offset, with stylesheet expansion and `@@@LINK=`
//! redirection applied to definitions.
//!
//! # Example
//! ```no_run
//! use mdict_lookup::{MatchQuery, MdictReader, Mdx};
//!
//! # fn main() -> mdict_lookup::Result<()> {
//! let mut dict = MdictReader::<Mdx>::open("example.mdx")?;
//! let page = dict.match_keys(&MatchQuery::new("app*").max(10))?;
//! for hit in &page.hits {
//!     println!("{}: {}", hit.word, dict.definition(hit.offset)?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Version 1.x and 2.x containers are supported. Dictionaries whose keyword
//! header is encrypted (`Encrypted` bit 1) need a license key and are
//! rejected; keyword-index encryption (bit 2) is handled transparently.

pub mod mdict;

pub use mdict::{
    BlockScanner, ByteSource, FileSource, FileType, FormatVersion, KeyBlockIndexEntry, MatchQuery,
    Mdd, MdictError, MdictHeader, MdictReader, Mdx, MemSource, RecordBlockDesc, RecordBlockTable,
    Result, ScanProfile, StylePair, StyleSheet, WordHit, WordPage,
};
