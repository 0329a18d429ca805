//! Core MDict reader module.

pub mod error;
pub mod source;

mod codec;
mod filetypes;
mod header;
mod index;
mod key_cache;
mod lookup;
mod reader;
mod record_table;
mod scanner;
mod stylesheet;

pub use error::{MdictError, Result};
pub use filetypes::{FileType, Mdd, Mdx};
pub use header::MdictHeader;
pub use index::KeyBlockIndexEntry;
pub use lookup::{MatchQuery, WordHit, WordPage};
pub use reader::MdictReader;
pub use record_table::{RecordBlockDesc, RecordBlockTable};
pub use scanner::{BlockScanner, FormatVersion, ScanProfile};
pub use source::{ByteSource, FileSource, MemSource};
pub use stylesheet::{StylePair, StyleSheet};
