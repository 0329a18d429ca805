//! The main reader for MDict dictionary files.

use std::marker::PhantomData;
use std::path::Path;

use log::info;

use super::error::{MdictError, Result};
use super::filetypes::FileType;
use super::header::{self, MdictHeader};
use super::index::{self, KeyBlockIndexEntry};
use super::key_cache::{KeyBlockCache, KeyEntry};
use super::lookup::Trail;
use super::record_table::{RecordBlockDesc, RecordBlockTable};
use super::scanner::{BlockScanner, ScanProfile};
use super::source::{ByteSource, FileSource};

/// Reader over one MDict file.
///
/// The type parameter selects the container flavor: [`Mdx`](super::Mdx) for
/// keyword-to-text dictionaries, [`Mdd`](super::Mdd) for keyword-to-bytes
/// resource archives.
///
/// The header and both indexes are decoded once at open; key and record
/// blocks are read and decompressed on demand, one of each held at a time.
/// Query methods take `&mut self` because the enumeration cursor and the key
/// block cache evolve serially in call order; for concurrent queries over the
/// same file, open independent readers.
pub struct MdictReader<T: FileType> {
    source: Box<dyn ByteSource>,
    header: MdictHeader,
    profile: ScanProfile,
    key_index: Vec<KeyBlockIndexEntry>,
    num_entries: u32,
    key_blocks_start: u64,
    record_table: RecordBlockTable,
    cache: KeyBlockCache,
    pub(super) trail: Option<Trail>,
    pub(super) ticket: u64,
    _file_type: PhantomData<T>,
}

impl<T: FileType> MdictReader<T> {
    /// Open a dictionary from a file path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("opening {} file: {}", T::DEBUG_NAME, path.display());
        Self::from_source(Box::new(FileSource::open(path)?))
    }

    /// Open a dictionary over an arbitrary byte source.
    pub fn from_source(source: Box<dyn ByteSource>) -> Result<Self> {
        let (header, header_len) = header::parse(source.as_ref())?;

        let encoding = T::ENCODING_OVERRIDE.unwrap_or(header.encoding);
        let profile = ScanProfile {
            version: header.version,
            encoding,
        };

        let index = index::load(source.as_ref(), &header, profile, header_len)?;

        info!(
            "{} ready: {} entries, {} key blocks, {} record blocks",
            T::DEBUG_NAME,
            index.num_entries,
            index.key_index.len(),
            index.record_table.num_blocks()
        );

        Ok(Self {
            source,
            header,
            profile,
            key_index: index.key_index,
            num_entries: index.num_entries,
            key_blocks_start: index.key_blocks_start,
            record_table: index.record_table,
            cache: KeyBlockCache::default(),
            trail: None,
            ticket: 0,
            _file_type: PhantomData,
        })
    }

    pub fn header(&self) -> &MdictHeader {
        &self.header
    }

    /// Total number of keyword entries.
    pub fn num_entries(&self) -> u32 {
        self.num_entries
    }

    /// The in-memory index of key blocks.
    pub fn key_index(&self) -> &[KeyBlockIndexEntry] {
        &self.key_index
    }

    pub fn record_table(&self) -> &RecordBlockTable {
        &self.record_table
    }

    /// Decoded entries of key block `block_no`, through the single-slot cache.
    pub(super) fn key_block_entries(&mut self, block_no: usize) -> Result<&[KeyEntry]> {
        let kdx = self.key_index.get(block_no).ok_or_else(|| {
            MdictError::InvalidFormat(format!("key block {} out of range", block_no))
        })?;
        self.cache
            .load(self.source.as_ref(), self.key_blocks_start, self.profile, kdx)
    }

    /// Decompressed scanner over the record block described by `desc`.
    pub(super) fn read_record_block(&self, desc: &RecordBlockDesc) -> Result<BlockScanner> {
        let raw = self
            .source
            .read(desc.comp_offset as u64, desc.comp_size as usize)?;
        let mut outer = BlockScanner::new(raw, self.profile);
        outer.read_block(desc.comp_size as usize, desc.decomp_size as usize, false)
    }
}
