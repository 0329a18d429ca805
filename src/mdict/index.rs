//! Loads the keyword and record indexes at open time.
//!
//! The keyword section is a summary, a compressed (and possibly encrypted)
//! index of key blocks, and the concatenated key blocks themselves. The
//! record section mirrors it with a summary, a flat index of block sizes,
//! and the concatenated record blocks. Only the two indexes are decoded
//! here; key and record blocks stay on the source until a lookup needs them.

use log::{debug, info, warn};

use super::error::{MdictError, Result};
use super::header::MdictHeader;
use super::record_table::RecordBlockTable;
use super::scanner::{BlockScanner, FormatVersion, ScanProfile};
use super::source::ByteSource;

/// One entry of the in-memory keyword index: everything known about a key
/// block without decoding it.
#[derive(Debug, Clone)]
pub struct KeyBlockIndexEntry {
    pub num_entries: u32,
    /// Lexically first and last keys of the block, as stored.
    pub first_word: String,
    pub last_word: String,
    pub comp_size: u32,
    pub decomp_size: u32,
    /// Byte offset of the block within the concatenated key-block area.
    pub offset: u32,
    /// Ordinal of this entry in the index.
    pub index: usize,
}

/// Everything the open step produces beyond the header.
#[derive(Debug)]
pub struct DictionaryIndex {
    pub key_index: Vec<KeyBlockIndexEntry>,
    pub num_entries: u32,
    /// Absolute file offset of the concatenated key blocks.
    pub key_blocks_start: u64,
    pub record_table: RecordBlockTable,
}

/// Decode both indexes. `start` is the file offset of the keyword section.
pub fn load(
    source: &dyn ByteSource,
    header: &MdictHeader,
    profile: ScanProfile,
    start: u64,
) -> Result<DictionaryIndex> {
    let summary_len: u64 = match profile.version {
        FormatVersion::V1 => 16,
        FormatVersion::V2 => 44,
    };
    let mut summary = BlockScanner::new(source.read(start, summary_len as usize)?, profile);

    let num_blocks = summary.read_num()?;
    let num_entries = summary.read_num()?;
    let key_index_decomp_len = match profile.version {
        FormatVersion::V1 => None,
        FormatVersion::V2 => Some(summary.read_num()?),
    };
    let key_index_comp_len = summary.read_num()?;
    let key_blocks_len = summary.read_num()?;
    if profile.version == FormatVersion::V2 {
        summary.skip_checksum()?;
    }

    debug!(
        "keyword summary: {} blocks, {} entries, index {} bytes, blocks {} bytes",
        num_blocks, num_entries, key_index_comp_len, key_blocks_len
    );

    let index_bytes = source.read(start + summary_len, key_index_comp_len as usize)?;
    let mut outer = BlockScanner::new(index_bytes, profile);
    let mut index = outer.read_block(
        key_index_comp_len as usize,
        key_index_decomp_len.unwrap_or(key_index_comp_len) as usize,
        header.encrypt_key_index,
    )?;

    let mut key_index = Vec::with_capacity(num_blocks as usize);
    let mut offset = 0u64;
    let mut counted = 0u64;
    for ordinal in 0..num_blocks as usize {
        let entries_in_block = index.read_num()?;
        let first_size = index.read_short()?;
        let first_word = index.read_sized_text(first_size)?;
        let last_size = index.read_short()?;
        let last_word = index.read_sized_text(last_size)?;
        let comp_size = index.read_num()?;
        let decomp_size = index.read_num()?;
        key_index.push(KeyBlockIndexEntry {
            num_entries: entries_in_block,
            first_word,
            last_word,
            comp_size,
            decomp_size,
            offset: to_u32(offset)?,
            index: ordinal,
        });
        offset += comp_size as u64;
        counted += entries_in_block as u64;
    }

    if counted != num_entries as u64 {
        return Err(MdictError::InvalidFormat(format!(
            "key index declares {} entries, blocks sum to {}",
            num_entries, counted
        )));
    }
    if offset != key_blocks_len as u64 {
        warn!(
            "key block sizes sum to {} bytes, summary declares {}",
            offset, key_blocks_len
        );
    }

    let key_blocks_start = start + summary_len + key_index_comp_len as u64;
    let record_section = key_blocks_start + key_blocks_len as u64;
    let record_table = load_record_index(source, profile, record_section, num_entries)?;

    info!(
        "index loaded: {} entries in {} key blocks, {} record blocks",
        num_entries,
        key_index.len(),
        record_table.num_blocks()
    );

    Ok(DictionaryIndex {
        key_index,
        num_entries,
        key_blocks_start,
        record_table,
    })
}

/// Decode the record summary and block index into a [`RecordBlockTable`].
fn load_record_index(
    source: &dyn ByteSource,
    profile: ScanProfile,
    start: u64,
    key_entries: u32,
) -> Result<RecordBlockTable> {
    let summary_len: u64 = match profile.version {
        FormatVersion::V1 => 16,
        FormatVersion::V2 => 32,
    };
    let mut summary = BlockScanner::new(source.read(start, summary_len as usize)?, profile);

    let num_blocks = summary.read_num()?;
    let num_entries = summary.read_num()?;
    let index_len = summary.read_num()?;
    let blocks_len = summary.read_num()?;

    debug!(
        "record summary: {} blocks, {} entries, index {} bytes, blocks {} bytes",
        num_blocks, num_entries, index_len, blocks_len
    );
    if num_entries != key_entries {
        warn!(
            "record summary declares {} entries, keyword summary {}",
            num_entries, key_entries
        );
    }

    let mut index = BlockScanner::new(
        source.read(start + summary_len, index_len as usize)?,
        profile,
    );

    let block_pos = start + summary_len + index_len as u64;
    let mut comp_pos = block_pos;
    let mut decomp_pos = 0u64;
    let mut table = RecordBlockTable::alloc(num_blocks as usize);
    for _ in 0..num_blocks {
        let comp_size = index.read_num()?;
        let decomp_size = index.read_num()?;
        table.put(to_u32(comp_pos)?, to_u32(decomp_pos)?);
        comp_pos += comp_size as u64;
        decomp_pos += decomp_size as u64;
    }
    table.put(to_u32(comp_pos)?, to_u32(decomp_pos)?);

    Ok(table)
}

fn to_u32(value: u64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| MdictError::Truncated(format!("offset {} exceeds 4 GiB", value)))
}
