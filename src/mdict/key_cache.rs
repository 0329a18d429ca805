//! Lazy key-block decoding with a single-slot cache.
//!
//! The lookup engine walks key blocks sequentially, so one decoded block is
//! enough: a miss simply replaces the slot. The slot is keyed by the block's
//! first word, matching how the keyword index identifies blocks.

use log::trace;

use super::error::Result;
use super::index::KeyBlockIndexEntry;
use super::scanner::{BlockScanner, ScanProfile};
use super::source::ByteSource;

/// One keyword with the position of its record in the decompressed record
/// stream. `size` is the forward difference to the next entry; the last
/// entry of a block leaves it unset until record lookup supplies the block
/// bound.
#[derive(Debug, Clone)]
pub struct KeyEntry {
    pub offset: u32,
    pub word: String,
    pub size: Option<u32>,
}

#[derive(Debug, Default)]
pub struct KeyBlockCache {
    pilot: Option<String>,
    list: Vec<KeyEntry>,
}

impl KeyBlockCache {
    /// Entries of the key block described by `kdx`, decoding it on a miss.
    pub fn load(
        &mut self,
        source: &dyn ByteSource,
        key_blocks_start: u64,
        profile: ScanProfile,
        kdx: &KeyBlockIndexEntry,
    ) -> Result<&[KeyEntry]> {
        if self.pilot.as_deref() == Some(kdx.first_word.as_str()) {
            return Ok(&self.list);
        }

        trace!(
            "decoding key block {} ({} entries, {} bytes compressed)",
            kdx.index,
            kdx.num_entries,
            kdx.comp_size
        );
        let raw = source.read(key_blocks_start + kdx.offset as u64, kdx.comp_size as usize)?;
        let mut outer = BlockScanner::new(raw, profile);
        let mut block = outer.read_block(kdx.comp_size as usize, kdx.decomp_size as usize, false)?;

        let mut list = Vec::with_capacity(kdx.num_entries as usize);
        for _ in 0..kdx.num_entries {
            let offset = block.read_num()?;
            let word = block.read_nul_text()?;
            list.push(KeyEntry {
                offset,
                word,
                size: None,
            });
        }
        for i in 0..list.len().saturating_sub(1) {
            list[i].size = Some(list[i + 1].offset - list[i].offset);
        }

        self.pilot = Some(kdx.first_word.clone());
        self.list = list;
        Ok(&self.list)
    }
}
