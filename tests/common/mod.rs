//! Synthetic MDict images for the integration tests.
//!
//! Builds byte-exact v1/v2 `.mdx`/`.mdd` files in memory: UTF-16LE XML
//! header, zlib-compressed key and record blocks with Adler-32 checksums,
//! and (optionally) an encrypted keyword index. No binary fixtures on disk.

// Each test binary uses a different subset of the builder.
#![allow(dead_code)]

use std::io::Write;

use adler2::adler32_slice;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use ripemd::{Digest, Ripemd128};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V1,
    V2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enc {
    Utf8,
    Utf16,
    Gbk,
}

impl Enc {
    pub fn label(self) -> &'static str {
        match self {
            Enc::Utf8 => "UTF-8",
            Enc::Utf16 => "UTF-16",
            Enc::Gbk => "GBK",
        }
    }

    pub fn unit_width(self) -> usize {
        match self {
            Enc::Utf16 => 2,
            _ => 1,
        }
    }

    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Enc::Utf8 => text.as_bytes().to_vec(),
            Enc::Utf16 => text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect(),
            Enc::Gbk => {
                let (bytes, _, had_errors) = encoding_rs::GB18030.encode(text);
                assert!(!had_errors, "GBK-unencodable fixture text: {:?}", text);
                bytes.into_owned()
            }
        }
    }

    fn units(self, text: &str) -> usize {
        match self {
            Enc::Utf16 => text.encode_utf16().count(),
            _ => self.encode(text).len(),
        }
    }
}

/// A definition record: encoded text plus its NUL terminator.
pub fn text_record(text: &str, enc: Enc) -> Vec<u8> {
    let mut bytes = enc.encode(text);
    bytes.extend(std::iter::repeat(0u8).take(enc.unit_width()));
    bytes
}

pub struct FixtureBuilder {
    version: Version,
    encoding: Enc,
    root: &'static str,
    declare_encoding: bool,
    encrypt_index: bool,
    attrs: Vec<(String, String)>,
    entries: Vec<(String, Vec<u8>)>,
    keys_per_block: usize,
    records_per_block: usize,
}

/// A finished image plus the layout facts tests assert against.
pub struct Fixture {
    pub bytes: Vec<u8>,
    /// Record offset of each entry, in entry order.
    pub offsets: Vec<u32>,
    /// Absolute offset of the keyword summary.
    pub summary_pos: usize,
    /// Absolute offset of the keyword index block.
    pub key_index_pos: usize,
}

impl FixtureBuilder {
    pub fn new(version: Version, encoding: Enc) -> Self {
        Self {
            version,
            encoding,
            root: "Dictionary",
            declare_encoding: true,
            encrypt_index: false,
            attrs: Vec::new(),
            entries: Vec::new(),
            keys_per_block: 4,
            records_per_block: 3,
        }
    }

    /// Resource archive: `<Library_Data>` root, no declared encoding,
    /// UTF-16LE keys.
    pub fn mdd(version: Version) -> Self {
        let mut builder = Self::new(version, Enc::Utf16);
        builder.root = "Library_Data";
        builder.declare_encoding = false;
        builder
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_string(), value.to_string()));
        self
    }

    pub fn encrypt_index(mut self) -> Self {
        self.encrypt_index = true;
        self
    }

    pub fn keys_per_block(mut self, n: usize) -> Self {
        self.keys_per_block = n;
        self
    }

    pub fn records_per_block(mut self, n: usize) -> Self {
        self.records_per_block = n;
        self
    }

    /// Append one entry. Entries must already be in stored (sorted) order.
    pub fn entry(mut self, key: &str, record: Vec<u8>) -> Self {
        self.entries.push((key.to_string(), record));
        self
    }

    /// Append a text definition entry encoded with the fixture's encoding.
    pub fn text_entry(self, key: &str, definition: &str) -> Self {
        let record = text_record(definition, self.encoding);
        self.entry(key, record)
    }

    fn num(&self, value: u64) -> Vec<u8> {
        match self.version {
            Version::V1 => (value as u32).to_be_bytes().to_vec(),
            Version::V2 => value.to_be_bytes().to_vec(),
        }
    }

    fn short(&self, value: usize) -> Vec<u8> {
        match self.version {
            Version::V1 => vec![value as u8],
            Version::V2 => (value as u16).to_be_bytes().to_vec(),
        }
    }

    fn nul_unit(&self) -> Vec<u8> {
        vec![0u8; self.encoding.unit_width()]
    }

    pub fn build(self) -> Fixture {
        assert!(!self.entries.is_empty(), "fixture needs entries");

        // Record offsets: cumulative positions in the decompressed stream.
        let mut offsets = Vec::with_capacity(self.entries.len());
        let mut cursor = 0u32;
        for (_, record) in &self.entries {
            offsets.push(cursor);
            cursor += record.len() as u32;
        }

        // Key blocks.
        let mut key_blocks = Vec::new(); // (content, first, last, n)
        let mut start = 0;
        while start < self.entries.len() {
            let end = (start + self.keys_per_block).min(self.entries.len());
            let mut content = Vec::new();
            for i in start..end {
                content.extend(self.num(offsets[i] as u64));
                content.extend(self.encoding.encode(&self.entries[i].0));
                content.extend(self.nul_unit());
            }
            let first = self.entries[start].0.clone();
            let last = self.entries[end - 1].0.clone();
            key_blocks.push((content, first, last, end - start));
            start = end;
        }

        let compressed_key_blocks: Vec<Vec<u8>> = key_blocks
            .iter()
            .map(|(content, _, _, _)| zlib_block(content))
            .collect();

        // Keyword index describing the key blocks.
        let mut index_content = Vec::new();
        for ((content, first, last, n), compressed) in
            key_blocks.iter().zip(&compressed_key_blocks)
        {
            index_content.extend(self.num(*n as u64));
            index_content.extend(self.short(self.encoding.units(first)));
            index_content.extend(self.encoding.encode(first));
            if self.version == Version::V2 {
                index_content.extend(self.nul_unit());
            }
            index_content.extend(self.short(self.encoding.units(last)));
            index_content.extend(self.encoding.encode(last));
            if self.version == Version::V2 {
                index_content.extend(self.nul_unit());
            }
            index_content.extend(self.num(compressed.len() as u64));
            index_content.extend(self.num(content.len() as u64));
        }

        let key_index_block = match self.version {
            Version::V1 => index_content.clone(),
            Version::V2 => {
                let checksum = adler32_slice(&index_content);
                let mut payload = zlib_compress(&index_content);
                if self.encrypt_index {
                    encrypt_index_payload(&mut payload, &checksum.to_be_bytes());
                }
                let mut block = vec![2u8, 0, 0, 0];
                block.extend_from_slice(&checksum.to_be_bytes());
                block.extend_from_slice(&payload);
                block
            }
        };

        let key_blocks_len: usize = compressed_key_blocks.iter().map(Vec::len).sum();

        // Keyword summary.
        let mut summary = Vec::new();
        summary.extend(self.num(key_blocks.len() as u64));
        summary.extend(self.num(self.entries.len() as u64));
        if self.version == Version::V2 {
            summary.extend(self.num(index_content.len() as u64));
        }
        summary.extend(self.num(key_index_block.len() as u64));
        summary.extend(self.num(key_blocks_len as u64));
        if self.version == Version::V2 {
            let checksum = adler32_slice(&summary);
            summary.extend_from_slice(&checksum.to_be_bytes());
        }

        // Record blocks.
        let mut record_blocks = Vec::new(); // (comp, decomp_len)
        for chunk in self.entries.chunks(self.records_per_block) {
            let mut content = Vec::new();
            for (_, record) in chunk {
                content.extend_from_slice(record);
            }
            record_blocks.push((zlib_block(&content), content.len()));
        }

        let mut record_index = Vec::new();
        for (comp, decomp_len) in &record_blocks {
            record_index.extend(self.num(comp.len() as u64));
            record_index.extend(self.num(*decomp_len as u64));
        }
        let record_blocks_len: usize = record_blocks.iter().map(|(c, _)| c.len()).sum();

        let mut record_summary = Vec::new();
        record_summary.extend(self.num(record_blocks.len() as u64));
        record_summary.extend(self.num(self.entries.len() as u64));
        record_summary.extend(self.num(record_index.len() as u64));
        record_summary.extend(self.num(record_blocks_len as u64));

        // Header.
        let engine_version = match self.version {
            Version::V1 => "1.2",
            Version::V2 => "2.0",
        };
        let mut xml = format!(
            "<{} GeneratedByEngineVersion=\"{}\" Title=\"Test Dictionary\"",
            self.root, engine_version
        );
        if self.declare_encoding {
            xml.push_str(&format!(" Encoding=\"{}\"", self.encoding.label()));
        }
        if self.encrypt_index {
            xml.push_str(" Encrypted=\"2\"");
        }
        for (name, value) in &self.attrs {
            xml.push_str(&format!(" {}=\"{}\"", name, xml_escape(value)));
        }
        xml.push_str("/>");

        let mut header_bytes: Vec<u8> = xml
            .encode_utf16()
            .flat_map(|u| u.to_le_bytes())
            .collect();
        header_bytes.extend_from_slice(&[0, 0]);

        // Assemble.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(header_bytes.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&header_bytes);
        bytes.extend_from_slice(&adler32_slice(&header_bytes).to_le_bytes());

        let summary_pos = bytes.len();
        bytes.extend_from_slice(&summary);
        let key_index_pos = bytes.len();
        bytes.extend_from_slice(&key_index_block);
        for block in &compressed_key_blocks {
            bytes.extend_from_slice(block);
        }
        bytes.extend_from_slice(&record_summary);
        bytes.extend_from_slice(&record_index);
        for (block, _) in &record_blocks {
            bytes.extend_from_slice(block);
        }

        Fixture {
            bytes,
            offsets,
            summary_pos,
            key_index_pos,
        }
    }
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn zlib_compress(content: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content).expect("zlib write");
    encoder.finish().expect("zlib finish")
}

/// Full block framing: tag 2, three zero bytes, Adler-32 of the content,
/// zlib payload.
fn zlib_block(content: &[u8]) -> Vec<u8> {
    let mut block = vec![2u8, 0, 0, 0];
    block.extend_from_slice(&adler32_slice(content).to_be_bytes());
    block.extend_from_slice(&zlib_compress(content));
    block
}

/// Inverse of the reader's keyword-index stream transform, keyed the same
/// way from the block checksum.
fn encrypt_index_payload(payload: &mut [u8], checksum: &[u8; 4]) {
    let mut hasher = Ripemd128::new();
    hasher.update(checksum);
    hasher.update([0x95, 0x36, 0x00, 0x00]);
    let key: [u8; 16] = hasher.finalize().into();

    let mut prev = 0x36u8;
    for (i, byte) in payload.iter_mut().enumerate() {
        let cipher = (*byte ^ prev ^ (i as u8) ^ key[i % key.len()]).rotate_left(4);
        *byte = cipher;
        prev = cipher;
    }
}
