//! MDict header parsing.
//!
//! The file opens with a 4-byte big-endian length, that many bytes of
//! UTF-16LE XML, and a 4-byte checksum. The XML is a single element whose
//! attributes carry everything this reader needs: engine version, text
//! encoding, encryption bits, the keyword normalization policy, and the
//! optional stylesheet table.

use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder};
use encoding_rs::{Encoding, UTF_16LE};
use log::{debug, info};
use quick_xml::events::Event;
use quick_xml::Reader;

use super::error::{MdictError, Result};
use super::scanner::FormatVersion;
use super::source::ByteSource;
use super::stylesheet::{self, StyleSheet};

/// Parsed header attributes, immutable after open.
#[derive(Debug)]
pub struct MdictHeader {
    pub version: FormatVersion,
    /// Raw `GeneratedByEngineVersion` string, kept for diagnostics.
    pub engine_version: String,
    pub encoding: &'static Encoding,
    /// `Encrypted` bit 0x02: the keyword index of blocks is encrypted.
    pub encrypt_key_index: bool,
    pub key_case_sensitive: bool,
    pub strip_key: bool,
    pub stylesheet: StyleSheet,
    pub title: String,
    pub description: Option<String>,
    pub creation_date: Option<String>,
}

/// Parse the header at the start of `source`.
///
/// Returns the header and its total footprint in bytes
/// (`4 + header_length + 4`), which is where the keyword section begins.
/// The trailing checksum is consumed but not verified.
pub fn parse(source: &dyn ByteSource) -> Result<(MdictHeader, u64)> {
    let len_bytes = source.read(0, 4)?;
    let header_len = BigEndian::read_u32(&len_bytes) as usize;
    debug!("header length: {} bytes", header_len);

    let header_bytes = source.read(4, header_len)?;

    let (decoded, _, _) = UTF_16LE.decode(&header_bytes);
    let decoded = decoded.trim_end_matches('\0');

    // Some dictionaries embed stray control characters in the XML.
    let sanitized: String = decoded
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect();

    let attrs = parse_xml_attributes(&sanitized)?;
    let header = build_header(&attrs)?;

    info!(
        "header parsed: version={}, title={:?}, encoding={}, key index encrypted={}",
        header.engine_version,
        header.title,
        header.encoding.name(),
        header.encrypt_key_index
    );

    Ok((header, 4 + header_len as u64 + 4))
}

/// Extract the attributes of the root element.
///
/// The root must be `<Dictionary>` (`.mdx`) or `<Library_Data>` (`.mdd`).
fn parse_xml_attributes(xml: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                match e.name().as_ref() {
                    b"Dictionary" | b"Library_Data" => {}
                    other => {
                        return Err(MdictError::InvalidHeader(format!(
                            "unexpected root element <{}>",
                            String::from_utf8_lossy(other)
                        )));
                    }
                }
                return e
                    .attributes()
                    .map(|attr_result| {
                        let attr = attr_result.map_err(|e| {
                            MdictError::InvalidHeader(format!("bad XML attribute: {}", e))
                        })?;
                        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                        let value = attr
                            .unescape_value()
                            .map_err(|e| {
                                MdictError::InvalidHeader(format!("bad attribute value: {}", e))
                            })?
                            .into_owned();
                        Ok((key, value))
                    })
                    .collect();
            }
            Ok(Event::Eof) => {
                return Err(MdictError::InvalidHeader(
                    "no root element in header XML".to_string(),
                ))
            }
            Err(e) => {
                return Err(MdictError::InvalidHeader(format!(
                    "malformed header XML: {}",
                    e
                )))
            }
            _ => {}
        }
    }
}

fn build_header(attrs: &HashMap<String, String>) -> Result<MdictHeader> {
    let engine_version = attrs
        .get("GeneratedByEngineVersion")
        .cloned()
        .unwrap_or_else(|| "1.0".to_string());
    let version_num: f32 = engine_version
        .trim()
        .parse()
        .map_err(|_| MdictError::UnsupportedVersion(engine_version.clone()))?;
    // v3 is a different container generation with its own block structure.
    if !(1.0..3.0).contains(&version_num) {
        return Err(MdictError::UnsupportedVersion(engine_version));
    }
    let version = if version_num >= 2.0 {
        FormatVersion::V2
    } else {
        FormatVersion::V1
    };

    let encrypted = attrs
        .get("Encrypted")
        .map(|s| match s.trim() {
            "" | "No" => Ok(0u8),
            "Yes" => Ok(1),
            other => other.parse::<u8>().map_err(|_| {
                MdictError::InvalidHeader(format!("unreadable Encrypted value {:?}", other))
            }),
        })
        .transpose()?
        .unwrap_or(0);
    if encrypted & 0x01 != 0 {
        // Keyword-header encryption needs the dictionary's license key.
        return Err(MdictError::UnsupportedEncryption);
    }
    let encrypt_key_index = encrypted & 0x02 != 0;

    let encoding = match attrs.get("Encoding").map(String::as_str) {
        None | Some("") => UTF_16LE,
        // GBK and GB2312 label subsets of GB18030.
        Some("GBK") | Some("GB2312") => encoding_rs::GB18030,
        Some(label) => Encoding::for_label(label.as_bytes()).ok_or_else(|| {
            MdictError::InvalidHeader(format!("unsupported encoding {:?}", label))
        })?,
    };

    let key_case_sensitive = yes_no(attrs.get("KeyCaseSensitive")).unwrap_or(false);
    let strip_key = yes_no(attrs.get("StripKey")).unwrap_or(version == FormatVersion::V1);

    let stylesheet = attrs
        .get("StyleSheet")
        .map(|raw| stylesheet::parse(raw))
        .unwrap_or_default();

    Ok(MdictHeader {
        version,
        engine_version,
        encoding,
        encrypt_key_index,
        key_case_sensitive,
        strip_key,
        stylesheet,
        title: attrs.get("Title").cloned().unwrap_or_default(),
        description: attrs.get("Description").cloned(),
        creation_date: attrs.get("CreationDate").cloned(),
    })
}

fn yes_no(value: Option<&String>) -> Option<bool> {
    match value?.trim() {
        "Yes" | "yes" | "true" => Some(true),
        "No" | "no" | "false" => Some(false),
        _ => None,
    }
}
