//! Header stylesheet table and definition expansion.
//!
//! Definitions may carry backtick spans like `` `1`bold`1` `` whose numeric
//! tags reference entries of the header's `StyleSheet` attribute. Each pair
//! of identical tags wraps the text between them in the entry's prefix and
//! suffix.

use std::collections::BTreeMap;

use log::warn;

/// One stylesheet entry: text emitted before and after a tagged span.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StylePair {
    pub prefix: String,
    pub suffix: String,
}

/// Stylesheet entries keyed by their numeric tag.
pub type StyleSheet = BTreeMap<u32, StylePair>;

/// Parse the whitespace-separated `StyleSheet` header attribute.
///
/// Numeric tokens open a new entry. Tokens containing `/` collect into the
/// open entry's suffix; all other tokens join its prefix, space-separated.
/// Tokens before the first number are dropped.
pub fn parse(attr: &str) -> StyleSheet {
    let mut sheet = StyleSheet::new();
    let mut current: Option<u32> = None;
    for token in attr.split_whitespace() {
        if let Ok(tag) = token.parse::<u32>() {
            sheet.entry(tag).or_default();
            current = Some(tag);
            continue;
        }
        if let Some(tag) = current {
            let entry = sheet.entry(tag).or_default();
            if token.contains('/') {
                entry.suffix.push_str(token);
            } else {
                if !entry.prefix.is_empty() {
                    entry.prefix.push(' ');
                }
                entry.prefix.push_str(token);
            }
        }
    }
    sheet
}

/// Expand backtick style tags in a decoded definition.
///
/// The first occurrence of a tag emits its entry's prefix, the matching
/// second occurrence its suffix; a different tag opening mid-span closes the
/// previous one first, and a span left open at the end is closed. Tags with
/// no stylesheet entry pass through verbatim, backticks included.
pub fn expand(definition: &str, sheet: &StyleSheet) -> String {
    if sheet.is_empty() || !definition.contains('`') {
        return definition.to_string();
    }

    let mut segments = definition.split('`');
    let mut out = String::with_capacity(definition.len());
    out.push_str(segments.next().unwrap_or(""));

    let mut open: Option<u32> = None;
    while let Some(tag_token) = segments.next() {
        let text = segments.next();
        let entry = tag_token
            .parse::<u32>()
            .ok()
            .filter(|tag| sheet.contains_key(tag));
        match entry {
            Some(tag) => {
                if open == Some(tag) {
                    out.push_str(&sheet[&tag].suffix);
                    open = None;
                } else {
                    if let Some(prev) = open.take() {
                        out.push_str(&sheet[&prev].suffix);
                    }
                    out.push_str(&sheet[&tag].prefix);
                    open = Some(tag);
                }
            }
            None => {
                if tag_token.parse::<u32>().is_ok() {
                    warn!("style tag `{}` has no stylesheet entry", tag_token);
                }
                out.push('`');
                out.push_str(tag_token);
                if text.is_some() {
                    out.push('`');
                }
            }
        }
        if let Some(text) = text {
            out.push_str(text);
        }
    }

    if let Some(tag) = open {
        out.push_str(&sheet[&tag].suffix);
    }
    out
}
