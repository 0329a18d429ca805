//! The lookup engine: keyword search, paged enumeration, and retrieval.
//!
//! Searches run in two tiers: a binary search over the in-memory keyword
//! index narrows the query to one key block, which the single-slot cache
//! materializes for a second binary search inside it. All comparisons go
//! through [`MdictReader::adapt_key`], the dictionary's normalization.
//!
//! Paged enumeration keeps a [`Trail`] cursor between calls so `follow`
//! queries resume where the previous page stopped, and a monotonic ticket
//! cancels continuations that a newer query has superseded.

use log::debug;
use regex::Regex;

use super::error::{MdictError, Result};
use super::filetypes::{FileType, Mdd, Mdx};
use super::reader::MdictReader;
use super::stylesheet;

/// Page size used when a query does not name one.
const DEFAULT_PAGE_SIZE: usize = 10;

/// Longest `@@@LINK=` chain followed before reporting a loop.
const MAX_LINK_DEPTH: usize = 16;

/// One keyword hit: the stored word and its record offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordHit {
    pub word: String,
    pub offset: u32,
}

/// One page of a paged enumeration.
#[derive(Debug, Clone)]
pub struct WordPage {
    pub hits: Vec<WordHit>,
    /// No further page can contribute entries for this phrase.
    pub exhausted: bool,
}

/// Parameters for [`MdictReader::match_keys`].
#[derive(Debug, Clone)]
pub struct MatchQuery {
    pub phrase: String,
    /// Page size; 0 selects the default of 10.
    pub max: usize,
    /// Continue the previous enumeration of the same phrase.
    pub follow: bool,
}

impl MatchQuery {
    pub fn new(phrase: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            max: 0,
            follow: false,
        }
    }

    pub fn max(mut self, max: usize) -> Self {
        self.max = max;
        self
    }

    pub fn follow(mut self) -> Self {
        self.follow = true;
        self
    }
}

/// Session cursor for one paged enumeration.
///
/// `offset` is the entry the current page started from within `block`, `pos`
/// how far the page advanced past it; the next `follow` call resumes at
/// `offset + pos`.
#[derive(Debug)]
pub(super) struct Trail {
    pub(super) phrase: String,
    pub(super) block: usize,
    pub(super) offset: usize,
    pub(super) pos: usize,
    pub(super) count: usize,
    pub(super) total: usize,
    pub(super) exhausted: bool,
    pub(super) ticket: u64,
}

impl Trail {
    fn exhausted_for(phrase: &str, ticket: u64) -> Self {
        Self {
            phrase: phrase.to_string(),
            block: 0,
            offset: 0,
            pos: 0,
            count: 0,
            total: 0,
            exhausted: true,
            ticket,
        }
    }
}

/// Compiled `*`/`?` glob for one enumeration.
struct WildcardFilter {
    /// The first run of plain characters before a wildcard; seeds the block
    /// search.
    prefix: String,
    pattern: Regex,
    allow_multiword: bool,
}

impl WildcardFilter {
    /// Detect globbing in `phrase`. Returns `None` for plain phrases,
    /// including those that open with a wildcard and never anchor it.
    /// A trailing space in the raw phrase admits multi-word entries.
    fn parse(phrase: &str) -> Result<Option<Self>> {
        let allow_multiword = phrase.ends_with(' ');
        let lower = phrase.trim().to_lowercase();

        let mut run_start = None;
        let mut prefix = None;
        for (i, c) in lower.char_indices() {
            match c {
                '*' | '?' => {
                    if let Some(s) = run_start {
                        prefix = Some(lower[s..i].to_string());
                        break;
                    }
                }
                _ if run_start.is_none() => run_start = Some(i),
                _ => {}
            }
        }
        let Some(prefix) = prefix else {
            return Ok(None);
        };

        let mut pattern = String::from("^");
        for c in lower.chars() {
            match c {
                '*' => pattern.push_str(".*"),
                '?' => pattern.push('.'),
                c => pattern.push_str(&regex::escape(&c.to_string())),
            }
        }
        pattern.push('$');
        let pattern = Regex::new(&pattern).map_err(|e| {
            MdictError::InvalidFormat(format!("unusable wildcard pattern: {}", e))
        })?;

        Ok(Some(Self {
            prefix,
            pattern,
            allow_multiword,
        }))
    }

    fn matches(&self, word: &str) -> bool {
        (self.allow_multiword || !word.contains(' '))
            && self.pattern.is_match(&word.to_lowercase())
    }
}

impl<T: FileType> MdictReader<T> {
    /// Canonical comparison form of a keyword under the header's policy:
    /// case folding unless `KeyCaseSensitive`, punctuation stripping when
    /// `StripKey` (the default on v1).
    pub fn adapt_key(&self, key: &str) -> String {
        Self::adapt_with(
            self.header().key_case_sensitive,
            self.header().strip_key,
            key,
        )
    }

    fn adapt_with(case_sensitive: bool, strip: bool, key: &str) -> String {
        if case_sensitive {
            if strip {
                T::strip_pattern().replace_all(key, "").into_owned()
            } else {
                key.to_string()
            }
        } else {
            let lower = key.to_lowercase();
            if strip {
                T::strip_pattern().replace_all(&lower, "").into_owned()
            } else {
                lower
            }
        }
    }

    /// Two-tier search for the first entry whose adapted form is not below
    /// `target` (itself already adapted). Returns its block and entry index.
    fn seek_vanguard(&mut self, target: &str) -> Result<Option<(usize, usize)>> {
        if self.key_index().is_empty() {
            return Ok(None);
        }
        let cs = self.header().key_case_sensitive;
        let strip = self.header().strip_key;

        // Reduce to the first block whose last word could hold the target,
        // then walk back over predecessors that adapt to the same form.
        let mut block = self
            .key_index()
            .partition_point(|kdx| Self::adapt_with(cs, strip, &kdx.last_word).as_str() < target);
        if block == self.key_index().len() {
            return Ok(None);
        }
        while block > 0
            && Self::adapt_with(cs, strip, &self.key_index()[block - 1].last_word) == target
        {
            block -= 1;
        }

        let nblocks = self.key_index().len();
        loop {
            let found = {
                let entries = self.key_block_entries(block)?;
                let mut start = entries
                    .partition_point(|e| Self::adapt_with(cs, strip, &e.word).as_str() < target);
                while start > 0 && Self::adapt_with(cs, strip, &entries[start - 1].word) == target
                {
                    start -= 1;
                }
                (start < entries.len()).then_some(start)
            };
            match found {
                Some(start) => return Ok(Some((block, start))),
                None if block + 1 < nblocks => block += 1,
                None => return Ok(None),
            }
        }
    }

    /// Exact-prefix positional lookup: the vanguard block's entries from the
    /// first match onward. Resets any paged enumeration in progress.
    pub fn word_list(&mut self, query: &str) -> Result<Vec<WordHit>> {
        self.trail = None;
        let target = self.adapt_key(query);
        let Some((block, start)) = self.seek_vanguard(&target)? else {
            return Ok(Vec::new());
        };
        let entries = self.key_block_entries(block)?;
        Ok(entries[start..]
            .iter()
            .map(|e| WordHit {
                word: e.word.clone(),
                offset: e.offset,
            })
            .collect())
    }

    /// Like [`word_list`](Self::word_list), filtered to the single entry at
    /// `offset`.
    pub fn word_list_at(&mut self, query: &str, offset: u32) -> Result<Vec<WordHit>> {
        let mut hits = self.word_list(query)?;
        hits.retain(|h| h.offset == offset);
        hits.truncate(1);
        Ok(hits)
    }

    /// All `(word, offset)` pairs of key block `block_no`, in stored order.
    pub fn key_block_words(&mut self, block_no: usize) -> Result<Vec<WordHit>> {
        let entries = self.key_block_entries(block_no)?;
        Ok(entries
            .iter()
            .map(|e| WordHit {
                word: e.word.clone(),
                offset: e.offset,
            })
            .collect())
    }

    /// Paged enumeration with optional `*`/`?` globbing.
    ///
    /// Without a wildcard the page holds consecutive entries starting at the
    /// phrase's position; with one, only entries matching the glob. Passing
    /// `follow` continues the previous enumeration of the same phrase; pages
    /// are disjoint and their concatenation covers every match exactly once.
    pub fn match_keys(&mut self, query: &MatchQuery) -> Result<WordPage> {
        let phrase = query.phrase.as_str();
        let page_size = if query.max == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            query.max
        };

        let mut follow = query.follow;
        if follow {
            match &self.trail {
                Some(trail) if trail.phrase == phrase => {}
                _ => follow = false,
            }
        }
        if follow {
            if let Some(trail) = &self.trail {
                if trail.exhausted {
                    return Ok(WordPage {
                        hits: Vec::new(),
                        exhausted: true,
                    });
                }
            }
        }

        // Every top-level call takes a fresh ticket; a continuation holding
        // an older one has been superseded and must not touch the trail.
        self.ticket += 1;
        let ticket = self.ticket;

        let filter = WildcardFilter::parse(phrase)?;
        let cs = self.header().key_case_sensitive;
        let strip = self.header().strip_key;
        let adapted_prefix = filter
            .as_ref()
            .map(|f| Self::adapt_with(cs, strip, &f.prefix));

        let resume = if follow { self.trail.take() } else { None };
        let prior_total = resume.as_ref().map(|t| t.total).unwrap_or(0);
        let (mut block, mut from) = match resume {
            Some(t) => (t.block, t.offset + t.pos),
            None => {
                let word = filter
                    .as_ref()
                    .map(|f| f.prefix.as_str())
                    .unwrap_or_else(|| phrase.trim());
                let target = Self::adapt_with(cs, strip, word);
                match self.seek_vanguard(&target)? {
                    Some(pos) => pos,
                    None => {
                        self.trail = Some(Trail::exhausted_for(phrase, ticket));
                        return Ok(WordPage {
                            hits: Vec::new(),
                            exhausted: true,
                        });
                    }
                }
            }
        };

        let mut hits = Vec::new();
        let mut trail = Trail {
            phrase: phrase.to_string(),
            block,
            offset: from,
            pos: 0,
            count: 0,
            total: prior_total,
            exhausted: false,
            ticket,
        };

        let nblocks = self.key_index().len();
        loop {
            if trail.ticket != self.ticket {
                return Err(MdictError::Cancelled);
            }

            let mut page_full = false;
            let block_len;
            {
                let entries = self.key_block_entries(block)?;
                block_len = entries.len();
                trail.block = block;
                trail.offset = from;
                trail.pos = block_len.saturating_sub(from);
                for (i, entry) in entries.iter().enumerate().skip(from) {
                    let keep = match &filter {
                        Some(f) => f.matches(&entry.word),
                        None => true,
                    };
                    if keep {
                        hits.push(WordHit {
                            word: entry.word.clone(),
                            offset: entry.offset,
                        });
                    }
                    if hits.len() >= page_size {
                        trail.pos = i + 1 - from;
                        page_full = true;
                        break;
                    }
                }
            }

            let consumed_to_end = from + trail.pos >= block_len;
            let next_can_contribute = block + 1 < nblocks
                && match &adapted_prefix {
                    Some(prefix) => {
                        Self::adapt_with(cs, strip, &self.key_index()[block + 1].first_word)
                            .starts_with(prefix.as_str())
                    }
                    None => true,
                };

            if page_full {
                trail.exhausted = consumed_to_end && !next_can_contribute;
                break;
            }
            if !next_can_contribute {
                trail.exhausted = true;
                break;
            }
            block += 1;
            from = 0;
        }

        trail.count = hits.len();
        trail.total += hits.len();
        debug!(
            "page for {:?}: {} hits, {} cumulative, exhausted={}",
            phrase, trail.count, trail.total, trail.exhausted
        );
        let exhausted = trail.exhausted;
        self.trail = Some(trail);
        Ok(WordPage { hits, exhausted })
    }
}

impl MdictReader<Mdx> {
    /// Definition text at `record_offset`, with stylesheet expansion applied
    /// and `@@@LINK=` redirections followed transparently.
    pub fn definition(&mut self, record_offset: u32) -> Result<String> {
        self.definition_at(record_offset, 0)
    }

    fn definition_at(&mut self, record_offset: u32, depth: usize) -> Result<String> {
        let desc = self
            .record_table()
            .find(record_offset)
            .ok_or(MdictError::OutOfRange(record_offset))?;
        let mut block = self.read_record_block(&desc)?;
        block.advance((record_offset - desc.decomp_offset) as usize)?;
        let text = block.read_nul_text()?;
        let text = stylesheet::expand(&text, &self.header().stylesheet);
        if let Some(rest) = text.strip_prefix("@@@LINK=") {
            let target = rest.split(['\r', '\n']).next().unwrap_or("").trim().to_string();
            return self.follow_link(&target, depth);
        }
        Ok(text)
    }

    fn follow_link(&mut self, target: &str, depth: usize) -> Result<String> {
        if depth >= MAX_LINK_DEPTH {
            return Err(MdictError::LinkLoop(target.to_string()));
        }
        debug!("following @@@LINK= to {:?}", target);
        let cs = self.header().key_case_sensitive;
        let strip = self.header().strip_key;
        let adapted = self.adapt_key(target);
        let Some((block, start)) = self.seek_vanguard(&adapted)? else {
            return Err(MdictError::LinkLoop(target.to_string()));
        };
        let offset = {
            let entries = self.key_block_entries(block)?;
            entries
                .get(start)
                .filter(|e| Self::adapt_with(cs, strip, &e.word) == adapted)
                .map(|e| e.offset)
        };
        match offset {
            Some(offset) => self.definition_at(offset, depth + 1),
            None => Err(MdictError::LinkLoop(target.to_string())),
        }
    }
}

impl MdictReader<Mdd> {
    /// Resource bytes for a path such as `images/cat.png`.
    ///
    /// Matching is case-insensitive, with forward slashes normalized to the
    /// stored leading-backslash form.
    pub fn resource(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut normalized = path.to_lowercase().replace('/', "\\");
        if !normalized.starts_with('\\') {
            normalized.insert(0, '\\');
        }

        let target = self.adapt_key(&normalized);
        let Some((block, start)) = self.seek_vanguard(&target)? else {
            return Err(MdictError::ResourceNotFound(path.to_string()));
        };

        let found = {
            let entries = self.key_block_entries(block)?;
            entries[start..]
                .iter()
                .find(|e| e.word.to_lowercase() == normalized)
                .map(|e| (e.offset, e.size))
        };
        let Some((offset, size)) = found else {
            return Err(MdictError::ResourceNotFound(path.to_string()));
        };

        let desc = self
            .record_table()
            .find(offset)
            .ok_or(MdictError::OutOfRange(offset))?;
        // A block-final entry has no forward difference; the record runs to
        // the end of its record block.
        let size = size.unwrap_or(desc.decomp_offset + desc.decomp_size - offset);
        let mut block_data = self.read_record_block(&desc)?;
        block_data.advance((offset - desc.decomp_offset) as usize)?;
        Ok(block_data.read_raw(size as usize)?.to_vec())
    }
}
