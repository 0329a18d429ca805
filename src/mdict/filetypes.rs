//! Specialization logic for the two container flavors (.mdx vs .mdd).

use std::sync::OnceLock;

use encoding_rs::{Encoding, UTF_16LE};
use regex::Regex;

/// Behavior that differs between dictionary (`.mdx`) and resource (`.mdd`)
/// files.
pub trait FileType {
    /// A short name used for logging.
    const DEBUG_NAME: &'static str;

    /// Forced keyword encoding, when the container mandates one.
    ///
    /// - `None`: use the encoding declared in the header (MDX behavior)
    /// - `Some(encoding)`: always use this encoding (MDD keys are UTF-16LE)
    const ENCODING_OVERRIDE: Option<&'static Encoding>;

    /// Characters removed from keywords when the strip policy is on.
    fn strip_pattern() -> &'static Regex;
}

/// Zero-cost marker for `.mdx` dictionary files.
#[derive(Debug)]
pub struct Mdx;

impl FileType for Mdx {
    const DEBUG_NAME: &'static str = "MDX";
    const ENCODING_OVERRIDE: Option<&'static Encoding> = None;

    fn strip_pattern() -> &'static Regex {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        PATTERN.get_or_init(|| Regex::new(r"[()., '/@_-]").expect("invalid strip pattern"))
    }
}

/// Zero-cost marker for `.mdd` resource files.
#[derive(Debug)]
pub struct Mdd;

impl FileType for Mdd {
    const DEBUG_NAME: &'static str = "MDD";
    const ENCODING_OVERRIDE: Option<&'static Encoding> = Some(UTF_16LE);

    /// Resource keys also shed their file extension before comparison.
    fn strip_pattern() -> &'static Regex {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        PATTERN
            .get_or_init(|| Regex::new(r"(\.[^.]*$)|[()., '/@_-]").expect("invalid strip pattern"))
    }
}
