//! Shared detection patterns.
//!
//! Regexes used by more than one stage: placeholder markers in templates,
//! bare numeric values in oracle output, and outline annotations.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // =========================================================================
    // TEMPLATE PATTERNS
    // =========================================================================

    /// Double-brace placeholder with optional inner whitespace: `{{ key }}`
    pub static ref PLACEHOLDER_PATTERN: Regex = Regex::new(
        r"\{\{\s*(.*?)\s*\}\}"
    ).unwrap();

    // =========================================================================
    // VALUE PATTERNS
    // =========================================================================

    /// A value made only of a number (integer or decimal), surrounding
    /// whitespace allowed.
    pub static ref NUMERIC_PATTERN: Regex = Regex::new(
        r"^\s*\d+(?:\.\d+)?\s*$"
    ).unwrap();

    // =========================================================================
    // OUTLINE PATTERNS
    // =========================================================================

    /// Trailing type annotation on an outline line, e.g. `(checkbox)`.
    pub static ref ANNOTATION_PATTERN: Regex = Regex::new(
        r"(?i)\((checkbox|text|qty|number|section)\)\s*$"
    ).unwrap();

    /// Any trailing parenthetical, stripped from outline names.
    pub static ref TRAILING_PAREN_PATTERN: Regex = Regex::new(
        r"\s*\([^)]*\)\s*$"
    ).unwrap();
}

/// A placeholder found in a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderMatch {
    /// Trimmed key between the delimiters
    pub key: String,

    /// Byte offset of the opening delimiter
    pub start: usize,

    /// Byte offset just past the closing delimiter
    pub end: usize,
}

/// Find every non-empty placeholder in `text`, in order of appearance.
pub fn find_placeholders(text: &str) -> Vec<PlaceholderMatch> {
    PLACEHOLDER_PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let key = caps.get(1)?.as_str().trim();
            if key.is_empty() {
                return None;
            }
            Some(PlaceholderMatch {
                key: key.to_string(),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// Check if text contains any placeholder marker.
pub fn contains_placeholder(text: &str) -> bool {
    PLACEHOLDER_PATTERN.is_match(text)
}

/// Remove every placeholder marker from text.
pub fn strip_placeholders(text: &str) -> String {
    PLACEHOLDER_PATTERN.replace_all(text, "").into_owned()
}

/// Check if a value is a bare number.
pub fn is_numeric(value: &str) -> bool {
    NUMERIC_PATTERN.is_match(value)
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
