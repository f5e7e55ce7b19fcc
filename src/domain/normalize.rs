//! Name and title normalization
//!
//! Every comparison and every write against the catalog goes through these
//! functions first. The display form is what gets stored; the key is what
//! carries the uniqueness constraint.

use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

/// A name in its stored (title-cased) form together with its lookup key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedName {
    pub display: String,
    pub key: String,
}

/// Normalize an author, genre or publisher name.
///
/// Returns `None` when nothing but whitespace is left.
pub fn normalize_name(raw: &str) -> Option<NormalizedName> {
    let composed: String = raw.nfc().collect();
    let collapsed = collapse_whitespace(&composed);
    if collapsed.is_empty() {
        return None;
    }

    let display = title_case(&collapsed);
    let key = display.to_lowercase();
    Some(NormalizedName { display, key })
}

/// Book titles follow the same rules as names.
pub fn normalize_title(raw: &str) -> Option<NormalizedName> {
    normalize_name(raw)
}

/// Chapter titles are compared exactly, only surrounding whitespace is dropped.
pub fn chapter_title(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Upper-case the first letter of every run of letters, lower-case the rest.
///
/// Any non-letter (space, digit, apostrophe, hyphen) starts a new run, so
/// "o'brien" becomes "O'Brien" and "sci-fi" becomes "Sci-Fi".
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;

    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }

    out
}
