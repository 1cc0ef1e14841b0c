//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &'static str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidData {
        field: label,
        reason: format!("'{value}' is not a valid id"),
    })
}

/// Trim and collapse internal whitespace. Returns `None` if nothing remains.
pub(crate) fn normalize_display(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut out = String::new();
    for token in trimmed.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(token);
    }
    if out.is_empty() { None } else { Some(out) }
}

/// Derive a URL-safe slug from free text.
///
/// Decomposes to NFKD, drops combining marks (so "Café" folds to "cafe"),
/// lowercases alphanumerics and joins runs of anything else with a single
/// hyphen. Returns `None` if no usable characters remain.
pub(crate) fn slugify(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut out = String::new();
    let mut prev_hyphen = false;
    for ch in trimmed.nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
            prev_hyphen = false;
        } else if !out.is_empty() && !prev_hyphen {
            out.push('-');
            prev_hyphen = true;
        }
    }
    let normalized = out.trim_matches('-');
    if normalized.is_empty() {
        None
    } else {
        Some(normalized.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_folds_accents_and_hyphenates() {
        assert_eq!(slugify("Home & Garden"), Some("home-garden".to_string()));
        assert_eq!(slugify("  Café  Corner "), Some("cafe-corner".to_string()));
        assert_eq!(slugify("Электроника"), Some("электроника".to_string()));
        assert_eq!(slugify("---"), None);
        assert_eq!(slugify(""), None);
    }

    #[test]
    fn normalize_display_collapses_whitespace() {
        assert_eq!(normalize_display("  a   b "), Some("a b".to_string()));
        assert_eq!(normalize_display("   "), None);
    }
}
