//! Warehouse identifier normalization.
//!
//! The control plane stores unquoted identifiers case-folded to upper case,
//! while double-quoted identifiers keep their exact spelling. Configuration
//! may use either form, so comparisons go through a normal form: `loader`,
//! `LOADER` and `"LOADER"` all denote the same object, `"loader"` does not.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref UNQUOTED_IDENTIFIER: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("identifier pattern is valid");
}

/// True if `name` is usable without quoting.
pub fn is_valid_unquoted_identifier(name: &str) -> bool {
    UNQUOTED_IDENTIFIER.is_match(name)
}

/// Resolves an identifier to its stored form: quoted identifiers keep their
/// inner spelling (with doubled quotes unescaped), unquoted identifiers fold
/// to upper case.
pub fn normalize_identifier(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(inner) = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        inner.replace("\"\"", "\"")
    } else {
        trimmed.to_ascii_uppercase()
    }
}

/// Compares two identifiers under quoting equivalence and case folding.
pub fn identifiers_equal(a: &str, b: &str) -> bool {
    normalize_identifier(a) == normalize_identifier(b)
}

/// Renders an identifier for interpolation into SQL: already-canonical names
/// pass through bare, anything else is double-quoted with `"` doubled.
pub fn quote_identifier(name: &str) -> String {
    let normalized = normalize_identifier(name);
    if is_valid_unquoted_identifier(&normalized)
        && normalized == normalized.to_ascii_uppercase()
    {
        normalized
    } else {
        format!("\"{}\"", normalized.replace('"', "\"\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unquoted_identifiers_fold_to_upper() {
        assert_eq!(normalize_identifier("loader"), "LOADER");
        assert_eq!(normalize_identifier("  Loader  "), "LOADER");
    }

    #[test]
    fn test_quoted_identifiers_keep_exact_spelling() {
        assert_eq!(normalize_identifier("\"loader\""), "loader");
        assert_eq!(normalize_identifier("\"my \"\"db\"\"\""), "my \"db\"");
    }

    #[test]
    fn test_quoting_equivalence() {
        assert!(identifiers_equal("loader", "LOADER"));
        assert!(identifiers_equal("\"LOADER\"", "loader"));
        assert!(!identifiers_equal("\"loader\"", "LOADER"));
        assert!(!identifiers_equal("loader", "loader2"));
    }

    #[test]
    fn test_quote_identifier_only_when_needed() {
        assert_eq!(quote_identifier("loader"), "LOADER");
        assert_eq!(quote_identifier("\"mixedCase\""), "\"mixedCase\"");
        assert_eq!(quote_identifier("my-db"), "\"MY-DB\"");
    }

    #[test]
    fn test_unquoted_validity() {
        assert!(is_valid_unquoted_identifier("EVENTS_V2"));
        assert!(is_valid_unquoted_identifier("_staging$tmp"));
        assert!(!is_valid_unquoted_identifier("2fast"));
        assert!(!is_valid_unquoted_identifier("has space"));
        assert!(!is_valid_unquoted_identifier(""));
    }
}
