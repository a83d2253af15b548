//! Shared helper functions for SQL dialect implementations.

use std::borrow::Cow;

use sha2::{Digest, Sha256};

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style).
/// Used by: Postgres, SQLite
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

// =============================================================================
// String Quoting
// =============================================================================

/// Quote string with single quotes (standard SQL).
pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

// =============================================================================
// Boolean Formatting
// =============================================================================

/// Format boolean as true/false literal.
pub fn format_bool_literal(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

/// Format boolean as numeric 1/0.
pub fn format_bool_numeric(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

// =============================================================================
// Identifier validation
// =============================================================================

/// Identifiers that come from callers (scratch table names, procedure
/// names) are quoted on output, but must still be non-empty and free of
/// NUL bytes, which no backend accepts inside a quoted name.
pub fn is_valid_identifier(ident: &str) -> bool {
    !ident.is_empty() && !ident.contains('\0') && ident.len() <= 128
}

/// Longest identifier PostgreSQL stores without truncation (`NAMEDATALEN - 1`).
pub const MAX_IDENTIFIER_LEN: usize = 63;

const DIGEST_HEX_LEN: usize = 16;

/// `ident` unchanged when it fits in [`MAX_IDENTIFIER_LEN`] bytes; otherwise
/// a prefix of it, `_`, and 16 hex digits of its SHA-256, exactly that long.
/// Distinct long names keep distinct column names after shortening.
pub fn fit_identifier(ident: &str) -> Cow<'_, str> {
    if ident.len() <= MAX_IDENTIFIER_LEN {
        return Cow::Borrowed(ident);
    }
    let mut cut = MAX_IDENTIFIER_LEN - DIGEST_HEX_LEN - 1;
    while !ident.is_char_boundary(cut) {
        cut -= 1;
    }
    let digest = Sha256::digest(ident.as_bytes());
    let hex: String = digest
        .iter()
        .take(DIGEST_HEX_LEN / 2)
        .map(|b| format!("{:02x}", b))
        .collect();
    Cow::Owned(format!("{}_{}", &ident[..cut], hex))
}
