//! SQL Dialect definitions and formatting rules.
//!
//! This module provides a trait-based abstraction for the differences
//! between the two databases catdb talks to:
//!
//! - Parameter placeholders: `$1` (PostgreSQL) vs `?1` (SQLite)
//! - `DISTINCT ON`, emulated with `GROUP BY` on SQLite
//! - `UNLOGGED` scratch tables
//! - Stored procedures and `pg_trgm` similarity, PostgreSQL only
//!
//! # Usage
//!
//! ```ignore
//! use catdb::sql::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Postgres;
//! let quoted = dialect.quote_identifier("user");  // "user"
//! ```

pub mod helpers;
mod postgres;
mod sqlite;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use postgres::Postgres;
pub use sqlite::Sqlite;

use super::token::{Token, TokenStream};

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Quoting and literals
    // =========================================================================

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    /// Placeholder for the `n`th (1-based) bound parameter.
    fn placeholder(&self, n: usize) -> String;

    // =========================================================================
    // Pagination
    // =========================================================================

    fn emit_limit(&self, limit: u64) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Limit).space().push(Token::LitInt(limit as i64));
        ts
    }

    // =========================================================================
    // Feature flags
    // =========================================================================

    /// Whether `SELECT DISTINCT ON (...)` is available.
    fn supports_distinct_on(&self) -> bool {
        false
    }

    /// Whether `CREATE UNLOGGED TABLE` is available.
    fn supports_unlogged_tables(&self) -> bool {
        false
    }

    /// Whether stored procedures and set-returning functions can be invoked.
    fn supports_procedures(&self) -> bool {
        false
    }

    /// Whether `similarity()` from pg_trgm is available.
    fn supports_trigram_similarity(&self) -> bool {
        false
    }

    /// Whether planner statistics can be read from `pg_stats`.
    fn supports_column_statistics(&self) -> bool {
        false
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Postgres => &Postgres,
            Dialect::Sqlite => &Sqlite,
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(format!("unknown dialect '{other}'")),
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn placeholder(&self, n: usize) -> String {
        self.dialect().placeholder(n)
    }

    fn emit_limit(&self, limit: u64) -> TokenStream {
        self.dialect().emit_limit(limit)
    }

    fn supports_distinct_on(&self) -> bool {
        self.dialect().supports_distinct_on()
    }

    fn supports_unlogged_tables(&self) -> bool {
        self.dialect().supports_unlogged_tables()
    }

    fn supports_procedures(&self) -> bool {
        self.dialect().supports_procedures()
    }

    fn supports_trigram_similarity(&self) -> bool {
        self.dialect().supports_trigram_similarity()
    }

    fn supports_column_statistics(&self) -> bool {
        self.dialect().supports_column_statistics()
    }
}
