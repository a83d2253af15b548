//! SQLite SQL dialect.
//!
//! - ANSI identifier quoting (`"`)
//! - Numbered placeholders (`?1`)
//! - Booleans stored as integers
//! - No DISTINCT ON; a bare-column GROUP BY picks one row per group instead

use super::helpers;
use super::SqlDialect;

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn placeholder(&self, n: usize) -> String {
        format!("?{n}")
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }
}
