//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features used by catdb:
//! - ANSI identifier quoting (`"`)
//! - Numbered placeholders (`$1`)
//! - DISTINCT ON
//! - UNLOGGED tables for scratch results
//! - Functions and procedures (`SELECT * FROM f(..)`, `CALL p(..)`)
//! - pg_trgm similarity and pg_stats

use super::helpers;
use super::SqlDialect;

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn placeholder(&self, n: usize) -> String {
        format!("${n}")
    }

    fn supports_distinct_on(&self) -> bool {
        true
    }

    fn supports_unlogged_tables(&self) -> bool {
        true
    }

    fn supports_procedures(&self) -> bool {
        true
    }

    fn supports_trigram_similarity(&self) -> bool {
        true
    }

    fn supports_column_statistics(&self) -> bool {
        true
    }
}
