//! Crate-level error type.

use thiserror::Error;

use crate::cache::CacheError;
use crate::config::SettingsError;
use crate::db::DbError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("unknown column: {table}.{column}")]
    UnknownColumn { table: String, column: String },

    #[error("no procedure named '{name}' accepts arguments ({})", .args.join(", "))]
    UnknownProcedure { name: String, args: Vec<String> },

    #[error("procedure call '{name}' is ambiguous between {} candidates", .matches.len())]
    AmbiguousProcedure { name: String, matches: Vec<String> },

    #[error("session is not connected")]
    NotConnected,

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("database error: {0}")]
    Database(#[from] DbError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
}
