//! Database access.
//!
//! Everything above this module talks to the database through the
//! [`Connection`] trait: parameterized statements in, ordered rows out. Two
//! backends are provided, PostgreSQL for production and SQLite for local
//! fixtures and tests.

mod postgres;
mod sqlite;
mod value;

use thiserror::Error;

use crate::config::{ConnectionSettings, Driver, SettingsError};
use crate::sql::Dialect;

pub use self::postgres::PostgresConnection;
pub use self::sqlite::SqliteConnection;
pub use self::value::{Row, Value};

pub type DbResult<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("postgres: {0}")]
    Postgres(#[from] ::postgres::Error),

    #[error("connection is closed")]
    Closed,

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("configuration: {0}")]
    Config(#[from] SettingsError),
}

impl DbError {
    /// The message raised by the database server, when the failure came from
    /// statement execution rather than the client side.
    pub fn server_message(&self) -> Option<String> {
        match self {
            DbError::Postgres(e) => e.as_db_error().map(|db| db.message().to_string()),
            DbError::Sqlite(rusqlite::Error::SqliteFailure(_, Some(msg))) => Some(msg.clone()),
            _ => None,
        }
    }
}

/// A live database session.
pub trait Connection {
    fn dialect(&self) -> Dialect;

    fn is_open(&self) -> bool;

    /// Run a statement that returns rows.
    fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>>;

    /// Run a statement for its effect; returns the affected row count.
    fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64>;

    /// Run a statement in its own transaction: committed when it succeeds,
    /// rolled back when it fails.
    fn query_in_transaction(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>>;

    fn close(&mut self) -> DbResult<()>;
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        (**self).query(sql, params)
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        (**self).execute(sql, params)
    }

    fn query_in_transaction(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        (**self).query_in_transaction(sql, params)
    }

    fn close(&mut self) -> DbResult<()> {
        (**self).close()
    }
}

/// Open the connection described by a settings entry.
pub fn connect(settings: &ConnectionSettings) -> DbResult<Box<dyn Connection>> {
    let target = settings.resolved_connection_string()?;
    match settings.driver_type()? {
        Driver::Postgres => Ok(Box::new(PostgresConnection::connect(
            &target,
            settings.schema.as_deref(),
        )?)),
        Driver::Sqlite => Ok(Box::new(SqliteConnection::open(&target)?)),
    }
}
