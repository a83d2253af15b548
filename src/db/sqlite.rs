//! SQLite backend.
//!
//! Used for local fixtures and tests. Stored procedures are not available.

use std::path::Path;

use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::ToSql;

use super::{Connection, DbError, DbResult, Row, Value};
use crate::sql::Dialect;

pub struct SqliteConnection {
    conn: Option<rusqlite::Connection>,
}

impl SqliteConnection {
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "opening sqlite database");
        Ok(Self::from_connection(rusqlite::Connection::open(path)?))
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::from_connection(rusqlite::Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: rusqlite::Connection) -> Self {
        Self { conn: Some(conn) }
    }

    /// Run several `;`-separated statements, e.g. a fixture script.
    pub fn execute_batch(&mut self, sql: &str) -> DbResult<()> {
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }

    fn conn(&mut self) -> DbResult<&mut rusqlite::Connection> {
        self.conn.as_mut().ok_or(DbError::Closed)
    }
}

fn run_query(conn: &rusqlite::Connection, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;

    let mut out = vec![];
    while let Some(row) = rows.next()? {
        let mut record = Row::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            record.insert(name.clone(), Value::from(row.get_ref(i)?));
        }
        out.push(record);
    }
    Ok(out)
}

impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        tracing::trace!(sql, params = params.len(), "sqlite query");
        run_query(self.conn()?, sql, params)
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        tracing::trace!(sql, params = params.len(), "sqlite execute");
        let affected = self
            .conn()?
            .execute(sql, rusqlite::params_from_iter(params.iter()))?;
        Ok(affected as u64)
    }

    fn query_in_transaction(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let tx = self.conn()?.transaction()?;
        // Dropping an uncommitted transaction rolls it back.
        let rows = run_query(&tx, sql, params)?;
        tx.commit()?;
        Ok(rows)
    }

    fn close(&mut self) -> DbResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| DbError::Sqlite(e))?;
        }
        Ok(())
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Int(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Int(i),
            ValueRef::Real(f) => Value::Float(f),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                Value::Text(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }
}
