// tests/session/procedure_test.rs
use std::collections::VecDeque;
use std::sync::Arc;

use catdb::db::{Connection, DbError, DbResult, Row, SqliteConnection, Value};
use catdb::schema::{OperationKind, Parameter, Procedure, Schema};
use catdb::sql::Dialect;
use catdb::{Error, Session};
use indexmap::IndexMap;

/// Replays canned results and records every statement it is handed.
struct ScriptedConnection {
    dialect: Dialect,
    open: bool,
    results: VecDeque<DbResult<Vec<Row>>>,
    statements: Vec<(String, Vec<Value>)>,
}

impl ScriptedConnection {
    fn postgres(results: Vec<DbResult<Vec<Row>>>) -> Self {
        Self {
            dialect: Dialect::Postgres,
            open: true,
            results: results.into(),
            statements: vec![],
        }
    }

    fn next(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        self.statements.push((sql.to_string(), params.to_vec()));
        self.results.pop_front().unwrap_or_else(|| Ok(vec![]))
    }
}

impl Connection for ScriptedConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        self.next(sql, params)
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        self.next(sql, params).map(|rows| rows.len() as u64)
    }

    fn query_in_transaction(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        self.next(sql, params)
    }

    fn close(&mut self) -> DbResult<()> {
        self.open = false;
        Ok(())
    }
}

fn server_error(message: &str) -> DbError {
    DbError::Sqlite(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(1),
        Some(message.to_string()),
    ))
}

fn rentals() -> Arc<Schema> {
    Arc::new(Schema::new(
        "rentals",
        vec![],
        vec![
            Procedure::new("rent_film", OperationKind::Call)
                .with_parameter(Parameter::new("customer_id", "integer"))
                .with_parameter(Parameter::new("film_id", "integer")),
            Procedure::new("film_in_stock", OperationKind::Select)
                .with_parameter(Parameter::new("film_id", "integer"))
                .with_parameter(Parameter::new("store_id", "integer")),
        ],
    ))
}

fn args(pairs: &[(&str, i64)]) -> IndexMap<String, Value> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), Value::Int(*value)))
        .collect()
}

#[test]
fn test_select_procedure_returns_rows() {
    let mut row = Row::new();
    row.insert("inventory_id".into(), Value::Int(81));
    let conn = ScriptedConnection::postgres(vec![Ok(vec![row.clone()])]);
    let mut session = Session::new(conn, rentals()).unwrap();

    let outcome = session
        .call_procedure(
            "FILM_IN_STOCK",
            OperationKind::Select,
            &args(&[("store_id", 2), ("film_id", 5)]),
        )
        .unwrap();
    assert!(outcome.is_ok());
    assert_eq!(outcome.rows, Some(vec![row]));

    let (sql, params) = &session.connection().unwrap().statements[0];
    assert!(sql.starts_with("SELECT"));
    assert!(sql.contains("film_in_stock"));
    assert!(sql.contains("($1, $2)"));
    assert_eq!(params, &vec![Value::Int(5), Value::Int(2)]);
}

#[test]
fn test_call_procedure_has_no_rows() {
    let conn = ScriptedConnection::postgres(vec![]);
    let mut session = Session::new(conn, rentals()).unwrap();

    let outcome = session
        .call_procedure(
            "rent_film",
            OperationKind::Call,
            &args(&[("film_id", 5), ("customer_id", 9)]),
        )
        .unwrap();
    assert_eq!(outcome.rows, None);
    assert_eq!(outcome.error, None);

    let (sql, params) = &session.connection().unwrap().statements[0];
    assert!(sql.starts_with("CALL"));
    assert!(sql.contains("rent_film"));
    assert_eq!(params, &vec![Value::Int(9), Value::Int(5)]);
}

#[test]
fn test_server_errors_become_values() {
    let conn = ScriptedConnection::postgres(vec![Err(server_error(
        "film 5 is not in stock\nCONTEXT: PL/pgSQL function rent_film line 4",
    ))]);
    let mut session = Session::new(conn, rentals()).unwrap();

    let outcome = session
        .call_procedure(
            "rent_film",
            OperationKind::Call,
            &args(&[("customer_id", 9), ("film_id", 5)]),
        )
        .unwrap();
    assert!(!outcome.is_ok());
    assert_eq!(outcome.error.as_deref(), Some("film 5 is not in stock"));
}

#[test]
fn test_client_errors_propagate() {
    let conn = ScriptedConnection::postgres(vec![Err(DbError::Closed)]);
    let mut session = Session::new(conn, rentals()).unwrap();

    let err = session
        .call_procedure(
            "rent_film",
            OperationKind::Call,
            &args(&[("customer_id", 9), ("film_id", 5)]),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Database(DbError::Closed)));
}

#[test]
fn test_unknown_signature() {
    let conn = ScriptedConnection::postgres(vec![]);
    let mut session = Session::new(conn, rentals()).unwrap();

    let err = session
        .call_procedure("rent_film", OperationKind::Call, &args(&[("film_id", 5)]))
        .unwrap_err();
    assert!(matches!(err, Error::UnknownProcedure { .. }));
    assert!(session.connection().unwrap().statements.is_empty());
}

#[test]
fn test_closed_connection() {
    let conn = ScriptedConnection::postgres(vec![]);
    let mut session = Session::new(conn, rentals()).unwrap();
    session.close().unwrap();

    let err = session
        .call_procedure("rent_film", OperationKind::Call, &args(&[]))
        .unwrap_err();
    assert!(matches!(err, Error::NotConnected));
}

#[test]
fn test_sqlite_has_no_procedures() {
    let conn = SqliteConnection::open_in_memory().unwrap();
    let mut session = Session::new(conn, rentals()).unwrap();

    let err = session
        .call_procedure(
            "rent_film",
            OperationKind::Call,
            &args(&[("customer_id", 9), ("film_id", 5)]),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Database(DbError::Unsupported(_))));
}
