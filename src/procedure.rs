//! Stored procedure invocation.
//!
//! A call site names a procedure and passes arguments by name. The procedure
//! is resolved case-insensitively on its name and on the set of argument
//! names; arguments are then bound in declaration order.
//!
//! Failures raised by the database while the procedure runs are returned as
//! values so the caller can show them to an end user. The statement runs in
//! its own transaction, which is rolled back on failure.

use indexmap::IndexMap;
use serde::Serialize;

use crate::db::{Connection, DbError, Row, Value};
use crate::error::{Error, Result};
use crate::schema::{OperationKind, Procedure, Schema};
use crate::sql::{placeholder, Call, Expr, Query, SqlDialect, TableRef};

/// Result of running a procedure.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcedureOutcome {
    /// Result rows of a select-kind procedure.
    pub rows: Option<Vec<Row>>,
    /// First line of the database error, if the procedure failed.
    pub error: Option<String>,
}

impl ProcedureOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

pub struct ProcedureInvoker<'a> {
    schema: &'a Schema,
}

impl<'a> ProcedureInvoker<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// The single procedure matching `name` and exactly the given argument
    /// names, in any order.
    pub fn resolve<S: AsRef<str>>(&self, name: &str, arg_names: &[S]) -> Result<&'a Procedure> {
        let wanted: Vec<String> = arg_names.iter().map(|a| a.as_ref().to_lowercase()).collect();
        let matches: Vec<&Procedure> = self
            .schema
            .procedures
            .iter()
            .filter(|p| p.name.eq_ignore_ascii_case(name))
            .filter(|p| p.parameters.len() == wanted.len())
            .filter(|p| {
                wanted
                    .iter()
                    .all(|arg| p.parameter_names().any(|n| n.to_lowercase() == *arg))
            })
            .collect();

        match matches.as_slice() {
            [procedure] => Ok(*procedure),
            [] => Err(Error::UnknownProcedure {
                name: name.to_string(),
                args: arg_names.iter().map(|a| a.as_ref().to_string()).collect(),
            }),
            many => Err(Error::AmbiguousProcedure {
                name: name.to_string(),
                matches: many.iter().map(|p| signature(p)).collect(),
            }),
        }
    }

    pub fn invoke<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        name: &str,
        operation: OperationKind,
        args: &IndexMap<String, Value>,
    ) -> Result<ProcedureOutcome> {
        if !conn.is_open() {
            return Err(Error::NotConnected);
        }
        let dialect = conn.dialect();
        if !dialect.supports_procedures() {
            return Err(DbError::Unsupported(format!(
                "stored procedures on {}",
                dialect.name()
            ))
            .into());
        }

        let arg_names: Vec<&str> = args.keys().map(String::as_str).collect();
        let procedure = self.resolve(name, arg_names.as_slice())?;
        let values = bind_arguments(procedure, args);
        let placeholders: Vec<Expr> = (1..=values.len()).map(placeholder).collect();

        let sql = match operation {
            OperationKind::Select => Query::new()
                .select_star()
                .from(TableRef::function(&procedure.name, placeholders))
                .to_sql(dialect),
            OperationKind::Call => Call::new(&procedure.name, placeholders).to_sql(dialect),
        };

        match conn.query_in_transaction(&sql, &values) {
            Ok(rows) => Ok(ProcedureOutcome {
                rows: (operation == OperationKind::Select).then_some(rows),
                error: None,
            }),
            Err(e) => match e.server_message() {
                Some(message) => {
                    let first_line = message.lines().next().unwrap_or_default().to_string();
                    tracing::warn!(procedure = %procedure.name, error = %first_line, "procedure rolled back");
                    Ok(ProcedureOutcome {
                        rows: None,
                        error: Some(first_line),
                    })
                }
                None => Err(e.into()),
            },
        }
    }
}

/// Argument values in the procedure's parameter order. Argument names match
/// parameter names case-insensitively.
fn bind_arguments(procedure: &Procedure, args: &IndexMap<String, Value>) -> Vec<Value> {
    procedure
        .parameter_names()
        .map(|param| {
            args.iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(param))
                .map(|(_, value)| value.clone())
                .unwrap_or_default()
        })
        .collect()
}

fn signature(procedure: &Procedure) -> String {
    format!(
        "{}({})",
        procedure.name,
        procedure.parameter_names().collect::<Vec<_>>().join(", ")
    )
}
