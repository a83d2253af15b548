//! Schema model: tables, columns, foreign keys and stored procedures.
//!
//! A [`Schema`] is loaded once (usually from JSON produced by an introspection
//! step) and shared read-only between sessions. Mapping tables, whose primary
//! key consists only of foreign-key columns, are detected on construction.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Target of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub table: String,
    pub column: String,
}

impl Reference {
    pub fn new(table: &str, column: &str) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Reference>,
}

fn default_nullable() -> bool {
    true
}

impl Column {
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            references: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn references(mut self, table: &str, column: &str) -> Self {
        self.references = Some(Reference::new(table, column));
        self
    }

    pub fn is_foreign_key(&self) -> bool {
        self.references.is_some()
    }

    pub fn kind(&self) -> ValueKind {
        ValueKind::from_type_name(&self.data_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(default)]
    pub primary_key: Vec<String>,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            primary_key: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Columns that carry a foreign key, in declaration order.
    pub fn foreign_keys(&self) -> impl Iterator<Item = (&Column, &Reference)> {
        self.columns
            .iter()
            .filter_map(|c| c.references.as_ref().map(|r| (c, r)))
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key.iter().any(|pk| pk == column)
    }

    /// A mapping (junction) table has a composite primary key made only of
    /// foreign-key columns.
    pub fn is_mapping_table(&self) -> bool {
        self.primary_key.len() >= 2
            && self
                .primary_key
                .iter()
                .all(|pk| self.column(pk).is_some_and(Column::is_foreign_key))
    }
}

/// How a stored procedure is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Set-returning function, invoked with `SELECT * FROM name(..)`.
    Select,
    /// Procedure with side effects, invoked with `CALL name(..)`.
    Call,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Select => "select",
            OperationKind::Call => "call",
        }
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "select" => Ok(OperationKind::Select),
            "call" => Ok(OperationKind::Call),
            other => Err(Error::InvalidOperation(other.to_string())),
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub is_list: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Reference>,
}

impl Parameter {
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_list: false,
            references: None,
        }
    }
}

/// One field of a procedure's result record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnValue {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub is_list: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Reference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRecord {
    pub name: String,
    #[serde(default)]
    pub is_list: bool,
    #[serde(default)]
    pub values: Vec<ReturnValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    pub operation: OperationKind,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<ReturnRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl Procedure {
    pub fn new(name: &str, operation: OperationKind) -> Self {
        Self {
            name: name.into(),
            operation,
            parameters: Vec::new(),
            returns: None,
            body: None,
        }
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|p| p.name.as_str())
    }
}

/// Serialized form of a schema; mapping tables are derived, not stored.
#[derive(Deserialize)]
struct SchemaDef {
    name: String,
    #[serde(default)]
    tables: Vec<Table>,
    #[serde(default)]
    procedures: Vec<Procedure>,
}

impl From<SchemaDef> for Schema {
    fn from(def: SchemaDef) -> Self {
        Schema::new(&def.name, def.tables, def.procedures)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SchemaDef")]
pub struct Schema {
    pub name: String,
    pub tables: Vec<Table>,
    pub procedures: Vec<Procedure>,
    #[serde(skip)]
    mapping_tables: BTreeSet<String>,
}

impl Schema {
    pub fn new(name: &str, tables: Vec<Table>, procedures: Vec<Procedure>) -> Self {
        let mapping_tables = tables
            .iter()
            .filter(|t| t.is_mapping_table())
            .map(|t| t.name.clone())
            .collect();
        Self {
            name: name.into(),
            tables,
            procedures,
            mapping_tables,
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn find_table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.find_table(name)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    pub fn column(&self, table: &str, column: &str) -> Result<&Column> {
        self.table(table)?
            .column(column)
            .ok_or_else(|| Error::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
            })
    }

    pub fn mapping_tables(&self) -> &BTreeSet<String> {
        &self.mapping_tables
    }

    pub fn is_mapping_table(&self, name: &str) -> bool {
        self.mapping_tables.contains(name)
    }

    /// Coarse value category of a column, used to decide how constraint
    /// values are parsed and compared.
    pub fn column_type(&self, table: &str, column: &str) -> Result<ValueKind> {
        Ok(self.column(table, column)?.kind())
    }
}

/// Coarse value category derived from a column's SQL type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Integer,
    Float,
    Bool,
    Date,
    Time,
    DateTime,
}

impl ValueKind {
    pub fn from_type_name(type_name: &str) -> Self {
        let lowered = type_name.trim().to_lowercase();
        // Strip modifiers such as varchar(255) or numeric(10, 2).
        let base = lowered.split('(').next().unwrap_or_default().trim();
        match base {
            "smallint" | "integer" | "int" | "bigint" | "int2" | "int4" | "int8" | "serial"
            | "bigserial" | "smallserial" => ValueKind::Integer,
            "real" | "float" | "float4" | "float8" | "double precision" | "numeric" | "decimal"
            | "money" => ValueKind::Float,
            "boolean" | "bool" => ValueKind::Bool,
            "date" => ValueKind::Date,
            "time" | "timetz" | "time without time zone" | "time with time zone" => ValueKind::Time,
            "timestamp"
            | "timestamptz"
            | "timestamp without time zone"
            | "timestamp with time zone"
            | "datetime" => ValueKind::DateTime,
            _ => ValueKind::String,
        }
    }
}
