//! # catdb
//!
//! Schema-driven join planning and informativity scoring for conversational
//! database agents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │            Schema (tables, keys, procedures)             │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [graph]
//! ┌─────────────────────────────────────────────────────────┐
//! │     DependencyGraph (foreign keys, aliased hops)         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Join order → FROM / SELECT / WHERE → QueryPlan         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [sql]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Parameterized SQL (PostgreSQL, SQLite)            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [informativity]
//! ┌─────────────────────────────────────────────────────────┐
//! │     Entropy per column → next slot / next join table     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! [`Session`] ties the pieces to one database connection.

pub mod alias;
pub mod cache;
pub mod config;
pub mod constraint;
pub mod db;
pub mod error;
pub mod graph;
pub mod informativity;
pub mod planner;
pub mod procedure;
pub mod schema;
pub mod session;
pub mod sql;

pub use error::{Error, Result};
pub use session::Session;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::alias::{Alias, ForeignKeyHop, Slot};
    pub use crate::constraint::{Constraint, Constraints, Operator, DONT_CARE};
    pub use crate::db::{Connection, PostgresConnection, Row, SqliteConnection, Value};
    pub use crate::error::{Error, Result};
    pub use crate::graph::DependencyGraph;
    pub use crate::informativity::{InformativityCache, Requestable};
    pub use crate::planner::{JoinPlanner, Order, QueryPlan, SelectRequest, SelectSpec};
    pub use crate::procedure::ProcedureOutcome;
    pub use crate::schema::{Column, OperationKind, Procedure, Schema, Table};
    pub use crate::session::Session;
    pub use crate::sql::{Dialect, SqlDialect};
}
