//! SQL generation module.
//!
//! This module provides a type-safe SQL builder that renders to PostgreSQL
//! and SQLite. It includes:
//!
//! - [`query`] - SELECT query builder
//! - [`expr`] - Expression AST and builder DSL
//! - [`ddl`] - scratch tables (CREATE TABLE AS, DROP, ANALYZE) and CALL
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations
//!
//! Values never appear inline: every user-supplied value is bound through a
//! placeholder and every identifier is quoted.

pub mod ddl;
pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

// Re-export commonly used types at the sql module level
pub use ddl::{Analyze, Call, CreateTableAs, DropTable};
pub use dialect::{Dialect, SqlDialect};
pub use expr::{
    col, count_star, func, lit_bool, lit_int, lit_str, placeholder, raw_sql, star,
    table_col, BinaryOperator, Expr, ExprExt, Literal,
};
pub use query::{Join, JoinType, OrderByExpr, Query, SelectExpr, SortDir, TableRef};
pub use token::{Token, TokenStream};
