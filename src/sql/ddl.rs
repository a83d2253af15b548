//! Scratch-table and routine statements.
//!
//! catdb only ever creates tables from a query (`CREATE TABLE .. AS SELECT`),
//! drops them again, refreshes their statistics, and invokes procedures.

use super::dialect::{Dialect, SqlDialect};
use super::expr::Expr;
use super::query::Query;
use super::token::{Token, TokenStream};

// ============================================================================
// CREATE TABLE AS
// ============================================================================

/// CREATE [UNLOGGED] TABLE name AS query.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct CreateTableAs {
    pub name: String,
    pub unlogged: bool,
    pub query: Query,
}

impl CreateTableAs {
    pub fn new(name: impl Into<String>, query: Query) -> Self {
        Self {
            name: name.into(),
            unlogged: false,
            query,
        }
    }

    /// Request an unlogged table; ignored by dialects without them.
    pub fn unlogged(mut self) -> Self {
        self.unlogged = true;
        self
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Create).space();
        if self.unlogged && dialect.supports_unlogged_tables() {
            ts.push(Token::Unlogged).space();
        }
        ts.push(Token::Table)
            .space()
            .push(Token::Ident(self.name.clone()))
            .space()
            .push(Token::As)
            .newline();
        ts.append(&self.query.to_tokens_for_dialect(dialect));
        ts
    }
}

// ============================================================================
// DROP TABLE
// ============================================================================

/// DROP TABLE statement.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct DropTable {
    pub if_exists: bool,
    pub name: String,
}

impl DropTable {
    /// Create a new DROP TABLE statement.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            if_exists: false,
            name: name.into(),
        }
    }

    /// Add IF EXISTS clause.
    pub fn if_exists(mut self) -> Self {
        self.if_exists = true;
        self
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens().serialize(dialect)
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Drop).space().push(Token::Table);
        if self.if_exists {
            ts.space().push(Token::If).space().push(Token::Exists);
        }
        ts.space().push(Token::Ident(self.name.clone()));
        ts
    }
}

// ============================================================================
// ANALYZE
// ============================================================================

/// ANALYZE name
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct Analyze {
    pub name: String,
}

impl Analyze {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut ts = TokenStream::new();
        ts.push(Token::Analyze)
            .space()
            .push(Token::Ident(self.name.clone()));
        ts.serialize(dialect)
    }
}

// ============================================================================
// CALL
// ============================================================================

/// CALL procedure(args)
#[derive(Debug, Clone)]
#[must_use = "statements have no effect until converted to SQL with to_sql()"]
pub struct Call {
    pub procedure: String,
    pub args: Vec<Expr>,
}

impl Call {
    pub fn new(procedure: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            procedure: procedure.into(),
            args,
        }
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut ts = TokenStream::new();
        ts.push(Token::Call)
            .space()
            .push(Token::Ident(self.procedure.clone()))
            .lparen();
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.append(&arg.to_tokens_for_dialect(dialect));
        }
        ts.rparen();
        ts.serialize(dialect)
    }
}
