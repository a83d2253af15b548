//! Table aliases and slot keys.
//!
//! When the same table is reachable through more than one foreign key, each
//! occurrence is joined under an alias that records the hop it came through:
//!
//! ```text
//! orders__billing_id___customers
//! ^^^^^^  ^^^^^^^^^^   ^^^^^^^^^
//! fk table fk column   base table
//! ```
//!
//! The string form is what appears in SQL (`AS "orders__billing_id___customers"`)
//! and in projected column names. Everything inside the crate works with the
//! structured [`Alias`].
//!
//! A *slot key* names one column of one alias: `alias__column`. Projected
//! and scratch-table columns use the key as their name, shortened with a
//! digest when it is longer than PostgreSQL keeps.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sql::dialect::helpers::fit_identifier;

/// Separates the foreign-key prefix from the base table.
pub const FK_SEPARATOR: &str = "___";

/// Separates table from column in a prefix or a slot key.
pub const SLOT_SEPARATOR: &str = "__";

/// The foreign-key column an aliased table was reached through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForeignKeyHop {
    pub table: String,
    pub column: String,
}

impl ForeignKeyHop {
    pub fn new(table: &str, column: &str) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Alias {
    table: String,
    via: Option<ForeignKeyHop>,
}

impl Alias {
    /// Alias for a table joined under its own name.
    pub fn table(name: &str) -> Self {
        Self {
            table: name.into(),
            via: None,
        }
    }

    /// Alias for `table` reached through `fk_table.fk_column`.
    pub fn via(fk_table: &str, fk_column: &str, table: &str) -> Self {
        Self {
            table: table.into(),
            via: Some(ForeignKeyHop::new(fk_table, fk_column)),
        }
    }

    /// Build an alias from optional prefix parts. The prefix is only recorded
    /// when both the table and column are present.
    pub fn encode(fk_table: Option<&str>, fk_column: Option<&str>, table: &str) -> Self {
        match (fk_table, fk_column) {
            (Some(t), Some(c)) => Self::via(t, c, table),
            _ => Self::table(table),
        }
    }

    /// Parse the string form. Total: strings without a prefix decode to a
    /// bare table alias.
    pub fn parse(alias: &str) -> Self {
        match alias.rsplit_once(FK_SEPARATOR) {
            Some((prefix, table)) => match prefix.split_once(SLOT_SEPARATOR) {
                Some((fk_table, fk_column)) => Self::via(fk_table, fk_column, table),
                None => Self::table(table),
            },
            None => Self::table(alias),
        }
    }

    pub fn base_table(&self) -> &str {
        &self.table
    }

    pub fn prefix(&self) -> Option<&ForeignKeyHop> {
        self.via.as_ref()
    }

    pub fn is_prefixed(&self) -> bool {
        self.via.is_some()
    }

    /// Same base table, prefix replaced.
    pub fn with_prefix(&self, via: Option<&ForeignKeyHop>) -> Self {
        Self {
            table: self.table.clone(),
            via: via.cloned(),
        }
    }

    /// Slot key for one of this alias's columns.
    pub fn slot(&self, column: &str) -> String {
        slot_key(&self.to_string(), column)
    }

    /// Result column holding one of this alias's columns.
    pub fn slot_column(&self, column: &str) -> String {
        fit_identifier(&self.slot(column)).into_owned()
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.via {
            Some(hop) => write!(
                f,
                "{}{SLOT_SEPARATOR}{}{FK_SEPARATOR}{}",
                hop.table, hop.column, self.table
            ),
            None => f.write_str(&self.table),
        }
    }
}

impl From<&str> for Alias {
    fn from(s: &str) -> Self {
        Alias::parse(s)
    }
}

impl From<String> for Alias {
    fn from(s: String) -> Self {
        Alias::parse(&s)
    }
}

impl From<Alias> for String {
    fn from(alias: Alias) -> Self {
        alias.to_string()
    }
}

/// `table__column`
pub fn slot_key(table: &str, column: &str) -> String {
    format!("{table}{SLOT_SEPARATOR}{column}")
}

/// Base table of an alias string.
pub fn decode_base_table(alias: &str) -> &str {
    match alias.rsplit_once(FK_SEPARATOR) {
        Some((_, table)) => table,
        None => alias,
    }
}

/// `(fk_table, fk_column)` of an alias string, if it carries a prefix.
pub fn decode_fk_prefix(alias: &str) -> Option<(&str, &str)> {
    alias
        .rsplit_once(FK_SEPARATOR)
        .and_then(|(prefix, _)| prefix.split_once(SLOT_SEPARATOR))
}

/// A column of an alias, as named by a slot key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub alias: Alias,
    pub column: String,
}

impl Slot {
    pub fn new(alias: Alias, column: &str) -> Self {
        Self {
            alias,
            column: column.into(),
        }
    }

    /// Parse `[fk_table__fk_column___]table__column`.
    pub fn parse(key: &str) -> Option<Self> {
        let (prefix, rest) = match key.rsplit_once(FK_SEPARATOR) {
            Some((prefix, rest)) => (Some(prefix), rest),
            None => (None, key),
        };
        let (table, column) = rest.split_once(SLOT_SEPARATOR)?;
        let alias = match prefix.and_then(|p| p.split_once(SLOT_SEPARATOR)) {
            Some((fk_table, fk_column)) => Alias::via(fk_table, fk_column, table),
            None => Alias::table(table),
        };
        Some(Self::new(alias, column))
    }

    pub fn key(&self) -> String {
        self.alias.slot(&self.column)
    }

    pub fn column_name(&self) -> String {
        self.alias.slot_column(&self.column)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SLOT_SEPARATOR}{}", self.alias, self.column)
    }
}
