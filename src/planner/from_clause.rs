//! FROM clause construction.
//!
//! The first alias is the FROM table. Each following alias is LEFT JOINed on
//! a foreign key shared with an alias already in the clause:
//!
//! - a mapping table hangs off a joined alias of the same branch through one
//!   of its primary-key columns;
//! - any other table is tried as the referenced side of a joined alias's
//!   foreign key, then as a dimension of a joined mapping table, then as the
//!   holder of a foreign key into a joined alias.
//!
//! Aliases with no anchor are left out and reported in [`FromClause::dropped`].

use super::JoinPlanner;
use crate::alias::Alias;
use crate::error::{Error, Result};
use crate::schema::Table;
use crate::sql::{table_col, Expr, ExprExt, Join, JoinType, TableRef};

#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub table: TableRef,
    pub joins: Vec<Join>,
    /// Aliases present in the clause, FROM table first.
    pub joined: Vec<Alias>,
    pub dropped: Vec<Alias>,
}

fn table_ref(alias: &Alias) -> TableRef {
    TableRef::new(alias.base_table()).with_alias(&alias.to_string())
}

fn column(alias: &Alias, column: &str) -> Expr {
    table_col(&alias.to_string(), column)
}

impl<'a> JoinPlanner<'a> {
    pub fn build_from(&self, ordered: &[Alias]) -> Result<FromClause> {
        let (first, rest) = ordered
            .split_first()
            .ok_or_else(|| Error::InvalidOperation("no tables to select from".into()))?;
        self.schema.table(first.base_table())?;

        let mut clause = FromClause {
            table: table_ref(first),
            joins: vec![],
            joined: vec![first.clone()],
            dropped: vec![],
        };

        for alias in rest {
            if clause.joined.contains(alias) {
                continue;
            }
            let table = self.schema.table(alias.base_table())?;
            let on = if self.schema.is_mapping_table(&table.name) {
                self.anchor_mapping(alias, table, &clause.joined)
            } else {
                self.anchor_dimension(alias, table, &clause.joined)
            };

            match on {
                Some(on) => {
                    clause.joins.push(Join {
                        join_type: JoinType::Left,
                        table: table_ref(alias),
                        on,
                    });
                    clause.joined.push(alias.clone());
                }
                None => {
                    tracing::warn!(%alias, "dropping alias with no join anchor");
                    clause.dropped.push(alias.clone());
                }
            }
        }

        Ok(clause)
    }

    /// `mapping.pk = joined.col` for a joined alias on the same branch.
    fn anchor_mapping(&self, alias: &Alias, table: &Table, joined: &[Alias]) -> Option<Expr> {
        joined
            .iter()
            .filter(|prev| prev.prefix() == alias.prefix())
            .find_map(|prev| {
                table.primary_key.iter().find_map(|pk| {
                    let reference = table.column(pk)?.references.as_ref()?;
                    (reference.table == prev.base_table())
                        .then(|| column(alias, pk).eq(column(prev, &reference.column)))
                })
            })
    }

    fn anchor_dimension(&self, alias: &Alias, table: &Table, joined: &[Alias]) -> Option<Expr> {
        self.referenced_by(alias, joined)
            .or_else(|| self.mapped_by(alias, joined))
            .or_else(|| holds_reference(alias, table, joined))
    }

    /// `joined.fk = dim.col`: a joined alias holds a foreign key into `alias`.
    /// A prefixed alias only accepts the foreign key its prefix names, or one
    /// held by an alias on its own branch.
    fn referenced_by(&self, alias: &Alias, joined: &[Alias]) -> Option<Expr> {
        joined.iter().find_map(|prev| {
            let prev_table = self.schema.find_table(prev.base_table())?;
            prev_table.foreign_keys().find_map(|(fk, reference)| {
                if reference.table != alias.base_table() {
                    return None;
                }
                let on_branch = match alias.prefix() {
                    None => true,
                    Some(hop) => {
                        (hop.table == prev.base_table() && hop.column == fk.name)
                            || prev.prefix() == Some(hop)
                    }
                };
                on_branch.then(|| column(prev, &fk.name).eq(column(alias, &reference.column)))
            })
        })
    }

    /// `dim.col = mapping.pk`: a joined mapping table on the same branch has a
    /// primary-key column referencing `alias`.
    fn mapped_by(&self, alias: &Alias, joined: &[Alias]) -> Option<Expr> {
        joined
            .iter()
            .filter(|prev| {
                prev.prefix() == alias.prefix() && self.schema.is_mapping_table(prev.base_table())
            })
            .find_map(|prev| {
                let mapping = self.schema.find_table(prev.base_table())?;
                mapping.primary_key.iter().find_map(|pk| {
                    let reference = mapping.column(pk)?.references.as_ref()?;
                    (reference.table == alias.base_table())
                        .then(|| column(alias, &reference.column).eq(column(prev, pk)))
                })
            })
    }
}

/// `dim.fk = joined.col`: `alias` holds a foreign key into a joined alias on
/// the same branch.
fn holds_reference(alias: &Alias, table: &Table, joined: &[Alias]) -> Option<Expr> {
    table.foreign_keys().find_map(|(fk, reference)| {
        joined
            .iter()
            .find(|prev| prev.base_table() == reference.table && prev.prefix() == alias.prefix())
            .map(|prev| column(alias, &fk.name).eq(column(prev, &reference.column)))
    })
}
