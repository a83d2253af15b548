//! SELECT list construction. Every output column is named by its slot key
//! (`alias__column`, see [`Alias::slot_column`]) so rows from different
//! aliases of one table never clash.

use indexmap::IndexMap;

use super::JoinPlanner;
use crate::alias::Alias;
use crate::error::{Error, Result};
use crate::sql::{table_col, Expr, ExprExt, SelectExpr};

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SelectSpec {
    /// Every column of the target, then every column of each joined alias.
    #[default]
    All,
    /// One row per distinct value of a target column, that column first.
    DistinctOn(String),
    /// Exactly these columns; aliases left out of the FROM clause are skipped.
    Columns(IndexMap<Alias, Vec<String>>),
}

impl<'a> JoinPlanner<'a> {
    pub fn build_select(
        &self,
        target: &Alias,
        joined: &[Alias],
        spec: &SelectSpec,
    ) -> Result<(Vec<SelectExpr>, Vec<Expr>)> {
        match spec {
            SelectSpec::All => Ok((self.all_columns(target, joined, None)?, vec![])),
            SelectSpec::DistinctOn(column) => {
                self.schema.column(target.base_table(), column)?;
                let mut select = vec![slot_expr(target, column)];
                select.extend(self.all_columns(target, joined, Some(column))?);
                Ok((select, vec![table_col(&target.to_string(), column)]))
            }
            SelectSpec::Columns(columns) => {
                let mut select = vec![];
                for (alias, names) in columns {
                    if !joined.contains(alias) {
                        tracing::debug!(%alias, "skipping columns of alias outside the join");
                        continue;
                    }
                    for name in names {
                        self.schema.column(alias.base_table(), name)?;
                        select.push(slot_expr(alias, name));
                    }
                }
                if select.is_empty() {
                    return Err(Error::InvalidOperation("no columns to select".into()));
                }
                Ok((select, vec![]))
            }
        }
    }

    fn all_columns(
        &self,
        target: &Alias,
        joined: &[Alias],
        skip: Option<&str>,
    ) -> Result<Vec<SelectExpr>> {
        let mut select = vec![];
        let target_table = self.schema.table(target.base_table())?;
        for name in target_table.column_names() {
            if Some(name) != skip {
                select.push(slot_expr(target, name));
            }
        }
        for alias in joined.iter().filter(|a| *a != target) {
            for name in self.schema.table(alias.base_table())?.column_names() {
                select.push(slot_expr(alias, name));
            }
        }
        Ok(select)
    }
}

fn slot_expr(alias: &Alias, column: &str) -> SelectExpr {
    table_col(&alias.to_string(), column).alias(&alias.slot_column(column))
}
