//! Informativity - how much asking about a column narrows the result set.
//!
//! - [`entropy`] computes normalized entropy of column value distributions
//! - [`InformativityCache`] holds the baseline entropy of every base-table
//!   column over the unconstrained table
//! - [`SlotSelector`] picks the next column to ask about, or the next table
//!   to join

pub mod entropy;
mod selector;

pub use entropy::{column_entropies, column_entropy, normalized_entropy};
pub use selector::{SlotContext, SlotSelector};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::alias::Alias;
use crate::db::{Connection, DbResult};
use crate::schema::Schema;

/// Baseline entropy per `table → column`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InformativityCache(IndexMap<String, IndexMap<String, f64>>);

impl InformativityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Profile every table of the schema. Primary-key columns are skipped
    /// unless `include_primary_keys` is set.
    pub fn build<C: Connection + ?Sized>(
        conn: &mut C,
        schema: &Schema,
        include_primary_keys: bool,
    ) -> DbResult<Self> {
        let mut cache = Self::new();
        for table in &schema.tables {
            let columns: Vec<&str> = table
                .column_names()
                .filter(|c| include_primary_keys || !table.is_primary_key(c))
                .collect();
            tracing::debug!(table = %table.name, columns = columns.len(), "profiling table");
            let entropies = column_entropies(conn, &table.name, &columns)?;
            cache.0.insert(table.name.clone(), entropies);
        }
        tracing::info!(tables = cache.0.len(), "built informativity cache");
        Ok(cache)
    }

    pub fn insert(&mut self, table: &str, column: &str, entropy: f64) {
        self.0
            .entry(table.to_string())
            .or_default()
            .insert(column.to_string(), entropy);
    }

    pub fn get(&self, table: &str, column: &str) -> Option<f64> {
        self.0.get(table)?.get(column).copied()
    }

    pub fn table(&self, table: &str) -> Option<&IndexMap<String, f64>> {
        self.0.get(table)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// The columns the caller is willing to ask about, per alias.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Requestable(IndexMap<Alias, Vec<String>>);

impl Requestable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every column of each alias's table except primary and foreign keys.
    pub fn from_schema<'a>(schema: &Schema, aliases: impl IntoIterator<Item = &'a Alias>) -> Self {
        let mut requestable = Self::new();
        for alias in aliases {
            let Some(table) = schema.find_table(alias.base_table()) else {
                continue;
            };
            let columns = table
                .columns
                .iter()
                .filter(|c| !c.is_foreign_key() && !table.is_primary_key(&c.name))
                .map(|c| c.name.clone())
                .collect();
            requestable.0.insert(alias.clone(), columns);
        }
        requestable
    }

    pub fn with(mut self, alias: Alias, columns: &[&str]) -> Self {
        self.insert(alias, columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn insert(&mut self, alias: Alias, columns: Vec<String>) {
        self.0.insert(alias, columns);
    }

    /// Requestable columns of an alias; none when the alias is unknown.
    pub fn columns(&self, alias: &Alias) -> &[String] {
        self.0.get(alias).map(Vec::as_slice).unwrap_or(&[])
    }
}
