//! Join candidate discovery.

use std::collections::{BTreeSet, HashSet};

use super::DependencyGraph;
use crate::alias::Alias;

impl DependencyGraph {
    /// Tables that can be joined next to the given set.
    ///
    /// Mapping tables are never returned; the tables on their far side are
    /// returned instead. When a table references the same neighbor through
    /// several foreign-key columns, one prefixed alias is produced per column.
    /// Inputs and duplicates are excluded.
    pub fn join_candidates(
        &self,
        tables: &[Alias],
        mapping_tables: &BTreeSet<String>,
        directed: bool,
    ) -> Vec<Alias> {
        let mut expanded = HashSet::new();
        self.collect_candidates(tables, mapping_tables, directed, &mut expanded)
    }

    fn collect_candidates(
        &self,
        tables: &[Alias],
        mapping_tables: &BTreeSet<String>,
        directed: bool,
        expanded: &mut HashSet<String>,
    ) -> Vec<Alias> {
        let mut candidates: Vec<Alias> = vec![];

        for table in tables {
            let base = table.base_table();
            let edges = self.edges_of(base);

            for edge in &edges {
                let Some(neighbor) = edge.neighbor(base, directed) else {
                    continue;
                };

                let found = if mapping_tables.contains(neighbor) {
                    if !expanded.insert(neighbor.to_string()) {
                        continue;
                    }
                    // Mapping tables are crossed in both directions.
                    self.collect_candidates(
                        &[Alias::table(neighbor)],
                        mapping_tables,
                        false,
                        expanded,
                    )
                } else if edge.from_table() == base
                    && edges.iter().any(|other| {
                        other.from_table() == base
                            && other.to_table() == neighbor
                            && other.from_column != edge.from_column
                    })
                {
                    vec![Alias::via(base, &edge.from_column, neighbor)]
                } else {
                    vec![inherit_prefix(table, neighbor)]
                };

                for candidate in found {
                    if !tables.contains(&candidate) && !candidates.contains(&candidate) {
                        candidates.push(candidate);
                    }
                }
            }
        }

        candidates
    }
}

/// A neighbor of a prefixed alias stays on the same branch of the join tree,
/// unless it is the table the branch starts from.
fn inherit_prefix(from: &Alias, neighbor: &str) -> Alias {
    match from.prefix() {
        Some(hop) if hop.table != neighbor => Alias::table(neighbor).with_prefix(Some(hop)),
        _ => Alias::table(neighbor),
    }
}
