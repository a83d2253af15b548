//! DependencyGraph - foreign-key graph over the tables of a schema.
//!
//! Vertices are table aliases, edges are foreign keys. The graph is built
//! undirected by default so paths can be walked from a referenced table back
//! to the tables referencing it.
//!
//! The module is organized into submodules:
//! - `path`: simple-path enumeration and best-path selection
//! - `candidates`: join candidate discovery with mapping-table transparency

mod candidates;
mod path;


use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;

use crate::alias::Alias;
use crate::schema::Schema;

/// Default bound on the number of tables in an enumerated path.
pub const DEFAULT_MAX_PATH_LENGTH: usize = 6;

/// A node in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DependencyVertex {
    pub table: String,
    pub alias: Alias,
}

impl DependencyVertex {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.into(),
            alias: Alias::table(table),
        }
    }

    pub fn aliased(alias: Alias) -> Self {
        Self {
            table: alias.base_table().to_string(),
            alias,
        }
    }
}

/// A foreign key `from.from_column -> to.to_column`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DependencyEdge {
    pub from: Alias,
    pub from_column: String,
    pub to: Alias,
    pub to_column: String,
}

impl DependencyEdge {
    pub fn new(from_table: &str, from_column: &str, to_table: &str, to_column: &str) -> Self {
        Self {
            from: Alias::table(from_table),
            from_column: from_column.into(),
            to: Alias::table(to_table),
            to_column: to_column.into(),
        }
    }

    pub fn from_table(&self) -> &str {
        self.from.base_table()
    }

    pub fn to_table(&self) -> &str {
        self.to.base_table()
    }

    /// The table on the other side of this edge as seen from `table`.
    ///
    /// Directed traversal only follows the edge from its referencing side.
    pub fn neighbor(&self, table: &str, directed: bool) -> Option<&str> {
        if self.to_table() != table {
            Some(self.to_table())
        } else if !directed && self.from_table() != table {
            Some(self.from_table())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<DependencyVertex, DependencyEdge>,
    node_indices: HashMap<Alias, NodeIndex>,
    /// Neighbors per alias in insertion order; drives deterministic traversal.
    adjacency: HashMap<Alias, Vec<Alias>>,
    directed: bool,
    max_path_length: usize,
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new(false)
    }
}

impl DependencyGraph {
    pub fn new(directed: bool) -> Self {
        Self {
            graph: DiGraph::new(),
            node_indices: HashMap::new(),
            adjacency: HashMap::new(),
            directed,
            max_path_length: DEFAULT_MAX_PATH_LENGTH,
        }
    }

    /// Build the undirected foreign-key graph of a schema.
    pub fn from_schema(schema: &Schema) -> Self {
        let mut graph = Self::new(false);
        for table in &schema.tables {
            graph.add_vertex(DependencyVertex::new(&table.name));
            for (column, reference) in table.foreign_keys() {
                graph.add_edge(DependencyEdge::new(
                    &table.name,
                    &column.name,
                    &reference.table,
                    &reference.column,
                ));
            }
        }
        tracing::debug!(
            schema = %schema.name,
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            "built dependency graph"
        );
        graph
    }

    /// Bound on the vertices in an enumerated path. Values below 2 are raised
    /// to 2 so that adjacent tables stay reachable.
    pub fn with_max_path_length(mut self, max_path_length: usize) -> Self {
        self.max_path_length = max_path_length.max(2);
        self
    }

    pub fn max_path_length(&self) -> usize {
        self.max_path_length
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    /// Add a vertex; adding an existing alias is a no-op.
    pub fn add_vertex(&mut self, vertex: DependencyVertex) -> NodeIndex {
        if let Some(idx) = self.node_indices.get(&vertex.alias) {
            return *idx;
        }
        let alias = vertex.alias.clone();
        let idx = self.graph.add_node(vertex);
        self.node_indices.insert(alias.clone(), idx);
        self.adjacency.entry(alias).or_default();
        idx
    }

    /// Add an edge, creating missing endpoints. Returns false for duplicates.
    pub fn add_edge(&mut self, edge: DependencyEdge) -> bool {
        let from = self.add_vertex(DependencyVertex::aliased(edge.from.clone()));
        let to = self.add_vertex(DependencyVertex::aliased(edge.to.clone()));

        if self
            .graph
            .edges_connecting(from, to)
            .any(|existing| existing.weight() == &edge)
        {
            return false;
        }

        Self::link(&mut self.adjacency, &edge.from, &edge.to);
        if !self.directed {
            Self::link(&mut self.adjacency, &edge.to, &edge.from);
        }
        self.graph.add_edge(from, to, edge);
        true
    }

    fn link(adjacency: &mut HashMap<Alias, Vec<Alias>>, from: &Alias, to: &Alias) {
        let neighbors = adjacency.entry(from.clone()).or_default();
        if !neighbors.contains(to) {
            neighbors.push(to.clone());
        }
    }

    pub fn contains(&self, alias: &Alias) -> bool {
        self.node_indices.contains_key(alias)
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn vertices(&self) -> impl Iterator<Item = &DependencyVertex> {
        self.graph.node_weights()
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.graph.edge_weights()
    }

    /// Neighbors of an alias in insertion order.
    pub fn neighbors(&self, alias: &Alias) -> &[Alias] {
        self.adjacency.get(alias).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Edges touching `table`. Undirected graphs include edges where the
    /// table is the referenced side.
    pub fn edges_of(&self, table: &str) -> Vec<&DependencyEdge> {
        self.edges()
            .filter(|e| e.from_table() == table || (!self.directed && e.to_table() == table))
            .collect()
    }
}
