//! Join planner - converts a select request into a parameterized query.
//!
//! Four-phase architecture:
//! 1. Join ordering: target + requested aliases → ordered aliases (`joins`)
//! 2. FROM clause: ordered aliases → anchored LEFT JOINs (`from_clause`)
//! 3. Projection: joined aliases + [`SelectSpec`] → SELECT list (`projection`)
//! 4. Filter: [`Constraints`] → WHERE condition and bound parameters (`filter`)
//!
//! Aliases that cannot be reached or anchored are dropped from the plan and
//! reported in [`QueryPlan::dropped_aliases`]; planning itself only fails on
//! unknown tables and columns.

mod filter;
mod from_clause;
mod joins;
mod projection;

pub use filter::{build_where, BoundParam, BoundValue, WhereClause};
pub use from_clause::FromClause;
pub use joins::JoinOrder;
pub use projection::SelectSpec;

use indexmap::IndexSet;
use serde::Serialize;

use crate::alias::{Alias, Slot};
use crate::constraint::Constraints;
use crate::db::{Connection, DbResult, Value};
use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::schema::Schema;
use crate::sql::{
    func, lit_int, table_col, Analyze, CreateTableAs, Dialect, DropTable, OrderByExpr, Query,
    SortDir,
};

/// What to order the result rows by.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderKey {
    /// 1-based position in the SELECT list.
    Position(u64),
    Random,
    Slot(Slot),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub key: OrderKey,
    pub dir: SortDir,
}

impl Order {
    pub fn position(position: u64) -> Self {
        Self {
            key: OrderKey::Position(position),
            dir: SortDir::Asc,
        }
    }

    pub fn random() -> Self {
        Self {
            key: OrderKey::Random,
            dir: SortDir::Asc,
        }
    }

    pub fn slot(slot: Slot) -> Self {
        Self {
            key: OrderKey::Slot(slot),
            dir: SortDir::Asc,
        }
    }

    pub fn desc(mut self) -> Self {
        self.dir = SortDir::Desc;
        self
    }

    fn to_order_by(&self) -> OrderByExpr {
        let expr = match &self.key {
            OrderKey::Position(n) => lit_int(*n as i64),
            OrderKey::Random => func("RANDOM", vec![]),
            OrderKey::Slot(slot) => table_col(&slot.alias.to_string(), &slot.column),
        };
        match self.dir {
            SortDir::Asc => OrderByExpr::asc(expr),
            SortDir::Desc => OrderByExpr::desc(expr),
        }
    }
}

/// Everything the planner needs to build one SELECT.
#[derive(Debug, Clone)]
#[must_use = "builders have no effect until planned"]
pub struct SelectRequest {
    pub target: Alias,
    /// Aliases to join besides those named by the constraints.
    pub tables: Vec<Alias>,
    pub constraints: Constraints,
    pub spec: SelectSpec,
    pub order: Option<Order>,
    pub limit: Option<u64>,
}

impl SelectRequest {
    /// Select every column of `target`, ordered by the first column.
    pub fn new(target: Alias) -> Self {
        Self {
            target,
            tables: vec![],
            constraints: Constraints::new(),
            spec: SelectSpec::All,
            order: Some(Order::position(1)),
            limit: None,
        }
    }

    pub fn join(mut self, alias: Alias) -> Self {
        self.tables.push(alias);
        self
    }

    pub fn joins(mut self, aliases: impl IntoIterator<Item = Alias>) -> Self {
        self.tables.extend(aliases);
        self
    }

    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn spec(mut self, spec: SelectSpec) -> Self {
        self.spec = spec;
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn unordered(mut self) -> Self {
        self.order = None;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Requested aliases in first-mention order: constraint tables first,
    /// then aliases referenced by constraints, then explicit joins.
    pub fn wanted(&self) -> Vec<Alias> {
        let wanted: IndexSet<Alias> = self
            .constraints
            .tables()
            .chain(self.constraints.referenced_aliases())
            .chain(self.tables.iter())
            .cloned()
            .collect();
        wanted.into_iter().collect()
    }
}

/// A planned SELECT with its bound parameters.
#[derive(Debug, Clone, Serialize)]
pub struct QueryPlan {
    #[serde(skip)]
    pub query: Query,
    pub params: Vec<BoundParam>,
    /// Aliases present in the FROM clause, in join order.
    pub joined: Vec<Alias>,
    /// Requested aliases left out of the query.
    pub dropped_aliases: Vec<Alias>,
}

impl QueryPlan {
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.query.to_sql(dialect)
    }

    /// Parameter values in placeholder order.
    pub fn values(&self) -> Vec<Value> {
        filter::flatten(&self.params)
    }

    /// Store the result rows in table `name`, replacing any table of that
    /// name. The table is unlogged where the database supports it.
    pub fn materialize<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        name: &str,
        analyze: bool,
    ) -> DbResult<()> {
        let dialect = conn.dialect();
        conn.execute(&DropTable::new(name).if_exists().to_sql(dialect), &[])?;
        let create = CreateTableAs::new(name, self.query.clone()).unlogged();
        conn.execute(&create.to_sql(dialect), &self.values())?;
        if analyze {
            conn.execute(&Analyze::new(name).to_sql(dialect), &[])?;
        }
        tracing::debug!(table = name, joined = self.joined.len(), "materialized query");
        Ok(())
    }
}

/// Main entry point for SQL planning.
pub struct JoinPlanner<'a> {
    schema: &'a Schema,
    graph: &'a DependencyGraph,
}

impl<'a> JoinPlanner<'a> {
    pub fn new(schema: &'a Schema, graph: &'a DependencyGraph) -> Self {
        Self { schema, graph }
    }

    pub fn plan(&self, request: &SelectRequest) -> Result<QueryPlan> {
        let target = &request.target;
        self.schema.table(target.base_table())?;

        // Phase 1: join ordering
        let wanted = request.wanted();
        let order = self.order_joins(target, &wanted);

        // Phase 2: FROM clause
        let from = self.build_from(&order.aliases)?;

        let mut dropped = order.unreachable;
        for alias in from.dropped.iter().chain(wanted.iter()) {
            if !from.joined.contains(alias) && !dropped.contains(alias) {
                dropped.push(alias.clone());
            }
        }

        // Phase 3: projection
        let (select, distinct_on) = self.build_select(target, &from.joined, &request.spec)?;

        // Phase 4: filter
        let filter = build_where(&request.constraints, &from.joined);

        let mut query = Query::new()
            .select(select)
            .distinct_on(distinct_on)
            .from(from.table);
        query.joins = from.joins;
        if let Some(condition) = filter.condition {
            query = query.filter(condition);
        }
        if let Some(order) = &request.order {
            query = query.order_by(vec![order.to_order_by()]);
        }
        if let Some(limit) = request.limit {
            query = query.limit(limit);
        }

        Ok(QueryPlan {
            query,
            params: filter.params,
            joined: from.joined,
            dropped_aliases: dropped,
        })
    }
}
