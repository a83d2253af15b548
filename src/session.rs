//! Conversational query session.
//!
//! A [`Session`] owns one database connection together with the schema, its
//! dependency graph, the name of the scratch table the current result set is
//! materialized into, and the baseline informativity table. Everything the
//! dialogue layer needs goes through it.
//!
//! One session serves one conversation at a time. Concurrent conversations
//! each get their own session, with its own connection and a scratch table
//! name of its own; the schema and graph are shared read-only.

use std::sync::Arc;

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::alias::{Alias, Slot};
use crate::cache::{BaselineCache, CacheKey};
use crate::config::Settings;
use crate::constraint::{Constraint, Constraints, Operator};
use crate::db::{Connection, Row, Value};
use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::informativity::{InformativityCache, Requestable, SlotContext, SlotSelector};
use crate::planner::{JoinPlanner, Order, QueryPlan, SelectRequest};
use crate::procedure::{ProcedureInvoker, ProcedureOutcome};
use crate::schema::{OperationKind, Schema};
use crate::sql::dialect::helpers::is_valid_identifier;
use crate::sql::{
    col, func, lit_int, placeholder, raw_sql, Expr, ExprExt, OrderByExpr, Query, SqlDialect,
    TableRef,
};

pub struct Session<C: Connection> {
    conn: Option<C>,
    schema: Arc<Schema>,
    graph: Arc<DependencyGraph>,
    scratch_table: String,
    informativity: InformativityCache,
    rng: StdRng,
    candidate_limit: Option<usize>,
    include_primary_keys: bool,
}

impl<C: Connection> Session<C> {
    /// Session with default settings.
    pub fn new(conn: C, schema: Arc<Schema>) -> Result<Self> {
        Self::with_settings(conn, schema, &Settings::default())
    }

    pub fn with_settings(conn: C, schema: Arc<Schema>, settings: &Settings) -> Result<Self> {
        let graph = DependencyGraph::from_schema(&schema)
            .with_max_path_length(settings.planner.max_path_length);
        Self::from_parts(conn, schema, Arc::new(graph), settings)
    }

    /// Session over an already built graph, for sharing one graph between
    /// concurrent sessions.
    pub fn from_parts(
        conn: C,
        schema: Arc<Schema>,
        graph: Arc<DependencyGraph>,
        settings: &Settings,
    ) -> Result<Self> {
        let scratch_table = settings.informativity.scratch_table.clone();
        if !is_valid_identifier(&scratch_table) {
            return Err(Error::InvalidIdentifier(scratch_table));
        }
        tracing::debug!(
            schema = %schema.name,
            dialect = conn.dialect().name(),
            scratch = %scratch_table,
            "session opened"
        );
        Ok(Self {
            conn: Some(conn),
            schema,
            graph,
            scratch_table,
            informativity: InformativityCache::new(),
            rng: StdRng::from_os_rng(),
            candidate_limit: settings.informativity.candidate_limit,
            include_primary_keys: settings.informativity.include_primary_keys,
        })
    }

    /// Seed the generator used to break ties between equally informative
    /// columns.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn graph(&self) -> &Arc<DependencyGraph> {
        &self.graph
    }

    pub fn scratch_table(&self) -> &str {
        &self.scratch_table
    }

    pub fn informativity(&self) -> &InformativityCache {
        &self.informativity
    }

    pub fn set_informativity(&mut self, informativity: InformativityCache) {
        self.informativity = informativity;
    }

    pub fn is_connected(&self) -> bool {
        self.conn.as_ref().is_some_and(|c| c.is_open())
    }

    pub fn connection(&mut self) -> Result<&mut C> {
        open(&mut self.conn)
    }

    /// Close the connection. Every later database operation fails with
    /// [`Error::NotConnected`].
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut conn) = self.conn.take() {
            conn.close()?;
            tracing::debug!(schema = %self.schema.name, "session closed");
        }
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Plan a request without running it.
    pub fn plan(&self, request: &SelectRequest) -> Result<QueryPlan> {
        JoinPlanner::new(&self.schema, &self.graph).plan(request)
    }

    pub fn select(&mut self, request: &SelectRequest) -> Result<Vec<Row>> {
        let plan = self.plan(request)?;
        let conn = open(&mut self.conn)?;
        let sql = plan.to_sql(conn.dialect());
        Ok(conn.query(&sql, &plan.values())?)
    }

    /// The first row of the request, if any.
    pub fn select_one(&mut self, request: &SelectRequest) -> Result<Option<Row>> {
        let rows = self.select(&request.clone().limit(1))?;
        Ok(rows.into_iter().next())
    }

    /// Store the rows of `request` in table `name`, replacing any previous
    /// table of that name. Returns the plan so callers can see which aliases
    /// made it into the join.
    pub fn select_into(
        &mut self,
        request: &SelectRequest,
        name: &str,
        analyze: bool,
    ) -> Result<QueryPlan> {
        if !is_valid_identifier(name) {
            return Err(Error::InvalidIdentifier(name.to_string()));
        }
        let plan = self.plan(request)?;
        plan.materialize(open(&mut self.conn)?, name, analyze)?;
        Ok(plan)
    }

    /// Distinct values of one column, or their number when `count` is set.
    pub fn select_distinct(
        &mut self,
        table: &str,
        column: &str,
        count: bool,
        limit: Option<u64>,
    ) -> Result<Vec<Value>> {
        self.schema.column(table, column)?;

        let query = if count {
            let distinct = Expr::Function {
                name: "COUNT".into(),
                args: vec![col(column)],
                distinct: true,
            };
            Query::new()
                .select(vec![distinct.alias("n")])
                .from(TableRef::new(table))
        } else {
            let mut query = Query::new()
                .select(vec![col(column)])
                .distinct()
                .from(TableRef::new(table))
                .order_by(vec![OrderByExpr::asc(lit_int(1))]);
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            query
        };

        let conn = open(&mut self.conn)?;
        let sql = query.to_sql(conn.dialect());
        let rows = conn.query(&sql, &[])?;
        Ok(rows.into_iter().filter_map(first_value).collect())
    }

    /// One random row of the target joined with the constrained tables.
    pub fn sample(&mut self, target: &Alias, constraints: &Constraints) -> Result<Option<Row>> {
        let request = SelectRequest::new(target.clone())
            .constraints(constraints.clone())
            .order(Order::random());
        self.select_one(&request)
    }

    /// One random non-null value of a column.
    pub fn column_sample(&mut self, table: &str, column: &str) -> Result<Option<Value>> {
        self.schema.column(table, column)?;
        let query = Query::new()
            .select(vec![col(column)])
            .from(TableRef::new(table))
            .filter(col(column).is_not_null())
            .order_by(vec![OrderByExpr::asc(func("RANDOM", vec![]))])
            .limit(1);

        let conn = open(&mut self.conn)?;
        let sql = query.to_sql(conn.dialect());
        let rows = conn.query(&sql, &[])?;
        Ok(rows.into_iter().find_map(first_value))
    }

    /// The values of a column most similar to `value` by trigram similarity,
    /// all of them tied at the best score, which must exceed `threshold`.
    /// `None` when nothing scores above it. PostgreSQL with `pg_trgm` only.
    pub fn similar_values(
        &mut self,
        table: &str,
        column: &str,
        value: &str,
        threshold: f64,
    ) -> Result<Option<SimilarValues>> {
        self.schema.column(table, column)?;
        let conn = open(&mut self.conn)?;
        let dialect = conn.dialect();
        if !dialect.supports_trigram_similarity() {
            return Err(Error::InvalidOperation(format!(
                "similar_values requires pg_trgm, not available on {}",
                dialect.name()
            )));
        }

        let as_text = raw_sql(&format!("{}::text", dialect.quote_identifier(column)));
        let score = func("similarity", vec![as_text.clone(), placeholder(1)]);
        let query = Query::new()
            .select(vec![as_text.alias("value"), score.clone().alias("score")])
            .distinct()
            .from(TableRef::new(table))
            .filter(score.gt(placeholder(2)))
            .order_by(vec![OrderByExpr::desc(lit_int(2))]);

        let sql = query.to_sql(dialect);
        let rows = conn.query(&sql, &[Value::from(value), Value::Float(threshold)])?;
        let best = SimilarValues::from_rows(rows);
        if let Some(best) = &best {
            tracing::debug!(
                table,
                column,
                score = best.score,
                matches = best.values.len(),
                "similar values"
            );
        }
        Ok(best)
    }

    /// `n_distinct` planner estimates for a candidate's columns in a
    /// materialized result. The result must have been analyzed, see
    /// [`Self::select_into`]. PostgreSQL only.
    pub fn column_selectivities(
        &mut self,
        result: &str,
        candidate: &Alias,
        columns: &[String],
    ) -> Result<IndexMap<String, f64>> {
        let conn = open(&mut self.conn)?;
        let dialect = conn.dialect();
        if !dialect.supports_column_statistics() {
            return Err(Error::InvalidOperation(format!(
                "column statistics are not available on {}",
                dialect.name()
            )));
        }
        if columns.is_empty() {
            return Ok(IndexMap::new());
        }

        let keys: Vec<String> = columns.iter().map(|c| candidate.slot_column(c)).collect();
        let query = Query::new()
            .select(vec![col("attname"), col("n_distinct")])
            .from(TableRef::new("pg_stats"))
            .filter(
                col("tablename")
                    .eq(placeholder(1))
                    .and(col("attname").in_list((2..keys.len() + 2).map(placeholder).collect())),
            );
        let mut params = vec![Value::from(result)];
        params.extend(keys.iter().map(|k| Value::from(k.as_str())));

        let sql = query.to_sql(dialect);
        let rows = conn.query(&sql, &params)?;
        let mut out = IndexMap::new();
        for (column, key) in columns.iter().zip(&keys) {
            let n_distinct = rows
                .iter()
                .find(|row| row.get("attname").and_then(Value::as_str) == Some(key.as_str()))
                .and_then(|row| row.get("n_distinct").and_then(Value::as_f64));
            if let Some(n) = n_distinct {
                out.insert(column.clone(), n);
            }
        }
        Ok(out)
    }

    /// Whether the database accepts `value` as a `data_type`.
    pub fn can_cast(&mut self, value: &Value, data_type: &str) -> Result<bool> {
        if data_type.is_empty()
            || !data_type
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || " _(),[]".contains(c))
        {
            return Err(Error::InvalidIdentifier(data_type.to_string()));
        }
        if value.is_null() {
            return Ok(true);
        }

        let conn = open(&mut self.conn)?;
        let dialect = conn.dialect();
        let cast = raw_sql(&format!(
            "CAST(CAST({} AS TEXT) AS {})",
            dialect.placeholder(1),
            data_type
        ));
        let sql = Query::new().select(vec![cast.alias("value")]).to_sql(dialect);
        match conn.query_in_transaction(&sql, &[Value::Text(value.to_string())]) {
            Ok(_) => Ok(true),
            Err(e) if e.server_message().is_some() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Join graph and slot selection
    // =========================================================================

    /// Aliases that can be joined next to `alias`.
    pub fn join_candidates(&self, alias: &Alias, directed: bool) -> Vec<Alias> {
        self.graph.join_candidates(
            std::slice::from_ref(alias),
            self.schema.mapping_tables(),
            directed,
        )
    }

    pub fn build_constraint(
        &self,
        values: Vec<Value>,
        operator: &str,
        is_reference: bool,
    ) -> Result<Constraint> {
        let operator: Operator = operator.parse()?;
        Ok(Constraint::build(values, operator, is_reference))
    }

    /// Non-key columns of the given aliases, the columns worth asking about.
    pub fn requestable<'a>(&self, aliases: impl IntoIterator<Item = &'a Alias>) -> Requestable {
        Requestable::from_schema(&self.schema, aliases)
    }

    pub fn next_slot(
        &mut self,
        target: &Alias,
        joined: &[Alias],
        constraints: &Constraints,
        requestable: &Requestable,
    ) -> Result<Option<Slot>> {
        let ctx = SlotContext {
            target,
            joined,
            constraints,
            requestable,
        };
        let conn = open(&mut self.conn)?;
        SlotSelector::new(
            &self.schema,
            &self.graph,
            &self.informativity,
            &self.scratch_table,
        )
        .next_slot(conn, &mut self.rng, &ctx)
    }

    pub fn best_join_table(
        &mut self,
        target: &Alias,
        joined: &[Alias],
        constraints: &Constraints,
        requestable: &Requestable,
    ) -> Result<Option<Alias>> {
        let ctx = SlotContext {
            target,
            joined,
            constraints,
            requestable,
        };
        let conn = open(&mut self.conn)?;
        SlotSelector::new(
            &self.schema,
            &self.graph,
            &self.informativity,
            &self.scratch_table,
        )
        .with_candidate_limit(self.candidate_limit)
        .best_join_table(conn, &ctx)
    }

    pub fn should_join_next_table(
        &self,
        target: &Alias,
        joined: &[Alias],
        constraints: &Constraints,
        requestable: &Requestable,
    ) -> bool {
        let ctx = SlotContext {
            target,
            joined,
            constraints,
            requestable,
        };
        SlotSelector::new(
            &self.schema,
            &self.graph,
            &self.informativity,
            &self.scratch_table,
        )
        .should_join_next_table(&ctx)
    }

    // =========================================================================
    // Procedures and baseline
    // =========================================================================

    pub fn call_procedure(
        &mut self,
        name: &str,
        operation: OperationKind,
        args: &IndexMap<String, Value>,
    ) -> Result<ProcedureOutcome> {
        let conn = open(&mut self.conn)?;
        ProcedureInvoker::new(&self.schema).invoke(conn, name, operation, args)
    }

    /// Profile every table of the schema against the database.
    pub fn build_informativity(&mut self) -> Result<&InformativityCache> {
        let conn = open(&mut self.conn)?;
        self.informativity =
            InformativityCache::build(conn, &self.schema, self.include_primary_keys)?;
        Ok(&self.informativity)
    }

    /// Load the baseline for this schema from `cache`, profiling the
    /// database and storing the result when it is missing.
    pub fn load_or_build_informativity(
        &mut self,
        cache: &BaselineCache,
    ) -> Result<&InformativityCache> {
        let hash = CacheKey::schema_hash(&self.schema)?;
        let key = CacheKey::informativity(&hash, self.include_primary_keys);
        if let Some(stored) = cache.get::<InformativityCache>(&key)? {
            tracing::debug!(schema = %self.schema.name, "baseline loaded from cache");
            self.informativity = stored;
            return Ok(&self.informativity);
        }

        self.build_informativity()?;
        cache.set(&key, &self.informativity)?;
        Ok(&self.informativity)
    }
}

fn open<C: Connection>(conn: &mut Option<C>) -> Result<&mut C> {
    conn.as_mut()
        .filter(|c| c.is_open())
        .ok_or(Error::NotConnected)
}

/// Values sharing the best similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarValues {
    pub values: Vec<Value>,
    pub score: f64,
}

impl SimilarValues {
    /// Rows of `value`, `score` ordered best first; keeps the leading ties.
    fn from_rows(rows: Vec<Row>) -> Option<Self> {
        let mut best: Option<Self> = None;
        for mut row in rows {
            let Some(score) = row.shift_remove("score").and_then(|s| s.as_f64()) else {
                continue;
            };
            let Some(value) = row.shift_remove("value") else {
                continue;
            };
            match &mut best {
                None => best = Some(Self { values: vec![value], score }),
                Some(b) if score == b.score => b.values.push(value),
                Some(_) => break,
            }
        }
        best
    }
}

fn first_value(row: Row) -> Option<Value> {
    row.into_iter().next().map(|(_, value)| value)
}
