//! Next-question selection.
//!
//! The selector answers from the baseline cache while nothing narrows the
//! result set, and profiles a materialized result otherwise.

use indexmap::{IndexMap, IndexSet};
use rand::seq::IndexedRandom;
use rand::Rng;

use super::entropy::column_entropies;
use super::{InformativityCache, Requestable};
use crate::alias::{Alias, Slot};
use crate::constraint::Constraints;
use crate::db::Connection;
use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::planner::{JoinPlanner, SelectRequest, SelectSpec};
use crate::schema::Schema;
use crate::sql::DropTable;

/// The state of one conversation as the selector sees it.
#[derive(Debug, Clone, Copy)]
pub struct SlotContext<'r> {
    pub target: &'r Alias,
    pub joined: &'r [Alias],
    pub constraints: &'r Constraints,
    pub requestable: &'r Requestable,
}

impl<'r> SlotContext<'r> {
    /// Target, joined aliases, then aliases with any constraint.
    fn involved(&self) -> IndexSet<Alias> {
        std::iter::once(self.target)
            .chain(self.joined.iter())
            .chain(self.constraints.tables())
            .cloned()
            .collect()
    }

    fn request(&self) -> SelectRequest {
        SelectRequest::new(self.target.clone())
            .joins(self.joined.iter().cloned())
            .constraints(self.constraints.clone())
            .unordered()
    }
}

pub struct SlotSelector<'a> {
    schema: &'a Schema,
    graph: &'a DependencyGraph,
    cache: &'a InformativityCache,
    scratch_table: &'a str,
    candidate_limit: Option<usize>,
}

impl<'a> SlotSelector<'a> {
    pub fn new(
        schema: &'a Schema,
        graph: &'a DependencyGraph,
        cache: &'a InformativityCache,
        scratch_table: &'a str,
    ) -> Self {
        Self {
            schema,
            graph,
            cache,
            scratch_table,
            candidate_limit: None,
        }
    }

    /// Probe at most `limit` join candidates in [`Self::best_join_table`].
    pub fn with_candidate_limit(mut self, limit: Option<usize>) -> Self {
        self.candidate_limit = limit;
        self
    }

    /// The unanswered requestable column with the highest entropy. Ties are
    /// broken uniformly at random.
    pub fn next_slot<C, R>(
        &self,
        conn: &mut C,
        rng: &mut R,
        ctx: &SlotContext<'_>,
    ) -> Result<Option<Slot>>
    where
        C: Connection + ?Sized,
        R: Rng + ?Sized,
    {
        let options: Vec<Slot> = ctx
            .involved()
            .iter()
            .flat_map(|alias| {
                ctx.requestable
                    .columns(alias)
                    .iter()
                    .filter(|column| !ctx.constraints.is_constrained(alias, column))
                    .map(move |column| Slot::new(alias.clone(), column))
            })
            .collect();
        if options.is_empty() {
            tracing::debug!(table = %ctx.target, "no column options");
            return Ok(None);
        }

        let scored: Vec<(Slot, f64)> = if ctx.joined.is_empty() || !ctx.constraints.has_real() {
            options
                .into_iter()
                .filter_map(|slot| {
                    let entropy = self.cache.get(slot.alias.base_table(), &slot.column)?;
                    Some((slot, entropy))
                })
                .collect()
        } else {
            self.live_entropies(conn, ctx, options)?
        };

        let Some(best) = scored.iter().map(|(_, e)| *e).max_by(f64::total_cmp) else {
            tracing::debug!(table = %ctx.target, "no informativity for column options");
            return Ok(None);
        };
        let ties: Vec<&Slot> = scored
            .iter()
            .filter(|(_, e)| *e == best)
            .map(|(slot, _)| slot)
            .collect();
        let next = ties.choose(rng).map(|slot| (*slot).clone());
        if let Some(slot) = &next {
            tracing::debug!(%slot, entropy = best, ties = ties.len(), "next slot");
        }
        Ok(next)
    }

    /// Materialize the current result set into the scratch table and profile
    /// the options that made it into the join.
    fn live_entropies<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        ctx: &SlotContext<'_>,
        options: Vec<Slot>,
    ) -> Result<Vec<(Slot, f64)>> {
        let plan = JoinPlanner::new(self.schema, self.graph).plan(&ctx.request())?;
        plan.materialize(conn, self.scratch_table, false)?;

        let options: Vec<Slot> = options
            .into_iter()
            .filter(|slot| plan.joined.contains(&slot.alias))
            .collect();
        let keys: Vec<String> = options.iter().map(Slot::column_name).collect();
        let entropies = column_entropies(conn, self.scratch_table, &keys)?;

        Ok(options
            .into_iter()
            .zip(keys)
            .filter_map(|(slot, key)| entropies.get(&key).map(|e| (slot, *e)))
            .collect())
    }

    /// The join candidate whose best requestable column carries the most
    /// information. `None` when no candidate shows any.
    pub fn best_join_table<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        ctx: &SlotContext<'_>,
    ) -> Result<Option<Alias>> {
        let used: Vec<Alias> = std::iter::once(ctx.target)
            .chain(ctx.joined.iter())
            .chain(ctx.constraints.real().tables())
            .cloned()
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();
        let candidates = self
            .graph
            .join_candidates(&used, self.schema.mapping_tables(), true);

        let mut scores: IndexMap<Alias, f64> = IndexMap::new();

        if used.len() == 1 {
            for candidate in &candidates {
                for column in ctx.requestable.columns(candidate) {
                    if let Some(entropy) = self.cache.get(candidate.base_table(), column) {
                        record(&mut scores, candidate, entropy);
                    }
                }
            }
        } else {
            let limit = self.candidate_limit.unwrap_or(candidates.len());
            let probe = format!("{}__probe", self.scratch_table);
            for candidate in candidates.iter().take(limit) {
                let columns = ctx.requestable.columns(candidate);
                if columns.is_empty() {
                    continue;
                }
                tracing::debug!(%candidate, "probing join candidate");
                let entropies = self.probe(conn, ctx, candidate, columns, &probe);
                let drop = DropTable::new(&probe).if_exists().to_sql(conn.dialect());
                conn.execute(&drop, &[])?;
                if let Some(entropies) = entropies? {
                    for entropy in entropies {
                        record(&mut scores, candidate, entropy);
                    }
                }
            }
        }

        let mut best: Option<(&Alias, f64)> = None;
        for (alias, entropy) in &scores {
            if *entropy > 0.0 && best.map_or(true, |(_, b)| *entropy > b) {
                best = Some((alias, *entropy));
            }
        }
        Ok(best.map(|(alias, _)| alias.clone()))
    }

    /// Entropies of the candidate's columns in the result joined with it.
    /// `None` when the candidate could not be anchored.
    fn probe<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        ctx: &SlotContext<'_>,
        candidate: &Alias,
        columns: &[String],
        probe: &str,
    ) -> Result<Option<Vec<f64>>> {
        let mut select = IndexMap::new();
        select.insert(candidate.clone(), columns.to_vec());
        let request = ctx
            .request()
            .join(candidate.clone())
            .spec(SelectSpec::Columns(select));
        let plan = JoinPlanner::new(self.schema, self.graph).plan(&request)?;
        if !plan.joined.contains(candidate) {
            return Ok(None);
        }
        plan.materialize(conn, probe, false)?;

        let keys: Vec<String> = columns.iter().map(|c| candidate.slot_column(c)).collect();
        let entropies = column_entropies(conn, probe, &keys)?;
        Ok(Some(entropies.into_values().collect()))
    }

    /// Whether the current scope has run out of questions: nothing besides
    /// the target is involved yet, or every requestable column of the target
    /// and the joined aliases is answered.
    pub fn should_join_next_table(&self, ctx: &SlotContext<'_>) -> bool {
        let real = ctx.constraints.real();
        let others = ctx.joined.len() + real.tables().filter(|t| *t != ctx.target).count();
        if others == 0 {
            return true;
        }

        std::iter::once(ctx.target)
            .chain(ctx.joined.iter())
            .all(|alias| {
                ctx.requestable
                    .columns(alias)
                    .iter()
                    .all(|column| ctx.constraints.is_constrained(alias, column))
            })
    }
}

/// Keep the best entropy seen per alias, first-seen order.
fn record(scores: &mut IndexMap<Alias, f64>, alias: &Alias, entropy: f64) {
    let best = scores.entry(alias.clone()).or_insert(entropy);
    if entropy > *best {
        *best = entropy;
    }
}
