//! Join ordering.
//!
//! Every requested alias is reached from the target along the cheapest
//! dependency path. Tables on the path after the alias's foreign-key source
//! inherit its prefix, so a second occurrence of a table forms its own branch
//! of the join tree.

use super::JoinPlanner;
use crate::alias::Alias;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinOrder {
    /// Target first, then every alias in an order where each one's anchor
    /// precedes it.
    pub aliases: Vec<Alias>,
    /// Requested aliases with no path from the target.
    pub unreachable: Vec<Alias>,
}

impl<'a> JoinPlanner<'a> {
    pub fn order_joins(&self, target: &Alias, aliases: &[Alias]) -> JoinOrder {
        let start = Alias::table(target.base_table());
        let known: Vec<Alias> = std::iter::once(start.clone())
            .chain(aliases.iter().map(|a| Alias::table(a.base_table())))
            .collect();

        let mut order = JoinOrder::default();

        for alias in aliases {
            let Some(path) = self.path_for(&start, alias, &known) else {
                tracing::debug!(from = %target, %alias, "no dependency path");
                order.unreachable.push(alias.clone());
                continue;
            };

            let hop = alias.prefix();
            let mut do_prefix = false;
            for (i, step) in path.iter().enumerate() {
                let placed = if i == 0 {
                    target.clone()
                } else if do_prefix {
                    step.with_prefix(hop)
                } else {
                    step.clone()
                };
                if !order.aliases.contains(&placed) {
                    order.aliases.push(placed);
                }
                if hop.is_some_and(|h| h.table == step.base_table()) {
                    do_prefix = true;
                }
            }
        }

        if order.aliases.is_empty() {
            order.aliases.push(target.clone());
        }
        order
    }

    /// Best path to the alias's base table. A prefixed alias must be reached
    /// through its foreign-key source; when the cheapest path skips that
    /// table the route is rebuilt through it. A self-referencing key adds
    /// its table a second time after the source.
    fn path_for(&self, start: &Alias, alias: &Alias, known: &[Alias]) -> Option<Vec<Alias>> {
        let end = Alias::table(alias.base_table());

        let Some(hop) = alias.prefix() else {
            return self.graph.best_path(start, &end, known);
        };
        if hop.table == alias.base_table() {
            let mut through = self.graph.best_path(start, &end, known)?;
            through.push(end);
            return Some(through);
        }

        let path = self.graph.best_path(start, &end, known)?;
        if path.iter().any(|step| step.base_table() == hop.table) {
            return Some(path);
        }

        let mut through = self
            .graph
            .best_path(start, &Alias::table(&hop.table), known)?;
        if through.last() != Some(&end) {
            through.push(end);
        }
        Some(through)
    }
}
