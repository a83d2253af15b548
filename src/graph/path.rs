//! Path enumeration for DependencyGraph.
//!
//! Paths are sequences of aliases from a start vertex to an end vertex with
//! no repeated vertex. Enumeration order follows adjacency insertion order so
//! that ties in [`DependencyGraph::best_path`] resolve deterministically.

use std::collections::HashSet;

use super::DependencyGraph;
use crate::alias::Alias;

impl DependencyGraph {
    /// Every simple path from `from` to `to`, at most `max_path_length`
    /// tables long, in depth-first discovery order.
    pub fn all_paths(&self, from: &Alias, to: &Alias) -> Vec<Vec<Alias>> {
        if from == to {
            return vec![vec![from.clone()]];
        }
        if !self.contains(from) {
            return vec![];
        }

        let mut results = vec![];
        let mut stack: Vec<(Alias, Vec<Alias>)> = vec![(from.clone(), vec![from.clone()])];

        while let Some((current, path)) = stack.pop() {
            if &current == to {
                results.push(path);
                continue;
            }
            if path.len() >= self.max_path_length {
                continue;
            }

            // Pushed in reverse so the first neighbor is explored first.
            for neighbor in self.neighbors(&current).iter().rev() {
                if path.contains(neighbor) {
                    continue;
                }
                let mut next = path.clone();
                next.push(neighbor.clone());
                stack.push((neighbor.clone(), next));
            }
        }

        results
    }

    /// The path needing the fewest tables outside `known`; the first one
    /// found wins ties.
    pub fn best_path(&self, from: &Alias, to: &Alias, known: &[Alias]) -> Option<Vec<Alias>> {
        let known: HashSet<&Alias> = known.iter().collect();
        self.all_paths(from, to)
            .into_iter()
            .min_by_key(|path| path.iter().filter(|a| !known.contains(a)).count())
    }
}
