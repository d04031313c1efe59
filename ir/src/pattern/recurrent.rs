//! Matching of repeated motifs along a chain.
//!
//! A [`RecurrentMatcher`] matches a pattern, then follows the value bound to a
//! designated recurrent label and matches the same pattern again from there,
//! until a round fails. Correlated pattern nodes must bind to the same graph
//! values in every round (typically loop-invariant inputs such as weights).

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::Node;
use crate::pattern::{Matcher, PatternGraph, PatternId, PatternValueMap};

#[derive(Debug)]
pub struct RecurrentMatcher<'g> {
    graph: &'g PatternGraph,
    root: PatternId,
    recurrent: PatternId,
    correlated: BTreeSet<PatternId>,
}

/// Per-round bindings of a successful recurrent match, outermost round first.
#[derive(Debug, Clone, Default)]
pub struct RecurrentMatch {
    rounds: Vec<PatternValueMap>,
}

impl RecurrentMatch {
    pub fn rounds(&self) -> &[PatternValueMap] {
        &self.rounds
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    /// Value bound to `pattern` in each round where it was bound.
    pub fn bound_values(&self, pattern: PatternId) -> Vec<Arc<Node>> {
        self.rounds.iter().filter_map(|round| round.get(&pattern).cloned()).collect()
    }
}

impl<'g> RecurrentMatcher<'g> {
    pub fn new(
        graph: &'g PatternGraph,
        root: PatternId,
        recurrent: PatternId,
        correlated: impl IntoIterator<Item = PatternId>,
    ) -> Self {
        Self { graph, root, recurrent, correlated: correlated.into_iter().collect() }
    }

    /// Match rounds starting at `graph_root`. Returns an empty match if the first round fails.
    pub fn match_chain(&self, graph_root: &Arc<Node>) -> RecurrentMatch {
        let mut matcher = Matcher::new(self.graph, self.root);
        let mut rounds = Vec::new();
        let mut seed = PatternValueMap::new();
        let mut current = graph_root.clone();

        while matcher.match_root_seeded(&current, seed.clone()) {
            let bindings = matcher.pattern_map().clone();

            // Only labels honour a seeded binding; other node kinds rebind, so check afterwards.
            if seed.iter().any(|(id, value)| bindings.get(id).is_none_or(|bound| bound.id() != value.id())) {
                break;
            }

            if rounds.is_empty() {
                seed = bindings
                    .iter()
                    .filter(|(id, _)| self.correlated.contains(id))
                    .map(|(id, value)| (*id, value.clone()))
                    .collect();
            }

            let next = bindings.get(&self.recurrent).cloned();
            rounds.push(bindings);

            // A recurrent label bound to the value just matched would never advance.
            match next {
                Some(next) if next.id() != current.id() => current = next,
                _ => break,
            }
        }

        tracing::trace!(rounds = rounds.len(), root = %graph_root.name(), "recurrent match finished");
        RecurrentMatch { rounds }
    }
}
