//! Match state for one pattern graph.
//!
//! A [`Matcher`] owns the pattern-value map of the attempt in progress and the
//! capture history accumulated by [`PatternNode::Capture`] events. Bindings are
//! scoped to a single [`Matcher::match_root`] call; the capture history is not,
//! so recurrent motifs can be matched round after round.
//!
//! [`PatternNode::Capture`]: super::PatternNode::Capture

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::Node;
use crate::pattern::{PatternGraph, PatternId};

/// Binding of pattern nodes to graph values.
pub type PatternValueMap = HashMap<PatternId, Arc<Node>>;

#[derive(Debug)]
pub struct Matcher<'g> {
    graph: &'g PatternGraph,
    root: PatternId,
    pattern_map: PatternValueMap,
    capture_history: Vec<PatternValueMap>,
    matched_root: Option<Arc<Node>>,
}

impl<'g> Matcher<'g> {
    pub fn new(graph: &'g PatternGraph, root: PatternId) -> Self {
        Self { graph, root, pattern_map: HashMap::new(), capture_history: Vec::new(), matched_root: None }
    }

    pub fn graph(&self) -> &'g PatternGraph {
        self.graph
    }

    pub fn root(&self) -> PatternId {
        self.root
    }

    /// Match the root pattern against `graph_root`, starting from empty bindings.
    ///
    /// On failure every binding made by the attempt is discarded.
    pub fn match_root(&mut self, graph_root: &Arc<Node>) -> bool {
        self.match_root_seeded(graph_root, PatternValueMap::new())
    }

    /// Like [`Matcher::match_root`], with bindings pre-seeded from `seed`.
    pub fn match_root_seeded(&mut self, graph_root: &Arc<Node>, seed: PatternValueMap) -> bool {
        self.pattern_map = seed;
        self.matched_root = None;

        let matched = self.match_value(self.root, graph_root);
        if matched {
            tracing::trace!(root = %graph_root.name(), bindings = self.pattern_map.len(), "pattern matched");
            self.matched_root = Some(graph_root.clone());
        } else {
            self.pattern_map.clear();
        }
        matched
    }

    /// Match one pattern node against one graph value.
    pub fn match_value(&mut self, pattern: PatternId, value: &Arc<Node>) -> bool {
        let graph = self.graph;
        graph.node(pattern).match_value(self, pattern, value)
    }

    /// Match patterns against values positionally. Arity must agree.
    pub fn match_inputs(&mut self, patterns: &[PatternId], values: &[&Arc<Node>]) -> bool {
        patterns.len() == values.len()
            && patterns.iter().zip(values.iter()).all(|(pattern, value)| self.match_value(*pattern, value))
    }

    /// Capture event: snapshot the bindings, then drop all but `static_nodes`.
    ///
    /// Static nodes that are not currently bound are ignored.
    pub fn capture(&mut self, static_nodes: &BTreeSet<PatternId>) {
        self.capture_history.push(self.pattern_map.clone());
        self.pattern_map.retain(|id, _| static_nodes.contains(id));
        tracing::trace!(
            round = self.capture_history.len(),
            retained = self.pattern_map.len(),
            "captured pattern value map"
        );
    }

    pub fn get(&self, pattern: PatternId) -> Option<&Arc<Node>> {
        self.pattern_map.get(&pattern)
    }

    pub fn pattern_map(&self) -> &PatternValueMap {
        &self.pattern_map
    }

    /// Committed pattern-value maps, in capture order.
    pub fn capture_history(&self) -> &[PatternValueMap] {
        &self.capture_history
    }

    pub fn take_capture_history(&mut self) -> Vec<PatternValueMap> {
        std::mem::take(&mut self.capture_history)
    }

    /// Graph value matched by the last successful [`Matcher::match_root`].
    pub fn matched_root(&self) -> Option<&Arc<Node>> {
        self.matched_root.as_ref()
    }

    pub(crate) fn bind(&mut self, pattern: PatternId, value: &Arc<Node>) {
        self.pattern_map.insert(pattern, value.clone());
    }

    pub(crate) fn save(&self) -> PatternValueMap {
        self.pattern_map.clone()
    }

    pub(crate) fn restore(&mut self, saved: PatternValueMap) {
        self.pattern_map = saved;
    }
}
