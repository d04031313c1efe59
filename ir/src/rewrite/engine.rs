//! Graph rewrite engine implementation.
//!
//! # Algorithm
//!
//! Nodes are visited in topological order, so every node sees its inputs
//! already rewritten. A node whose inputs changed is rebuilt over the new
//! inputs, then rules are tried against it until none fires (the per-node
//! fixed point). Replacements are recorded by node id and picked up by users.
//!
//! `Parameter` and `Result` nodes are rebuilt but never offered to rules: the
//! function's interface is fixed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use snafu::ensure;
use tracing::{debug, trace};

use crate::error::*;
use crate::pattern::{Matcher, PatternGraph, PatternId};
use crate::{Function, Node, NodeId, Op};

/// Upper bound on rule applications to a single node.
pub const DEFAULT_MAX_ITERATIONS: usize = 64;

/// Builds the replacement for a matched node, or declines with `None`.
pub type RewriteCallback = Box<dyn Fn(&Matcher<'_>) -> Option<Arc<Node>> + Send + Sync>;

pub struct RewriteRule {
    name: String,
    pattern: Arc<PatternGraph>,
    root: PatternId,
    callback: RewriteCallback,
}

impl RewriteRule {
    pub fn new(
        name: impl Into<String>,
        pattern: Arc<PatternGraph>,
        root: PatternId,
        callback: impl Fn(&Matcher<'_>) -> Option<Arc<Node>> + Send + Sync + 'static,
    ) -> Self {
        Self { name: name.into(), pattern, root, callback: Box::new(callback) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &PatternGraph {
        &self.pattern
    }

    /// Match the rule against `node` and run its callback on success.
    pub fn apply(&self, node: &Arc<Node>) -> Option<Arc<Node>> {
        let mut matcher = Matcher::new(&self.pattern, self.root);
        if !matcher.match_root(node) {
            return None;
        }
        (self.callback)(&matcher)
    }
}

impl fmt::Debug for RewriteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewriteRule").field("name", &self.name).field("root", &self.root).finish()
    }
}

/// Ordered rule set applied to whole functions.
#[derive(Debug)]
pub struct GraphRewrite {
    rules: Vec<RewriteRule>,
    max_iterations: usize,
}

impl Default for GraphRewrite {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphRewrite {
    pub fn new() -> Self {
        Self { rules: Vec::new(), max_iterations: DEFAULT_MAX_ITERATIONS }
    }

    pub fn with_rule(mut self, rule: RewriteRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn add_rule(&mut self, rule: RewriteRule) {
        self.rules.push(rule);
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    /// Apply rules to `node` until none fires.
    ///
    /// Returns `None` when no rule fired at all.
    pub fn rewrite_node(&self, node: &Arc<Node>) -> Result<Option<Arc<Node>>> {
        let mut current = node.clone();
        let mut iterations = 0;

        'fixed_point: loop {
            for rule in &self.rules {
                let Some(replacement) = rule.apply(&current) else { continue };
                if replacement.id() == current.id() {
                    continue;
                }

                iterations += 1;
                ensure!(
                    iterations <= self.max_iterations,
                    RewriteDivergedSnafu { node: node.name(), iterations: self.max_iterations }
                );
                trace!(rule = rule.name(), from = %current.name(), to = %replacement.name(), "rule fired");
                current = replacement;
                continue 'fixed_point;
            }
            break;
        }

        Ok((iterations > 0).then_some(current))
    }

    /// Rewrite every node of `function`.
    ///
    /// Returns a new function (with a fresh identity) when anything changed,
    /// `None` otherwise.
    pub fn run(&self, function: &Function) -> Result<Option<Arc<Function>>> {
        let mut replacements: HashMap<NodeId, Arc<Node>> = HashMap::new();

        for node in function.ops() {
            let inputs = node.inputs();
            let rebuilt = if inputs.iter().any(|input| replacements.contains_key(&input.id())) {
                let children: Vec<_> =
                    inputs.iter().map(|input| replacements.get(&input.id()).unwrap_or(*input).clone()).collect();
                node.with_children(&children)
            } else {
                node.clone()
            };

            let rewritten = match rebuilt.op() {
                Op::Parameter | Op::Result(_) => None,
                _ => self.rewrite_node(&rebuilt)?,
            };
            let replacement = rewritten.unwrap_or(rebuilt);

            if replacement.id() != node.id() {
                replacements.insert(node.id(), replacement);
            }
        }

        if replacements.is_empty() {
            return Ok(None);
        }

        let results: Vec<_> =
            function.results().iter().map(|r| replacements.get(&r.id()).unwrap_or(r).clone()).collect();
        let rewritten = Function::new(function.name(), results, function.parameters().to_vec())?;
        debug!(
            function = function.name(),
            from = %function.id(),
            to = %rewritten.id(),
            replaced = replacements.len(),
            "graph rewritten"
        );
        Ok(Some(rewritten))
    }
}
