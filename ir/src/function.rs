//! Immutable computation graphs.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use snafu::ensure;

use crate::error::*;
use crate::node::{Node, toposort};
use crate::Op;

static FUNCTION_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Function identity. Compile caches key on this, never on graph structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(u64);

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Computation graph with ordered parameters and ordered results.
#[derive(Debug)]
pub struct Function {
    id: FunctionId,
    name: String,
    parameters: Vec<Arc<Node>>,
    results: Vec<Arc<Node>>,
}

impl Function {
    /// Build a function from its outputs and inputs.
    ///
    /// Result nodes that are not already `Result` ops are wrapped in one. Every
    /// parameter reachable from the results must appear in `parameters`.
    pub fn new(name: impl Into<String>, results: Vec<Arc<Node>>, parameters: Vec<Arc<Node>>) -> Result<Arc<Self>> {
        let name = name.into();

        for parameter in &parameters {
            ensure!(parameter.is_parameter(), NotAParameterSnafu { function: name.clone(), node: parameter.name() });
        }

        let results: Vec<_> =
            results.into_iter().map(|r| if matches!(r.op(), Op::Result(_)) { r } else { Node::result(r) }).collect();

        let listed: HashSet<_> = parameters.iter().map(|p| p.id()).collect();
        for node in toposort(&results) {
            ensure!(
                !node.is_parameter() || listed.contains(&node.id()),
                UnboundParameterSnafu { function: name.clone(), node: node.name() }
            );
        }

        let id = FunctionId(FUNCTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed));
        Ok(Arc::new(Self { id, name, parameters, results }))
    }

    pub fn id(&self) -> FunctionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[Arc<Node>] {
        &self.parameters
    }

    pub fn results(&self) -> &[Arc<Node>] {
        &self.results
    }

    /// Every node of the graph, inputs before users.
    ///
    /// Unused parameters are included, after the nodes reachable from the results.
    pub fn ops(&self) -> Vec<Arc<Node>> {
        let mut ops = toposort(&self.results);
        let seen: HashSet<_> = ops.iter().map(|n| n.id()).collect();
        ops.extend(self.parameters.iter().filter(|p| !seen.contains(&p.id())).cloned());
        ops
    }

    /// Position of `node` in the parameter list.
    pub fn parameter_index(&self, node: &Node) -> Option<usize> {
        self.parameters.iter().position(|p| p.id() == node.id())
    }
}
