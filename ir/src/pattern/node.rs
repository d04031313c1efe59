//! Pattern graphs.
//!
//! A [`PatternGraph`] is an arena of [`PatternNode`]s addressed by [`PatternId`].
//! Once built it is read-only and can be shared between any number of
//! concurrent [`Matcher`]s.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::error::*;
use crate::pattern::matcher::Matcher;
use crate::{BinaryOp, Node, Op, OpKind, UnaryOp};

/// Predicate over graph values.
pub type NodePredicate = Arc<dyn Fn(&Node) -> bool + Send + Sync>;

/// Stable index of a node inside its [`PatternGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternId(u32);

impl PatternId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Filter for matching operation types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpFilter {
    /// Match specific unary operations
    Unary(Vec<UnaryOp>),
    /// Match specific binary operations
    Binary(Vec<BinaryOp>),
    /// Match one operation kind exactly
    Kind(OpKind),
}

impl OpFilter {
    pub fn matches(&self, op: &Op) -> bool {
        match (self, op) {
            (OpFilter::Unary(ops), Op::Unary(op, _)) => ops.contains(op),
            (OpFilter::Binary(ops), Op::Binary(op, _, _)) => ops.contains(op),
            (OpFilter::Kind(kind), op) => op.kind() == *kind,
            _ => false,
        }
    }
}

pub enum PatternNode {
    /// Binds any value accepted by `predicate`; later encounters must see the same value.
    Label { predicate: Option<NodePredicate>, inner: Option<PatternId> },
    /// Value accepted by `predicate` whose inputs match `inputs` positionally.
    Any { predicate: NodePredicate, inputs: Vec<PatternId> },
    /// Value accepted by `predicate` with at least one input matching `input`.
    AnyOf { predicate: NodePredicate, input: PatternId },
    /// Value whose operation passes `filter` and whose inputs match `inputs`.
    Op { filter: OpFilter, inputs: Vec<PatternId> },
    /// First alternative that matches, in declaration order.
    Or { alternatives: Vec<PatternId> },
    /// Steps over a value accepted by `predicate` to its first input.
    Skip { predicate: NodePredicate, input: PatternId },
    /// Checkpoints the current bindings and resets all but `static_nodes`.
    Capture { input: PatternId, static_nodes: BTreeSet<PatternId> },
    /// Matches anything, binds nothing.
    True,
}

impl PatternNode {
    /// Try to match `value` against this node, which sits at `id` in the matcher's graph.
    ///
    /// Bindings made by a failed attempt are rolled back before returning `false`.
    pub fn match_value(&self, matcher: &mut Matcher<'_>, id: PatternId, value: &Arc<Node>) -> bool {
        match self {
            PatternNode::Label { predicate, inner } => {
                if let Some(bound) = matcher.get(id) {
                    return bound.id() == value.id();
                }
                if let Some(predicate) = predicate
                    && !predicate(value)
                {
                    return false;
                }

                let saved = matcher.save();
                matcher.bind(id, value);
                if let Some(inner) = inner
                    && !matcher.match_value(*inner, value)
                {
                    matcher.restore(saved);
                    return false;
                }
                true
            }

            PatternNode::Any { predicate, inputs } => {
                if !predicate(value) {
                    return false;
                }
                let saved = matcher.save();
                if !matcher.match_inputs(inputs, &value.inputs()) {
                    matcher.restore(saved);
                    return false;
                }
                matcher.bind(id, value);
                true
            }

            PatternNode::AnyOf { predicate, input } => {
                if !predicate(value) {
                    return false;
                }
                for child in value.inputs() {
                    let saved = matcher.save();
                    if matcher.match_value(*input, child) {
                        matcher.bind(id, value);
                        return true;
                    }
                    matcher.restore(saved);
                }
                false
            }

            PatternNode::Op { filter, inputs } => {
                if !filter.matches(value.op()) {
                    return false;
                }
                let children = value.inputs();

                let saved = matcher.save();
                if matcher.match_inputs(inputs, &children) {
                    matcher.bind(id, value);
                    return true;
                }
                matcher.restore(saved.clone());

                if let Op::Binary(op, lhs, rhs) = value.op()
                    && op.is_commutative()
                    && inputs.len() == 2
                {
                    tracing::trace!(pattern = id.index(), node = %value.name(), "trying swapped operands");
                    if matcher.match_inputs(inputs, &[rhs, lhs]) {
                        matcher.bind(id, value);
                        return true;
                    }
                    matcher.restore(saved);
                }
                false
            }

            PatternNode::Or { alternatives } => {
                for alternative in alternatives {
                    let saved = matcher.save();
                    if matcher.match_value(*alternative, value) {
                        matcher.bind(id, value);
                        return true;
                    }
                    matcher.restore(saved);
                }
                false
            }

            PatternNode::Skip { predicate, input } => {
                let target = if predicate(value) { value.inputs().first().copied().cloned() } else { None };
                matcher.match_value(*input, target.as_ref().unwrap_or(value))
            }

            PatternNode::Capture { static_nodes, .. } => {
                matcher.capture(static_nodes);
                true
            }

            PatternNode::True => true,
        }
    }
}

impl fmt::Debug for PatternNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternNode::Label { predicate, inner } => f
                .debug_struct("Label")
                .field("predicate", &predicate.is_some())
                .field("inner", inner)
                .finish(),
            PatternNode::Any { inputs, .. } => f.debug_struct("Any").field("inputs", inputs).finish(),
            PatternNode::AnyOf { input, .. } => f.debug_struct("AnyOf").field("input", input).finish(),
            PatternNode::Op { filter, inputs } => {
                f.debug_struct("Op").field("filter", filter).field("inputs", inputs).finish()
            }
            PatternNode::Or { alternatives } => f.debug_struct("Or").field("alternatives", alternatives).finish(),
            PatternNode::Skip { input, .. } => f.debug_struct("Skip").field("input", input).finish(),
            PatternNode::Capture { input, static_nodes } => {
                f.debug_struct("Capture").field("input", input).field("static_nodes", static_nodes).finish()
            }
            PatternNode::True => f.write_str("True"),
        }
    }
}

/// Arena of pattern nodes.
///
/// # Example
///
/// ```ignore
/// // Match: x + 0
/// let mut g = PatternGraph::new();
/// let x = g.label();
/// let zero = g.label_where(predicates::is_zero_constant());
/// let root = g.binary(BinaryOp::Add, x, zero);
/// ```
#[derive(Debug, Default)]
pub struct PatternGraph {
    nodes: Vec<PatternNode>,
}

impl PatternGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: PatternNode) -> PatternId {
        let id = PatternId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Panics if `id` comes from another graph with more nodes.
    pub fn node(&self, id: PatternId) -> &PatternNode {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = PatternId> + '_ {
        (0..self.nodes.len() as u32).map(PatternId)
    }

    /// Label accepting any value.
    pub fn label(&mut self) -> PatternId {
        self.push(PatternNode::Label { predicate: None, inner: None })
    }

    pub fn label_where(&mut self, predicate: NodePredicate) -> PatternId {
        self.push(PatternNode::Label { predicate: Some(predicate), inner: None })
    }

    /// Label binding the value that `inner` matches.
    pub fn label_wrapping(&mut self, predicate: Option<NodePredicate>, inner: PatternId) -> PatternId {
        self.push(PatternNode::Label { predicate, inner: Some(inner) })
    }

    pub fn any(&mut self, predicate: NodePredicate, inputs: Vec<PatternId>) -> PatternId {
        self.push(PatternNode::Any { predicate, inputs })
    }

    pub fn any_of(&mut self, predicate: NodePredicate, input: PatternId) -> PatternId {
        self.push(PatternNode::AnyOf { predicate, input })
    }

    pub fn op(&mut self, filter: OpFilter, inputs: Vec<PatternId>) -> PatternId {
        self.push(PatternNode::Op { filter, inputs })
    }

    pub fn unary(&mut self, op: UnaryOp, src: PatternId) -> PatternId {
        self.op(OpFilter::Unary(vec![op]), vec![src])
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: PatternId, rhs: PatternId) -> PatternId {
        self.op(OpFilter::Binary(vec![op]), vec![lhs, rhs])
    }

    pub fn or(&mut self, alternatives: Vec<PatternId>) -> PatternId {
        self.push(PatternNode::Or { alternatives })
    }

    pub fn skip(&mut self, predicate: NodePredicate, input: PatternId) -> PatternId {
        self.push(PatternNode::Skip { predicate, input })
    }

    pub fn capture(&mut self, input: PatternId, static_nodes: impl IntoIterator<Item = PatternId>) -> PatternId {
        self.push(PatternNode::Capture { input, static_nodes: static_nodes.into_iter().collect() })
    }

    pub fn always(&mut self) -> PatternId {
        self.push(PatternNode::True)
    }

    /// Replace the static set of an existing capture node.
    pub fn set_static_nodes(
        &mut self,
        capture: PatternId,
        static_nodes: impl IntoIterator<Item = PatternId>,
    ) -> Result<()> {
        match self.nodes.get_mut(capture.index()) {
            Some(PatternNode::Capture { static_nodes: current, .. }) => {
                *current = static_nodes.into_iter().collect();
                Ok(())
            }
            _ => NotACaptureSnafu { index: capture.index() }.fail(),
        }
    }
}

/// Common predicates.
pub mod predicates {
    use std::sync::Arc;

    use kiln_dtype::{ConstValue, DType};

    use super::NodePredicate;

    pub fn any() -> NodePredicate {
        Arc::new(|_| true)
    }

    pub fn has_dtype(dtype: DType) -> NodePredicate {
        Arc::new(move |node| node.dtype() == dtype)
    }

    pub fn has_static_shape() -> NodePredicate {
        Arc::new(|node| node.shape().is_static())
    }

    pub fn is_parameter() -> NodePredicate {
        Arc::new(|node| node.is_parameter())
    }

    pub fn is_constant() -> NodePredicate {
        Arc::new(|node| node.as_constant().is_some())
    }

    pub fn constant_where(f: impl Fn(ConstValue) -> bool + Send + Sync + 'static) -> NodePredicate {
        Arc::new(move |node| node.as_constant().is_some_and(&f))
    }

    pub fn is_zero_constant() -> NodePredicate {
        constant_where(|c| c.is_zero())
    }

    pub fn is_one_constant() -> NodePredicate {
        constant_where(|c| c.is_one())
    }
}
