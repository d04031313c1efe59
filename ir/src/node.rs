//! Graph nodes.
//!
//! A [`Node`] is immutable and shared through `Arc`. Every node gets a
//! process-unique [`NodeId`] at construction, so two structurally equal nodes
//! are still distinct graph values.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use kiln_dtype::{ConstValue, DType};
use smallvec::SmallVec;
use snafu::ensure;

use crate::error::*;
use crate::{BinaryOp, Op, PartialShape, UnaryOp};

static NODE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Process-unique node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NODE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub struct Node {
    id: NodeId,
    op: Op,
    dtype: DType,
    shape: PartialShape,
}

impl Node {
    fn new(op: Op, dtype: DType, shape: PartialShape) -> Arc<Self> {
        Arc::new(Self { id: NodeId::next(), op, dtype, shape })
    }

    pub fn parameter(dtype: DType, shape: impl Into<PartialShape>) -> Arc<Self> {
        Self::new(Op::Parameter, dtype, shape.into())
    }

    pub fn constant(value: ConstValue, dtype: DType, shape: impl Into<PartialShape>) -> Arc<Self> {
        Self::new(Op::Constant(value), dtype, shape.into())
    }

    pub fn try_unary(op: UnaryOp, src: Arc<Node>) -> Result<Arc<Self>> {
        let dtype = src.dtype;
        ensure!(!dtype.is_bool(), InvalidDTypeForUnaryOpSnafu { operation: op, dtype });
        ensure!(!op.requires_float() || dtype.is_float(), InvalidDTypeForUnaryOpSnafu { operation: op, dtype });
        ensure!(
            !(op == UnaryOp::Neg && dtype.is_unsigned()),
            InvalidDTypeForUnaryOpSnafu { operation: op, dtype }
        );

        let shape = src.shape.clone();
        Ok(Self::new(Op::Unary(op, src), dtype, shape))
    }

    pub fn try_binary(op: BinaryOp, lhs: Arc<Node>, rhs: Arc<Node>) -> Result<Arc<Self>> {
        ensure!(lhs.dtype == rhs.dtype, DTypeMismatchSnafu { operation: op, lhs: lhs.dtype, rhs: rhs.dtype });
        ensure!(!lhs.dtype.is_bool(), InvalidDTypeForBinaryOpSnafu { operation: op, dtype: lhs.dtype });
        ensure!(
            lhs.shape.compatible(&rhs.shape),
            ShapeMismatchSnafu { operation: op, lhs: lhs.shape.clone(), rhs: rhs.shape.clone() }
        );

        // Prefer whichever side carries more static information.
        let shape = if rhs.shape.is_static() && !lhs.shape.is_static() { rhs.shape.clone() } else { lhs.shape.clone() };
        let dtype = lhs.dtype;
        Ok(Self::new(Op::Binary(op, lhs, rhs), dtype, shape))
    }

    pub fn try_add(lhs: Arc<Node>, rhs: Arc<Node>) -> Result<Arc<Self>> {
        Self::try_binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn try_mul(lhs: Arc<Node>, rhs: Arc<Node>) -> Result<Arc<Self>> {
        Self::try_binary(BinaryOp::Mul, lhs, rhs)
    }

    pub fn result(src: Arc<Node>) -> Arc<Self> {
        let dtype = src.dtype;
        let shape = src.shape.clone();
        Self::new(Op::Result(src), dtype, shape)
    }

    pub fn custom(
        name: impl Into<String>,
        sources: impl IntoIterator<Item = Arc<Node>>,
        dtype: DType,
        shape: impl Into<PartialShape>,
    ) -> Arc<Self> {
        let op = Op::Custom { name: name.into(), sources: sources.into_iter().collect() };
        Self::new(op, dtype, shape.into())
    }

    /// Rebuild this node over new operands, keeping op, dtype and shape.
    ///
    /// The rebuilt node is a new graph value with its own identity.
    pub fn with_children(&self, children: &[Arc<Node>]) -> Arc<Self> {
        Self::new(self.op.with_children(children), self.dtype, self.shape.clone())
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn op(&self) -> &Op {
        &self.op
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &PartialShape {
        &self.shape
    }

    pub fn inputs(&self) -> SmallVec<[&Arc<Node>; 4]> {
        self.op.children()
    }

    /// Unique, human readable name: op name plus node id.
    pub fn name(&self) -> String {
        format!("{}_{}", self.op.name(), self.id)
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self.op, Op::Parameter)
    }

    /// The constant payload, if this is a constant node.
    pub fn as_constant(&self) -> Option<ConstValue> {
        match self.op {
            Op::Constant(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}{}>", self.name(), self.dtype, self.shape)
    }
}

/// All nodes reachable from `roots`, inputs before their users.
///
/// Iterative post-order DFS; deep chains do not grow the call stack.
pub fn toposort<'a>(roots: impl IntoIterator<Item = &'a Arc<Node>>) -> Vec<Arc<Node>> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut stack: Vec<(Arc<Node>, bool)> = roots.into_iter().map(|r| (r.clone(), false)).collect();
    stack.reverse();

    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            order.push(node);
            continue;
        }
        if !visited.insert(node.id()) {
            continue;
        }
        stack.push((node.clone(), true));
        for child in node.inputs().into_iter().rev() {
            if !visited.contains(&child.id()) {
                stack.push((child.clone(), false));
            }
        }
    }

    order
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
