//! Operation catalog.
//!
//! Each [`Op`] variant carries its operands inline, so operand count is fixed
//! by the variant. The catalog is deliberately small: backends and passes only
//! need enough structure to lower, match, and rewrite graphs.

use std::sync::Arc;

use kiln_dtype::ConstValue;
use smallvec::SmallVec;

use crate::node::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum UnaryOp {
    Neg,
    Abs,
    Relu,
    Exp,
    Sqrt,
}

impl UnaryOp {
    /// Whether the op is only defined for floating point elements.
    pub const fn requires_float(&self) -> bool {
        matches!(self, UnaryOp::Exp | UnaryOp::Sqrt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Max,
    Min,
}

impl BinaryOp {
    pub const fn is_commutative(&self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Mul | BinaryOp::Max | BinaryOp::Min)
    }
}

/// Operation with typed operands.
#[derive(Debug, Clone)]
pub enum Op {
    /// Function input, bound positionally through the function's parameter list.
    Parameter,
    /// Scalar value broadcast to the node's shape.
    Constant(ConstValue),
    Unary(UnaryOp, Arc<Node>),
    Binary(BinaryOp, Arc<Node>, Arc<Node>),
    /// Function output marker.
    Result(Arc<Node>),
    /// Operation opaque to the core; no built-in backend executes it.
    Custom { name: String, sources: SmallVec<[Arc<Node>; 4]> },
}

/// Operation kind without operands, used for filtering and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Parameter,
    Constant,
    Unary(UnaryOp),
    Binary(BinaryOp),
    Result,
    Custom,
}

impl Op {
    pub fn kind(&self) -> OpKind {
        match self {
            Op::Parameter => OpKind::Parameter,
            Op::Constant(_) => OpKind::Constant,
            Op::Unary(op, _) => OpKind::Unary(*op),
            Op::Binary(op, _, _) => OpKind::Binary(*op),
            Op::Result(_) => OpKind::Result,
            Op::Custom { .. } => OpKind::Custom,
        }
    }

    /// Operands in positional order.
    pub fn children(&self) -> SmallVec<[&Arc<Node>; 4]> {
        match self {
            Op::Parameter | Op::Constant(_) => SmallVec::new(),
            Op::Unary(_, src) | Op::Result(src) => smallvec::smallvec![src],
            Op::Binary(_, lhs, rhs) => smallvec::smallvec![lhs, rhs],
            Op::Custom { sources, .. } => sources.iter().collect(),
        }
    }

    /// Same operation over new operands.
    ///
    /// Panics if `children` does not have the variant's arity.
    pub fn with_children(&self, children: &[Arc<Node>]) -> Op {
        match self {
            Op::Parameter | Op::Constant(_) => self.clone(),
            Op::Unary(op, _) => Op::Unary(*op, children[0].clone()),
            Op::Binary(op, _, _) => Op::Binary(*op, children[0].clone(), children[1].clone()),
            Op::Result(_) => Op::Result(children[0].clone()),
            Op::Custom { name, .. } => Op::Custom { name: name.clone(), sources: children.iter().cloned().collect() },
        }
    }

    /// Short name used for node names and performance counters.
    pub fn name(&self) -> String {
        match self {
            Op::Parameter => "Parameter".to_string(),
            Op::Constant(_) => "Constant".to_string(),
            Op::Unary(op, _) => op.to_string(),
            Op::Binary(op, _, _) => op.to_string(),
            Op::Result(_) => "Result".to_string(),
            Op::Custom { name, .. } => name.clone(),
        }
    }
}
