//! Proptest strategies for graphs.

use std::sync::Arc;

use proptest::prelude::*;

use crate::{BinaryOp, DType, Node, UnaryOp};

pub fn arb_binary_op() -> impl Strategy<Value = BinaryOp> {
    prop_oneof![
        Just(BinaryOp::Add),
        Just(BinaryOp::Sub),
        Just(BinaryOp::Mul),
        Just(BinaryOp::Div),
        Just(BinaryOp::Max),
        Just(BinaryOp::Min),
    ]
}

pub fn arb_unary_op() -> impl Strategy<Value = UnaryOp> {
    prop_oneof![
        Just(UnaryOp::Neg),
        Just(UnaryOp::Abs),
        Just(UnaryOp::Relu),
        Just(UnaryOp::Exp),
        Just(UnaryOp::Sqrt),
    ]
}

/// Step in a randomly built float graph. Every step consumes the last node;
/// binary steps pair it with node `i` (modulo the node count).
#[derive(Debug, Clone)]
pub enum Step {
    Unary(UnaryOp),
    Binary(BinaryOp, usize),
}

pub fn arb_steps(max: usize) -> impl Strategy<Value = Vec<Step>> {
    let step = prop_oneof![
        arb_unary_op().prop_map(Step::Unary),
        (arb_binary_op(), any::<usize>()).prop_map(|(op, i)| Step::Binary(op, i)),
    ];
    prop::collection::vec(step, 1..max)
}

/// Build a float graph over `parameters` following `steps`. Returns every node built.
pub fn build_graph(parameters: &[Arc<Node>], steps: &[Step]) -> Vec<Arc<Node>> {
    let mut nodes: Vec<Arc<Node>> = parameters.to_vec();
    for step in steps {
        let last = nodes[nodes.len() - 1].clone();
        let node = match step {
            Step::Unary(op) => Node::try_unary(*op, last),
            Step::Binary(op, i) => Node::try_binary(*op, last, nodes[i % nodes.len()].clone()),
        }
        .expect("float graphs of equal shapes are always valid");
        nodes.push(node);
    }
    nodes
}

pub fn float_parameters(count: usize) -> Vec<Arc<Node>> {
    (0..count).map(|_| Node::parameter(DType::Float32, [4])).collect()
}
