use std::sync::Arc;

use crate::pattern::{PatternGraph, RecurrentMatcher};
use crate::{BinaryOp, DType, Node, UnaryOp};

fn param() -> Arc<Node> {
    Node::parameter(DType::Float32, [8])
}

fn accumulate_pattern() -> (PatternGraph, crate::PatternId, crate::PatternId, crate::PatternId) {
    let mut g = PatternGraph::new();
    let prev = g.label();
    let weight = g.label();
    let root = g.binary(BinaryOp::Add, prev, weight);
    (g, root, prev, weight)
}

#[test]
fn test_follows_chain() {
    let a = param();
    let w = param();
    let mut chain = a.clone();
    for _ in 0..3 {
        chain = Node::try_add(chain, w.clone()).unwrap();
    }

    let (g, root, prev, weight) = accumulate_pattern();
    let result = RecurrentMatcher::new(&g, root, prev, [weight]).match_chain(&chain);

    assert_eq!(result.len(), 3);
    assert!(result.bound_values(weight).iter().all(|v| v.id() == w.id()));
    assert_eq!(result.rounds()[2][&prev].id(), a.id());
}

#[test]
fn test_correlated_nodes_must_agree() {
    let a = param();
    let w1 = param();
    let w2 = param();
    let inner = Node::try_add(a, w2).unwrap();
    let outer = Node::try_add(inner.clone(), w1.clone()).unwrap();

    let (g, root, prev, weight) = accumulate_pattern();

    let correlated = RecurrentMatcher::new(&g, root, prev, [weight]).match_chain(&outer);
    assert_eq!(correlated.len(), 1);
    assert_eq!(correlated.rounds()[0][&prev].id(), inner.id());

    let uncorrelated = RecurrentMatcher::new(&g, root, prev, []).match_chain(&outer);
    assert_eq!(uncorrelated.len(), 2);
}

#[test]
fn test_correlated_op_node_must_agree() {
    let a = param();
    let inner_neg = Node::try_unary(UnaryOp::Neg, param()).unwrap();
    let outer_neg = Node::try_unary(UnaryOp::Neg, param()).unwrap();
    let inner = Node::try_add(a.clone(), inner_neg).unwrap();
    let outer = Node::try_add(inner.clone(), outer_neg.clone()).unwrap();

    let mut g = PatternGraph::new();
    let prev = g.label();
    let w = g.label();
    let neg = g.unary(UnaryOp::Neg, w);
    let root = g.binary(BinaryOp::Add, prev, neg);

    let correlated = RecurrentMatcher::new(&g, root, prev, [neg]).match_chain(&outer);
    assert_eq!(correlated.len(), 1);
    assert_eq!(correlated.rounds()[0][&neg].id(), outer_neg.id());

    let shared = Node::try_add(Node::try_add(a, outer_neg.clone()).unwrap(), outer_neg).unwrap();
    assert_eq!(RecurrentMatcher::new(&g, root, prev, [neg]).match_chain(&shared).len(), 2);
    assert_eq!(RecurrentMatcher::new(&g, root, prev, []).match_chain(&outer).len(), 2);
}

#[test]
fn test_no_match_is_empty() {
    let (g, root, prev, weight) = accumulate_pattern();
    let result = RecurrentMatcher::new(&g, root, prev, [weight]).match_chain(&param());
    assert!(result.is_empty());
}
