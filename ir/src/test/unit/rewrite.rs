use std::sync::Arc;

use crate::pattern::{PatternGraph, predicates};
use crate::rewrite::{GraphRewrite, RewriteRule};
use crate::{BinaryOp, ConstValue, DType, Error, Function, Node, Op, UnaryOp};

fn add_zero_rule() -> RewriteRule {
    let mut g = PatternGraph::new();
    let x = g.label();
    let z = g.label_where(predicates::is_zero_constant());
    let root = g.binary(BinaryOp::Add, x, z);
    RewriteRule::new("add_zero", Arc::new(g), root, move |m| m.get(x).cloned())
}

fn double_neg_rule() -> RewriteRule {
    let mut g = PatternGraph::new();
    let x = g.label();
    let inner = g.unary(UnaryOp::Neg, x);
    let root = g.unary(UnaryOp::Neg, inner);
    RewriteRule::new("double_neg", Arc::new(g), root, move |m| m.get(x).cloned())
}

fn result_source(f: &Function) -> Arc<Node> {
    match f.results()[0].op() {
        Op::Result(src) => src.clone(),
        other => panic!("expected Result, got {other:?}"),
    }
}

#[test]
fn test_rewrite_replaces_and_rebuilds_users() {
    let a = Node::parameter(DType::Float32, [4]);
    let b = Node::parameter(DType::Float32, [4]);
    let zero = Node::constant(ConstValue::Float(0.0), DType::Float32, [4]);
    let sum = Node::try_add(a.clone(), zero).unwrap();
    let prod = Node::try_mul(sum, b.clone()).unwrap();
    let f = Function::new("f", vec![prod.clone()], vec![a.clone(), b.clone()]).unwrap();

    let rewritten = GraphRewrite::new().with_rule(add_zero_rule()).run(&f).unwrap().unwrap();

    assert_ne!(rewritten.id(), f.id());
    assert_eq!(rewritten.parameters().len(), 2);
    let new_prod = result_source(&rewritten);
    assert_ne!(new_prod.id(), prod.id());
    assert!(matches!(new_prod.op(), Op::Binary(BinaryOp::Mul, lhs, rhs) if lhs.id() == a.id() && rhs.id() == b.id()));
}

#[test]
fn test_unchanged_function_returns_none() {
    let a = Node::parameter(DType::Float32, [4]);
    let neg = Node::try_unary(UnaryOp::Neg, a.clone()).unwrap();
    let f = Function::new("f", vec![neg], vec![a]).unwrap();

    let rewrite = GraphRewrite::new().with_rule(add_zero_rule()).with_rule(double_neg_rule());
    assert!(rewrite.run(&f).unwrap().is_none());
}

#[test]
fn test_nested_rewrites_cascade() {
    let a = Node::parameter(DType::Float32, [4]);
    let mut node = a.clone();
    for _ in 0..4 {
        node = Node::try_unary(UnaryOp::Neg, node).unwrap();
    }
    let f = Function::new("f", vec![node], vec![a.clone()]).unwrap();

    let rewritten = GraphRewrite::new().with_rule(double_neg_rule()).run(&f).unwrap().unwrap();
    assert_eq!(result_source(&rewritten).id(), a.id());
}

#[test]
fn test_diverging_rule_is_bounded() {
    let mut g = PatternGraph::new();
    let x = g.label();
    let y = g.label();
    let root = g.binary(BinaryOp::Add, x, y);
    let swap = RewriteRule::new("swap", Arc::new(g), root, move |m| {
        Node::try_add(m.get(y)?.clone(), m.get(x)?.clone()).ok()
    });

    let a = Node::parameter(DType::Float32, [4]);
    let b = Node::parameter(DType::Float32, [4]);
    let sum = Node::try_add(a.clone(), b.clone()).unwrap();
    let f = Function::new("f", vec![sum], vec![a, b]).unwrap();

    let err = GraphRewrite::new().with_rule(swap).with_max_iterations(8).run(&f).unwrap_err();
    assert!(matches!(err, Error::RewriteDiverged { iterations: 8, .. }));
}

#[test]
fn test_declining_callback_keeps_node() {
    let mut g = PatternGraph::new();
    let root = g.label();
    let decline = RewriteRule::new("decline", Arc::new(g), root, |_| None);

    let a = Node::parameter(DType::Float32, [4]);
    let neg = Node::try_unary(UnaryOp::Neg, a.clone()).unwrap();
    let f = Function::new("f", vec![neg], vec![a]).unwrap();

    assert!(GraphRewrite::new().with_rule(decline).run(&f).unwrap().is_none());
}
