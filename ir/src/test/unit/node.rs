use std::sync::Arc;

use test_case::test_case;

use crate::{BinaryOp, ConstValue, DType, Error, Node, Op, UnaryOp, toposort};

fn param(dtype: DType) -> Arc<Node> {
    Node::parameter(dtype, [2, 2])
}

#[test]
fn test_identity_not_structure() {
    let a = param(DType::Float32);
    let b = param(DType::Float32);

    assert_ne!(a.id(), b.id());
    assert_ne!(*a, *b);
    assert_eq!(*a, *a.clone());
}

#[test]
fn test_binary_dtype_mismatch() {
    let err = Node::try_add(param(DType::Float32), param(DType::Int32)).unwrap_err();
    assert!(matches!(err, Error::DTypeMismatch { operation: BinaryOp::Add, lhs: DType::Float32, rhs: DType::Int32 }));
}

#[test]
fn test_binary_shape_mismatch() {
    let a = Node::parameter(DType::Float32, [2, 2]);
    let b = Node::parameter(DType::Float32, [2, 3]);
    let err = Node::try_mul(a, b).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { operation: BinaryOp::Mul, .. }));
}

#[test]
fn test_binary_on_bool_rejected() {
    let err = Node::try_add(param(DType::Bool), param(DType::Bool)).unwrap_err();
    assert!(matches!(err, Error::InvalidDTypeForBinaryOp { .. }));
}

#[test_case(UnaryOp::Exp, DType::Int32, false; "exp_int")]
#[test_case(UnaryOp::Sqrt, DType::Int64, false; "sqrt_int")]
#[test_case(UnaryOp::Exp, DType::Float32, true; "exp_float")]
#[test_case(UnaryOp::Neg, DType::UInt32, false; "neg_unsigned")]
#[test_case(UnaryOp::Neg, DType::Int32, true; "neg_signed")]
#[test_case(UnaryOp::Abs, DType::Bool, false; "abs_bool")]
#[test_case(UnaryOp::Relu, DType::Float64, true; "relu_float")]
fn test_unary_dtype_validation(op: UnaryOp, dtype: DType, valid: bool) {
    assert_eq!(Node::try_unary(op, param(dtype)).is_ok(), valid);
}

#[test]
fn test_binary_prefers_static_shape() {
    let a = Node::parameter(DType::Float32, crate::PartialShape::new([crate::Dimension::Dynamic]));
    let b = Node::parameter(DType::Float32, [4]);
    let sum = Node::try_add(a, b).unwrap();
    assert!(sum.shape().same_as(&[4]));
}

#[test]
fn test_name_contains_op_and_id() {
    let a = param(DType::Float32);
    let neg = Node::try_unary(UnaryOp::Neg, a).unwrap();
    assert_eq!(neg.name(), format!("Neg_{}", neg.id()));
}

#[test]
fn test_with_children_is_new_value() {
    let a = param(DType::Float32);
    let b = param(DType::Float32);
    let c = param(DType::Float32);
    let sum = Node::try_add(a.clone(), b).unwrap();

    let rebuilt = sum.with_children(&[a.clone(), c.clone()]);
    assert_ne!(rebuilt.id(), sum.id());
    assert!(matches!(rebuilt.op(), Op::Binary(BinaryOp::Add, _, _)));
    let inputs = rebuilt.inputs();
    assert_eq!(inputs[0].id(), a.id());
    assert_eq!(inputs[1].id(), c.id());
}

#[test]
fn test_constant_payload() {
    let zero = Node::constant(ConstValue::Int(0), DType::Int32, [2, 2]);
    assert_eq!(zero.as_constant(), Some(ConstValue::Int(0)));
    assert!(param(DType::Int32).as_constant().is_none());
}

#[test]
fn test_toposort_inputs_before_users() {
    let a = param(DType::Float32);
    let b = param(DType::Float32);
    let sum = Node::try_add(a.clone(), b.clone()).unwrap();
    let prod = Node::try_mul(sum.clone(), a.clone()).unwrap();

    let order = toposort([&prod]);
    let position = |n: &Arc<Node>| order.iter().position(|o| o.id() == n.id()).unwrap();

    assert_eq!(order.len(), 4);
    assert!(position(&a) < position(&sum));
    assert!(position(&b) < position(&sum));
    assert!(position(&sum) < position(&prod));
}

#[test]
fn test_toposort_deep_chain() {
    let mut node = param(DType::Float32);
    for _ in 0..2_000 {
        node = Node::try_unary(UnaryOp::Neg, node).unwrap();
    }
    assert_eq!(toposort([&node]).len(), 2_001);
}
