use std::collections::BTreeMap;
use std::sync::Arc;

use kiln_dtype::{ConstValue, DType};
use kiln_ir::{BinaryOp, Function, Node, Op, UnaryOp};
use test_case::test_case;

use crate::config::{parse_attributes, parse_enables};
use crate::{AlgebraicSimplification, Backend, CpuBackend, Error, ErrorKind, Pass, PassConfig, PassManager};

use super::{f32_bytes, f32_values};

fn result_source(function: &Function) -> Arc<Node> {
    match function.results()[0].op() {
        Op::Result(src) => src.clone(),
        other => panic!("expected Result, got {other:?}"),
    }
}

/// `(x + -0.0) * 1` with the constant on the side given by `zero_first`.
fn identity_chain(zero_first: bool) -> (Arc<Function>, Arc<Node>) {
    let x = Node::parameter(DType::Float32, [3]);
    let zero = Node::constant(ConstValue::Float(-0.0), DType::Float32, [3]);
    let one = Node::constant(ConstValue::Float(1.0), DType::Float32, [3]);
    let sum = if zero_first { Node::try_add(zero, x.clone()) } else { Node::try_add(x.clone(), zero) }.unwrap();
    let prod = Node::try_mul(sum, one).unwrap();
    (Function::new("identity", vec![prod], vec![x.clone()]).unwrap(), x)
}

#[test_case(false; "zero_rhs")]
#[test_case(true; "zero_lhs")]
fn test_simplification_removes_identities(zero_first: bool) {
    let (function, x) = identity_chain(zero_first);
    let simplified = AlgebraicSimplification.run(&function, &PassConfig::default()).unwrap().unwrap();
    assert_ne!(simplified.id(), function.id());
    assert_eq!(result_source(&simplified).id(), x.id());
}

#[test_case(BinaryOp::Add, 0.0, false; "add_positive_zero")]
#[test_case(BinaryOp::Add, -0.0, true; "add_negative_zero")]
#[test_case(BinaryOp::Sub, 0.0, true; "sub_positive_zero")]
#[test_case(BinaryOp::Sub, -0.0, false; "sub_negative_zero")]
fn test_simplification_float_zero_sign(op: BinaryOp, zero: f64, removed: bool) {
    let x = Node::parameter(DType::Float64, [2]);
    let zero = Node::constant(ConstValue::Float(zero), DType::Float64, [2]);
    let out = Node::try_binary(op, x.clone(), zero).unwrap();
    let function = Function::new("f", vec![out], vec![x]).unwrap();

    let simplified = AlgebraicSimplification.run(&function, &PassConfig::default()).unwrap();
    assert_eq!(simplified.is_some(), removed);
}

#[test]
fn test_negative_zero_plus_zero_is_positive_zero() {
    let x = Node::parameter(DType::Float32, [1]);
    let zero = Node::constant(ConstValue::Float(0.0), DType::Float32, [1]);
    let sum = Node::try_add(x.clone(), zero).unwrap();
    let function = Function::new("add_zero", vec![sum], vec![x]).unwrap();

    let mut disabled = PassConfig::default();
    disabled.set_enabled(AlgebraicSimplification::NAME, false);

    for config in [PassConfig::default(), disabled] {
        let exe = CpuBackend::default().compile(&function, &config, false).unwrap();
        let mut input = exe.create_input_tensor(0).unwrap();
        input.write(&f32_bytes(&[-0.0])).unwrap();
        let mut out = exe.create_output_tensor(0).unwrap();
        assert!(exe.call(std::slice::from_mut(&mut out), &[input]).unwrap());
        assert_eq!(f32_values(out.as_bytes())[0].to_bits(), 0.0f32.to_bits());
    }
}

#[test]
fn test_simplification_double_negation_and_division() {
    let x = Node::parameter(DType::Int64, [2]);
    let one = Node::constant(ConstValue::Int(1), DType::Int64, [2]);
    let zero = Node::constant(ConstValue::Int(0), DType::Int64, [2]);
    let neg = Node::try_unary(UnaryOp::Neg, x.clone()).unwrap();
    let negneg = Node::try_unary(UnaryOp::Neg, neg).unwrap();
    let div = Node::try_binary(BinaryOp::Div, negneg, one).unwrap();
    let sub = Node::try_binary(BinaryOp::Sub, div, zero).unwrap();
    let function = Function::new("f", vec![sub], vec![x.clone()]).unwrap();

    let simplified = AlgebraicSimplification.run(&function, &PassConfig::default()).unwrap().unwrap();
    assert_eq!(result_source(&simplified).id(), x.id());
}

#[test]
fn test_simplification_leaves_other_graphs_alone() {
    let x = Node::parameter(DType::Float32, [3]);
    let two = Node::constant(ConstValue::Float(2.0), DType::Float32, [3]);
    let prod = Node::try_mul(x.clone(), two).unwrap();
    let function = Function::new("f", vec![prod], vec![x]).unwrap();
    assert!(AlgebraicSimplification.run(&function, &PassConfig::default()).unwrap().is_none());
}

#[test]
fn test_simplification_iteration_limit_surfaces_as_pipeline_error() {
    let (function, _) = identity_chain(false);
    let mut config = PassConfig::default();
    config.set_attribute("AlgebraicSimplification.max_iterations", "0");

    let err = CpuBackend::default().compile(&function, &config, false).unwrap_err();
    assert!(matches!(&err, Error::Pipeline { stage, .. } if stage == AlgebraicSimplification::NAME));
    assert_eq!(err.kind(), ErrorKind::ExternalPipeline);
}

#[test]
fn test_manager_skips_disabled_pass() {
    let (function, _) = identity_chain(false);
    let manager = PassManager::default_pipeline();
    assert_eq!(manager.pass_names(), vec![AlgebraicSimplification::NAME]);

    let mut config = PassConfig::default();
    config.set_enabled(AlgebraicSimplification::NAME, false);
    assert!(Arc::ptr_eq(&manager.run(&function, &config).unwrap(), &function));

    config.set_enabled(AlgebraicSimplification::NAME, true);
    assert!(!Arc::ptr_eq(&manager.run(&function, &config).unwrap(), &function));
}

#[test]
fn test_simplified_executable_keeps_declared_signature() {
    let (function, x) = identity_chain(false);
    let exe = CpuBackend::default().compile(&function, &PassConfig::default(), false).unwrap();
    assert!(Arc::ptr_eq(exe.function(), &function));
    assert_eq!(exe.get_parameter(0).unwrap().id(), x.id());

    let mut input = exe.create_input_tensor(0).unwrap();
    input.write(&f32_bytes(&[1.0, -2.0, 3.5])).unwrap();
    let mut out = exe.create_output_tensor(0).unwrap();
    assert!(exe.call(std::slice::from_mut(&mut out), &[input]).unwrap());
    assert_eq!(f32_values(out.as_bytes()), vec![1.0, -2.0, 3.5]);
}

#[test]
fn test_parse_enables() {
    let enables = parse_enables("A:1; B:0;C ;D:off;E:False;;");
    let expected: BTreeMap<String, bool> =
        [("A", true), ("B", false), ("C", true), ("D", false), ("E", false)].map(|(k, v)| (k.to_string(), v)).into();
    assert_eq!(enables, expected);
}

#[test]
fn test_parse_attributes() {
    let attributes = parse_attributes("k=v; spaced = 3 ;broken;=orphan");
    assert_eq!(attributes.len(), 2);
    assert_eq!(attributes["k"], "v");
    assert_eq!(attributes["spaced"], "3");
}

#[test]
fn test_pass_config_builder() {
    let config = PassConfig::builder()
        .enables([("Fusion".to_string(), false)].into())
        .attributes([("Fusion.depth".to_string(), "2".to_string())].into())
        .build();
    assert!(!config.is_enabled("Fusion", true));
    assert!(config.is_enabled("Other", true));
    assert!(!config.is_enabled("Other", false));
    assert_eq!(config.attribute("Fusion.depth"), Some("2"));
    assert_eq!(config.attribute("missing"), None);

    assert_eq!(PassConfig::builder().build(), PassConfig::default());
}
