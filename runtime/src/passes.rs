//! Graph passes run before lowering.

use std::sync::Arc;

use kiln_dtype::DType;
use kiln_ir::pattern::{NodePredicate, PatternGraph, predicates};
use kiln_ir::{BinaryOp, Function, GraphRewrite, RewriteRule, UnaryOp};
use snafu::ResultExt;
use tracing::debug;

use crate::config::PassConfig;
use crate::error::*;

/// A function-to-function transformation.
pub trait Pass: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the pass runs when the configuration does not mention it.
    fn enabled_by_default(&self) -> bool {
        true
    }

    /// Returns the transformed function, or `None` when nothing changed.
    fn run(&self, function: &Arc<Function>, config: &PassConfig) -> Result<Option<Arc<Function>>>;
}

/// Ordered pass pipeline.
#[derive(Default)]
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl PassManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pipeline used by built-in backends.
    pub fn default_pipeline() -> Self {
        Self::new().with_pass(AlgebraicSimplification)
    }

    pub fn with_pass(mut self, pass: impl Pass + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn add_pass(&mut self, pass: impl Pass + 'static) {
        self.passes.push(Box::new(pass));
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run every enabled pass in order. Returns `function` itself if no pass changed it.
    pub fn run(&self, function: &Arc<Function>, config: &PassConfig) -> Result<Arc<Function>> {
        let mut current = Arc::clone(function);
        for pass in &self.passes {
            if !config.is_enabled(pass.name(), pass.enabled_by_default()) {
                debug!(pass = pass.name(), "pass disabled");
                continue;
            }
            if let Some(next) = pass.run(&current, config)? {
                debug!(pass = pass.name(), function = current.name(), "pass changed function");
                current = next;
            }
        }
        Ok(current)
    }
}

impl std::fmt::Debug for PassManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.pass_names()).finish()
    }
}

/// Removes arithmetic identities: `x + 0`, `x * 1`, `x - 0`, `x / 1`, `-(-x)`.
///
/// Float zeros are matched by sign: only `x + (-0.0)` and `x - (+0.0)` return
/// `x` bit for bit, since `-0.0 + 0.0` is `+0.0`.
///
/// The rewrite bound per node can be set with the
/// `AlgebraicSimplification.max_iterations` attribute.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlgebraicSimplification;

impl AlgebraicSimplification {
    pub const NAME: &'static str = "AlgebraicSimplification";

    fn identity_rule(name: &str, op: BinaryOp, identity: NodePredicate) -> RewriteRule {
        let mut g = PatternGraph::new();
        let x = g.label();
        let constant = g.label_where(identity);
        let root = g.binary(op, x, constant);
        RewriteRule::new(name, Arc::new(g), root, move |m| m.get(x).cloned())
    }

    fn double_negation_rule() -> RewriteRule {
        let mut g = PatternGraph::new();
        let x = g.label();
        let inner = g.unary(UnaryOp::Neg, x);
        let root = g.unary(UnaryOp::Neg, inner);
        RewriteRule::new("neg_neg", Arc::new(g), root, move |m| m.get(x).cloned())
    }

    /// Zero constant of the given sign. Integer zeros have no sign and always match.
    fn signed_zero(negative: bool) -> NodePredicate {
        Arc::new(move |node| {
            node.as_constant().is_some_and(|value| match node.dtype() {
                DType::Float32 => {
                    let zero = if negative { -0.0f32 } else { 0.0 };
                    value.to_bytes(DType::Float32) == zero.to_ne_bytes()
                }
                DType::Float64 => {
                    let zero = if negative { -0.0f64 } else { 0.0 };
                    value.to_bytes(DType::Float64) == zero.to_ne_bytes()
                }
                _ => value.is_zero(),
            })
        })
    }

    pub fn rewrite() -> GraphRewrite {
        use predicates::is_one_constant;

        GraphRewrite::new()
            .with_rule(Self::identity_rule("add_zero", BinaryOp::Add, Self::signed_zero(true)))
            .with_rule(Self::identity_rule("mul_one", BinaryOp::Mul, is_one_constant()))
            .with_rule(Self::identity_rule("sub_zero", BinaryOp::Sub, Self::signed_zero(false)))
            .with_rule(Self::identity_rule("div_one", BinaryOp::Div, is_one_constant()))
            .with_rule(Self::double_negation_rule())
    }
}

impl Pass for AlgebraicSimplification {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, function: &Arc<Function>, config: &PassConfig) -> Result<Option<Arc<Function>>> {
        let mut rewrite = Self::rewrite();
        let limit = config.attribute("AlgebraicSimplification.max_iterations").and_then(|v| v.parse::<usize>().ok());
        if let Some(limit) = limit {
            rewrite = rewrite.with_max_iterations(limit);
        }
        rewrite.run(function).context(PipelineSnafu { stage: Self::NAME })
    }
}
