//! Reference CPU call frame.
//!
//! Lowering turns a function into a flat list of steps in topological order.
//! Every intermediate node gets its own scratch slot; parameters are read
//! straight from the input views. Results are copied into the output views
//! only after every compute step succeeded, so a numeric fault leaves the
//! outputs untouched.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use kiln_device::TensorView;
use kiln_dtype::DType;
use kiln_ir::{BinaryOp, Function, Node, NodeId, Op, UnaryOp, element_count};
use snafu::OptionExt;

use super::cpu::CpuBackend;
use crate::error::*;
use crate::executable::{CallFrame, OpTimer};

type UnaryKernel = fn(UnaryOp, &[u8], &mut [u8]) -> bool;
type BinaryKernel = fn(BinaryOp, &[u8], &[u8], &mut [u8]) -> bool;

/// Where a step reads its operand from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Parameter(usize),
    Slot(usize),
}

#[derive(Debug)]
enum Step {
    Fill { dst: usize, element: Vec<u8> },
    Unary { op: UnaryOp, kernel: UnaryKernel, src: Source, dst: usize },
    Binary { op: BinaryOp, kernel: BinaryKernel, lhs: Source, rhs: Source, dst: usize },
}

#[derive(Debug)]
struct TimedStep {
    name: String,
    step: Step,
}

#[derive(Debug)]
pub struct CpuCallFrame {
    steps: Vec<TimedStep>,
    slot_sizes: Vec<usize>,
    outputs: Vec<Source>,
}

impl CpuCallFrame {
    /// Lower `function` into steps. Every node must already be supported by the CPU backend.
    pub fn lower(function: &Function) -> Result<Self> {
        let mut sources: HashMap<NodeId, Source> = HashMap::new();
        let mut steps = Vec::new();
        let mut slot_sizes = Vec::new();

        for node in function.ops() {
            let step = match node.op() {
                Op::Parameter => {
                    let index = function.parameter_index(&node).context(LoweringSnafu {
                        reason: format!("{} is not a parameter of {}", node.name(), function.name()),
                    })?;
                    sources.insert(node.id(), Source::Parameter(index));
                    continue;
                }
                Op::Result(_) => continue,
                Op::Constant(value) => {
                    Step::Fill { dst: new_slot(&mut slot_sizes, &node)?, element: value.to_bytes(node.dtype()) }
                }
                Op::Unary(op, src) => {
                    let src = source_of(&sources, src)?;
                    let kernel = unary_kernel_for(node.dtype())?;
                    Step::Unary { op: *op, kernel, src, dst: new_slot(&mut slot_sizes, &node)? }
                }
                Op::Binary(op, lhs, rhs) => {
                    let lhs = source_of(&sources, lhs)?;
                    let rhs = source_of(&sources, rhs)?;
                    let kernel = binary_kernel_for(node.dtype())?;
                    Step::Binary { op: *op, kernel, lhs, rhs, dst: new_slot(&mut slot_sizes, &node)? }
                }
                Op::Custom { name, .. } => {
                    return UnsupportedOperationSnafu { op: name.clone(), backend: CpuBackend::NAME }.fail();
                }
            };

            let dst = match step {
                Step::Fill { dst, .. } | Step::Unary { dst, .. } | Step::Binary { dst, .. } => dst,
            };
            sources.insert(node.id(), Source::Slot(dst));
            steps.push(TimedStep { name: node.name(), step });
        }

        let outputs = function
            .results()
            .iter()
            .map(|result| match result.op() {
                Op::Result(src) => source_of(&sources, src),
                _ => source_of(&sources, result),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { steps, slot_sizes, outputs })
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

impl CallFrame for CpuCallFrame {
    fn call(
        &self,
        outputs: &mut [TensorView<'_>],
        inputs: &[TensorView<'_>],
        mut timer: Option<OpTimer<'_>>,
    ) -> Result<bool> {
        let mut slots: Vec<Vec<u8>> = self.slot_sizes.iter().map(|&size| vec![0u8; size]).collect();

        for TimedStep { name, step } in &self.steps {
            let started = Instant::now();
            let ok = match step {
                Step::Fill { dst, element } => {
                    if !element.is_empty() {
                        for chunk in slots[*dst].chunks_exact_mut(element.len()) {
                            chunk.copy_from_slice(element);
                        }
                    }
                    true
                }
                Step::Unary { op, kernel, src, dst } => {
                    let mut out = std::mem::take(&mut slots[*dst]);
                    let ok = kernel(*op, read(*src, &slots, inputs), &mut out);
                    slots[*dst] = out;
                    ok
                }
                Step::Binary { op, kernel, lhs, rhs, dst } => {
                    let mut out = std::mem::take(&mut slots[*dst]);
                    let ok = kernel(*op, read(*lhs, &slots, inputs), read(*rhs, &slots, inputs), &mut out);
                    slots[*dst] = out;
                    ok
                }
            };
            if let Some(timer) = timer.as_deref_mut() {
                timer(name, started.elapsed());
            }
            if !ok {
                tracing::debug!(step = %name, "numeric fault");
                return Ok(false);
            }
        }

        for (output, source) in outputs.iter_mut().zip(&self.outputs) {
            output.as_bytes_mut().copy_from_slice(read(*source, &slots, inputs));
        }
        Ok(true)
    }
}

fn source_of(sources: &HashMap<NodeId, Source>, node: &Arc<Node>) -> Result<Source> {
    let reason = format!("{} used before definition", node.name());
    sources.get(&node.id()).copied().context(LoweringSnafu { reason })
}

fn new_slot(slot_sizes: &mut Vec<usize>, node: &Node) -> Result<usize> {
    let shape = node.shape().to_shape().context(DynamicShapeSnafu { node: node.name() })?;
    slot_sizes.push(element_count(&shape) * node.dtype().bytes());
    Ok(slot_sizes.len() - 1)
}

fn read<'s>(source: Source, slots: &'s [Vec<u8>], inputs: &'s [TensorView<'_>]) -> &'s [u8] {
    match source {
        Source::Parameter(index) => inputs[index].as_bytes(),
        Source::Slot(index) => &slots[index],
    }
}

fn unary_kernel_for(dtype: DType) -> Result<UnaryKernel> {
    Ok(match dtype {
        DType::Int32 => unary::<i32>,
        DType::Int64 => unary::<i64>,
        DType::Float32 => unary::<f32>,
        DType::Float64 => unary::<f64>,
        other => return unsupported_dtype(other),
    })
}

fn binary_kernel_for(dtype: DType) -> Result<BinaryKernel> {
    Ok(match dtype {
        DType::Int32 => binary::<i32>,
        DType::Int64 => binary::<i64>,
        DType::Float32 => binary::<f32>,
        DType::Float64 => binary::<f64>,
        other => return unsupported_dtype(other),
    })
}

fn unsupported_dtype<T>(dtype: DType) -> Result<T> {
    UnsupportedOperationSnafu { op: format!("{dtype} arithmetic"), backend: CpuBackend::NAME }.fail()
}

fn unary<T: Element>(op: UnaryOp, src: &[u8], dst: &mut [u8]) -> bool {
    for (s, d) in src.chunks_exact(T::SIZE).zip(dst.chunks_exact_mut(T::SIZE)) {
        let Some(value) = T::unary(op, T::read(s)) else { return false };
        value.write(d);
    }
    true
}

fn binary<T: Element>(op: BinaryOp, lhs: &[u8], rhs: &[u8], dst: &mut [u8]) -> bool {
    let lhs = lhs.chunks_exact(T::SIZE);
    let rhs = rhs.chunks_exact(T::SIZE);
    for ((a, b), d) in lhs.zip(rhs).zip(dst.chunks_exact_mut(T::SIZE)) {
        let Some(value) = T::binary(op, T::read(a), T::read(b)) else { return false };
        value.write(d);
    }
    true
}

/// Native element with the arithmetic the CPU backend executes.
///
/// `None` is a numeric fault.
trait Element: Copy {
    const SIZE: usize;

    fn read(bytes: &[u8]) -> Self;
    fn write(self, bytes: &mut [u8]);
    fn unary(op: UnaryOp, x: Self) -> Option<Self>;
    fn binary(op: BinaryOp, a: Self, b: Self) -> Option<Self>;
}

macro_rules! impl_bytes {
    ($t:ty) => {
        const SIZE: usize = std::mem::size_of::<$t>();

        fn read(bytes: &[u8]) -> Self {
            let mut raw = [0u8; std::mem::size_of::<$t>()];
            raw.copy_from_slice(bytes);
            <$t>::from_ne_bytes(raw)
        }

        fn write(self, bytes: &mut [u8]) {
            bytes.copy_from_slice(&self.to_ne_bytes());
        }
    };
}

macro_rules! impl_int_element {
    ($($t:ty),*) => {$(
        impl Element for $t {
            impl_bytes!($t);

            fn unary(op: UnaryOp, x: Self) -> Option<Self> {
                match op {
                    UnaryOp::Neg => Some(x.wrapping_neg()),
                    UnaryOp::Abs => Some(x.wrapping_abs()),
                    UnaryOp::Relu => Some(x.max(0)),
                    UnaryOp::Exp | UnaryOp::Sqrt => None,
                }
            }

            fn binary(op: BinaryOp, a: Self, b: Self) -> Option<Self> {
                match op {
                    BinaryOp::Add => Some(a.wrapping_add(b)),
                    BinaryOp::Sub => Some(a.wrapping_sub(b)),
                    BinaryOp::Mul => Some(a.wrapping_mul(b)),
                    BinaryOp::Div => a.checked_div(b),
                    BinaryOp::Max => Some(a.max(b)),
                    BinaryOp::Min => Some(a.min(b)),
                }
            }
        }
    )*};
}

macro_rules! impl_float_element {
    ($($t:ty),*) => {$(
        impl Element for $t {
            impl_bytes!($t);

            fn unary(op: UnaryOp, x: Self) -> Option<Self> {
                Some(match op {
                    UnaryOp::Neg => -x,
                    UnaryOp::Abs => x.abs(),
                    UnaryOp::Relu => x.max(0.0),
                    UnaryOp::Exp => x.exp(),
                    UnaryOp::Sqrt => x.sqrt(),
                })
            }

            fn binary(op: BinaryOp, a: Self, b: Self) -> Option<Self> {
                Some(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Max => a.max(b),
                    BinaryOp::Min => a.min(b),
                })
            }
        }
    )*};
}

impl_int_element!(i32, i64);
impl_float_element!(f32, f64);
