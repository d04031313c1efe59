use kiln_dtype::DType;
use snafu::Snafu;

use crate::{BinaryOp, PartialShape, UnaryOp};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// DType mismatch in binary operation.
    #[snafu(display("dtype mismatch: cannot perform {operation:?} on {lhs} and {rhs}"))]
    DTypeMismatch { operation: BinaryOp, lhs: DType, rhs: DType },

    /// Shape mismatch in elementwise operation.
    #[snafu(display("shape mismatch: cannot perform {operation:?} on shapes {lhs} and {rhs}"))]
    ShapeMismatch { operation: BinaryOp, lhs: PartialShape, rhs: PartialShape },

    #[snafu(display("invalid dtype for operation: operation {operation:?}; dtype {dtype}"))]
    InvalidDTypeForUnaryOp { operation: UnaryOp, dtype: DType },

    #[snafu(display("invalid dtype for operation: operation {operation:?}; dtype {dtype}"))]
    InvalidDTypeForBinaryOp { operation: BinaryOp, dtype: DType },

    /// A parameter reachable from the results is missing from the parameter list.
    #[snafu(display("function '{function}' uses parameter {node} which is not in its parameter list"))]
    UnboundParameter { function: String, node: String },

    /// A node in the parameter list is not a parameter.
    #[snafu(display("function '{function}' lists {node} as a parameter"))]
    NotAParameter { function: String, node: String },

    /// Static nodes can only be assigned to capture patterns.
    #[snafu(display("pattern node {index} is not a capture"))]
    NotACapture { index: usize },

    /// A rewrite did not reach a fixed point.
    #[snafu(display("rewrite of {node} did not converge after {iterations} iterations"))]
    RewriteDiverged { node: String, iterations: usize },
}
