//! Error types for compilation and execution.

use kiln_dtype::DType;
use snafu::Snafu;

use crate::executable::TensorRole;

/// Result type for runtime operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while compiling or executing functions.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The host memory allocator can be assigned only once per backend.
    #[snafu(display("host memory allocator of backend '{backend}' is already set"))]
    AllocatorAlreadySet { backend: String },

    /// No backend factory is registered for the device type.
    #[snafu(display("no backend registered for device '{device}'"))]
    UnknownBackend { device: String },

    #[snafu(display("executable is not compiled: compile() must be called before call()"))]
    NotCompiled,

    #[snafu(display("expected {expected} {role} tensors, got {actual}"))]
    ArgumentCountMismatch { role: TensorRole, expected: usize, actual: usize },

    #[snafu(display("{role} {index}: expected element type {expected}, got {actual}"))]
    TensorDTypeMismatch { role: TensorRole, index: usize, expected: DType, actual: DType },

    #[snafu(display("{role} {index}: expected shape {expected}, got {actual:?}"))]
    TensorShapeMismatch { role: TensorRole, index: usize, expected: String, actual: Vec<usize> },

    /// Tensors can only be created for fully static shapes.
    #[snafu(display("{node} has a dynamic shape"))]
    DynamicShape { node: String },

    #[snafu(display("parameter index {index} is out of range for {count} parameters"))]
    ParameterIndexOutOfBounds { index: usize, count: usize },

    #[snafu(display("result index {index} is out of range for {count} results"))]
    ResultIndexOutOfBounds { index: usize, count: usize },

    #[snafu(display("mismatch in pipeline_depth ({depth}) and memory_pointers ({pointers})"))]
    PipelineDepthMismatch { depth: usize, pointers: usize },

    #[snafu(display("{op} is not supported by backend '{backend}'"))]
    UnsupportedOperation { op: String, backend: String },

    /// A pass failed while preparing the function for lowering.
    #[snafu(display("{stage} failed: {source}"))]
    Pipeline { stage: String, source: kiln_ir::Error },

    #[snafu(display("lowering failed: {reason}"))]
    Lowering { reason: String },

    #[snafu(display("device error: {source}"))]
    Device { source: kiln_device::Error },
}

/// Coarse error classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ErrorKind {
    /// Backend or registry misconfiguration.
    Configuration,
    /// API misuse: call order, argument count, tensor type or shape.
    Usage,
    /// Index or pipeline depth out of range.
    Bounds,
    UnsupportedOperation,
    /// Failure inside the pass and lowering pipeline.
    ExternalPipeline,
    /// Failure reported by the memory layer.
    Device,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AllocatorAlreadySet { .. } | Error::UnknownBackend { .. } => ErrorKind::Configuration,
            Error::NotCompiled
            | Error::ArgumentCountMismatch { .. }
            | Error::TensorDTypeMismatch { .. }
            | Error::TensorShapeMismatch { .. }
            | Error::DynamicShape { .. } => ErrorKind::Usage,
            Error::ParameterIndexOutOfBounds { .. }
            | Error::ResultIndexOutOfBounds { .. }
            | Error::PipelineDepthMismatch { .. } => ErrorKind::Bounds,
            Error::UnsupportedOperation { .. } => ErrorKind::UnsupportedOperation,
            Error::Pipeline { .. } | Error::Lowering { .. } => ErrorKind::ExternalPipeline,
            Error::Device { .. } => ErrorKind::Device,
        }
    }
}
