use kiln_dtype::DType;
use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Byte image or attached memory does not have the size the tensor needs.
    #[snafu(display("size mismatch: expected {expected} bytes, got {actual}"))]
    SizeMismatch { expected: usize, actual: usize },

    /// The allocator could not provide the requested memory.
    #[snafu(display("allocator '{allocator}' failed to allocate {size} bytes"))]
    AllocationFailed { allocator: String, size: usize },

    /// Tensor byte size does not fit in `usize`.
    #[snafu(display("byte size of {dtype} tensor with shape {shape:?} overflows"))]
    SizeOverflow { dtype: DType, shape: Vec<usize> },
}
