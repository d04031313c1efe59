//! Host memory for kiln tensors.
//!
//! - [`allocator`] - The [`Allocator`] seam plus system and caching implementations
//! - [`tensor`] - [`TensorView`], a typed view over owned or caller-attached memory

pub mod allocator;
pub mod error;
pub mod tensor;


pub use allocator::{Allocator, BufferOptions, CachingAllocator, CpuAllocator, RawBuffer, default_allocator};
pub use error::{Error, Result};
pub use tensor::{Memory, TensorView, tensor_size};
