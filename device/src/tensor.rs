//! Typed views over host memory.
//!
//! A [`TensorView`] fixes its element type and static shape at construction.
//! Its bytes either belong to the view ([`Memory::Owned`], returned to the
//! allocator when the view is dropped) or to the caller ([`Memory::Attached`],
//! borrowed for the view's lifetime and never freed by it).

use std::fmt;
use std::sync::Arc;

use kiln_dtype::DType;
use kiln_ir::{Shape, element_count};
use snafu::{OptionExt, ensure};

use crate::allocator::{Allocator, BufferOptions, RawBuffer};
use crate::error::*;

pub enum Memory<'a> {
    /// `buffer` is only `None` while the view is being dropped.
    Owned { buffer: Option<RawBuffer>, allocator: Arc<dyn Allocator> },
    Attached(&'a mut [u8]),
}

pub struct TensorView<'a> {
    dtype: DType,
    shape: Shape,
    size: usize,
    memory: Memory<'a>,
}

/// Bytes needed for `shape` elements of `dtype`.
pub fn tensor_size(dtype: DType, shape: &[usize]) -> Result<usize> {
    shape
        .iter()
        .try_fold(dtype.bytes(), |acc, d| acc.checked_mul(*d))
        .context(SizeOverflowSnafu { dtype, shape: shape.to_vec() })
}

impl TensorView<'static> {
    /// Allocate a zero-initialized tensor from `allocator`.
    pub fn allocate(dtype: DType, shape: &[usize], allocator: Arc<dyn Allocator>) -> Result<Self> {
        let size = tensor_size(dtype, shape)?;
        let buffer = allocator.alloc(size, &BufferOptions { zero_init: true })?;
        if buffer.size() < size {
            let actual = buffer.size();
            allocator.free(buffer);
            return SizeMismatchSnafu { expected: size, actual }.fail();
        }

        Ok(Self {
            dtype,
            shape: Shape::from_slice(shape),
            size,
            memory: Memory::Owned { buffer: Some(buffer), allocator },
        })
    }
}

impl<'a> TensorView<'a> {
    /// Wrap caller memory. The slice must hold at least the tensor's byte size;
    /// only that prefix is used.
    pub fn attach(dtype: DType, shape: &[usize], memory: &'a mut [u8]) -> Result<Self> {
        let size = tensor_size(dtype, shape)?;
        ensure!(memory.len() >= size, SizeMismatchSnafu { expected: size, actual: memory.len() });
        Ok(Self { dtype, shape: Shape::from_slice(shape), size, memory: Memory::Attached(memory) })
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn element_count(&self) -> usize {
        element_count(&self.shape)
    }

    pub fn size_in_bytes(&self) -> usize {
        self.size
    }

    pub fn is_attached(&self) -> bool {
        matches!(self.memory, Memory::Attached(_))
    }

    pub fn memory(&self) -> &Memory<'a> {
        &self.memory
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.memory {
            Memory::Owned { buffer: Some(buffer), .. } => &buffer.as_slice()[..self.size],
            Memory::Owned { buffer: None, .. } => &[],
            Memory::Attached(memory) => &memory[..self.size],
        }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        match &mut self.memory {
            Memory::Owned { buffer: Some(buffer), .. } => &mut buffer.as_mut_slice()[..self.size],
            Memory::Owned { buffer: None, .. } => &mut [],
            Memory::Attached(memory) => &mut memory[..self.size],
        }
    }

    /// Address of the first data byte.
    pub fn as_ptr(&self) -> *const u8 {
        self.as_bytes().as_ptr()
    }

    /// Copy the whole tensor into `dst`, which must be exactly its byte size.
    pub fn read(&self, dst: &mut [u8]) -> Result<()> {
        ensure!(dst.len() == self.size, SizeMismatchSnafu { expected: self.size, actual: dst.len() });
        dst.copy_from_slice(self.as_bytes());
        Ok(())
    }

    /// Overwrite the whole tensor from `src`, which must be exactly its byte size.
    pub fn write(&mut self, src: &[u8]) -> Result<()> {
        ensure!(src.len() == self.size, SizeMismatchSnafu { expected: self.size, actual: src.len() });
        self.as_bytes_mut().copy_from_slice(src);
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl Drop for TensorView<'_> {
    fn drop(&mut self) {
        if let Memory::Owned { buffer, allocator } = &mut self.memory
            && let Some(buffer) = buffer.take()
        {
            allocator.free(buffer);
        }
    }
}

impl fmt::Debug for TensorView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let memory = match &self.memory {
            Memory::Owned { allocator, .. } => format!("owned({})", allocator.name()),
            Memory::Attached(_) => "attached".to_string(),
        };
        f.debug_struct("TensorView")
            .field("dtype", &self.dtype)
            .field("shape", &self.shape.as_slice())
            .field("memory", &memory)
            .finish()
    }
}
