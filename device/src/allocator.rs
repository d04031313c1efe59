use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use snafu::ensure;

use crate::error::{AllocationFailedSnafu, Result};

/// Owned block of host memory handed out by an [`Allocator`].
#[derive(Debug)]
pub struct RawBuffer {
    data: Box<[u8]>,
}

impl RawBuffer {
    pub fn new(data: Box<[u8]>) -> Self {
        Self { data }
    }

    /// Get the size of the buffer in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Options for buffer allocation.
#[derive(Debug, Clone, Default)]
pub struct BufferOptions {
    /// Whether to zero-initialize the buffer.
    pub zero_init: bool,
}

/// Source of host memory for tensors.
///
/// Every buffer obtained from `alloc` is returned through `free` of the same
/// allocator exactly once.
pub trait Allocator: Send + Sync + std::fmt::Debug {
    fn alloc(&self, size: usize, options: &BufferOptions) -> Result<RawBuffer>;
    fn free(&self, _buffer: RawBuffer) {}
    fn name(&self) -> &str;
}

/// CPU allocator using system memory.
#[derive(Debug, Clone)]
pub struct CpuAllocator;

impl Allocator for CpuAllocator {
    fn alloc(&self, size: usize, _options: &BufferOptions) -> Result<RawBuffer> {
        // System memory is always handed out zeroed.
        let mut data = Vec::new();
        ensure!(data.try_reserve_exact(size).is_ok(), AllocationFailedSnafu { allocator: self.name(), size });
        data.resize(size, 0u8);
        Ok(RawBuffer::new(data.into_boxed_slice()))
    }

    fn name(&self) -> &str {
        "CPU"
    }
}

/// Allocator that keeps freed buffers for reuse, keyed by size.
///
/// At most `max_buffers_per_size` buffers are retained per size; extra frees
/// go back to the inner allocator.
#[derive(Debug)]
pub struct CachingAllocator {
    inner: Arc<dyn Allocator>,
    cache: Mutex<HashMap<usize, Vec<RawBuffer>>>,
    max_buffers_per_size: usize,
    name: String,
}

impl CachingAllocator {
    pub fn new(inner: Arc<dyn Allocator>) -> Self {
        Self::with_capacity(inner, 32)
    }

    pub fn with_capacity(inner: Arc<dyn Allocator>, max_buffers_per_size: usize) -> Self {
        let name = format!("Caching({})", inner.name());
        Self { inner, cache: Mutex::new(HashMap::new()), max_buffers_per_size, name }
    }

    /// Number of buffers currently held for reuse.
    pub fn cached_buffers(&self) -> usize {
        self.cache.lock().values().map(Vec::len).sum()
    }

    /// Return every cached buffer to the inner allocator.
    pub fn clear(&self) {
        let drained: Vec<_> = self.cache.lock().drain().flat_map(|(_, buffers)| buffers).collect();
        tracing::debug!(allocator = %self.name, buffers = drained.len(), "releasing cached buffers");
        for buffer in drained {
            self.inner.free(buffer);
        }
    }
}

impl Allocator for CachingAllocator {
    fn alloc(&self, size: usize, options: &BufferOptions) -> Result<RawBuffer> {
        let reused = {
            let mut cache = self.cache.lock();
            let buffer = cache.get_mut(&size).and_then(Vec::pop);
            if cache.get(&size).is_some_and(Vec::is_empty) {
                cache.remove(&size);
            }
            buffer
        };

        if let Some(mut buffer) = reused {
            tracing::trace!(size, "reusing cached buffer");
            if options.zero_init {
                buffer.as_mut_slice().fill(0);
            }
            return Ok(buffer);
        }

        match self.inner.alloc(size, options) {
            Ok(buffer) => Ok(buffer),
            Err(e) => {
                // Cached memory may be what is standing in the way.
                self.clear();
                self.inner.alloc(size, options).map_err(|_| e)
            }
        }
    }

    fn free(&self, buffer: RawBuffer) {
        let mut cache = self.cache.lock();
        let buffers = cache.entry(buffer.size()).or_default();
        if buffers.len() < self.max_buffers_per_size {
            buffers.push(buffer);
        } else {
            drop(cache);
            self.inner.free(buffer);
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

static DEFAULT_ALLOCATOR: Lazy<Arc<dyn Allocator>> =
    Lazy::new(|| Arc::new(CachingAllocator::new(Arc::new(CpuAllocator))));

/// Process-wide host allocator used when none was configured.
pub fn default_allocator() -> Arc<dyn Allocator> {
    DEFAULT_ALLOCATOR.clone()
}
