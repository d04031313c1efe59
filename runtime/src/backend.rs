//! Backend contract.
//!
//! A [`Backend`] compiles functions for one target, owns the compile cache for
//! that target, and hands out tensors from its host allocator. Concrete
//! backends live in [`crate::devices`] and are created through the
//! [`BackendRegistry`](crate::backend_registry::BackendRegistry).

use std::sync::Arc;

use kiln_device::{Allocator, TensorView, default_allocator};
use kiln_dtype::DType;
use kiln_ir::{Function, Node};
use once_cell::sync::OnceCell;
use snafu::ResultExt;
use tracing::warn;

use crate::config::PassConfig;
use crate::error::*;
use crate::executable::Executable;

/// Optional backend capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Property {
    /// Tensors can wrap caller-owned memory without copying.
    MemoryAttach,
}

pub trait Backend: Send + Sync {
    /// Device type, e.g. `"CPU"`.
    fn name(&self) -> &str;

    /// Configuration suffix the backend was created with (`"CPU:<configuration>"`).
    fn configuration(&self) -> &str {
        ""
    }

    /// Compile `function`, or return the executable already compiled for it.
    fn compile(
        &self,
        function: &Arc<Function>,
        pass_config: &PassConfig,
        performance_counters: bool,
    ) -> Result<Arc<Executable>>;

    /// Evict `executable` from the compile cache. No-op if it is not cached.
    fn remove_compiled_function(&self, executable: &Arc<Executable>);

    /// Assign the host allocator. Fails if one was already assigned.
    fn set_host_memory_allocator(&self, allocator: Arc<dyn Allocator>) -> Result<()>;

    /// The assigned host allocator, or the process default.
    fn host_memory_allocator(&self) -> Arc<dyn Allocator>;

    fn create_tensor(&self, dtype: DType, shape: &[usize]) -> Result<TensorView<'static>> {
        TensorView::allocate(dtype, shape, self.host_memory_allocator()).context(DeviceSnafu)
    }

    /// Tensor over caller memory. The view never frees `memory`.
    fn create_tensor_attached<'a>(
        &self,
        dtype: DType,
        shape: &[usize],
        memory: &'a mut [u8],
    ) -> Result<TensorView<'a>> {
        if !self.is_supported_property(Property::MemoryAttach) {
            warn!(backend = self.name(), "attaching memory to a backend without memory_attach support");
        }
        TensorView::attach(dtype, shape, memory).context(DeviceSnafu)
    }

    /// Whether this backend can execute `node`.
    fn is_supported(&self, _node: &Node) -> bool {
        true
    }

    fn is_supported_property(&self, _property: Property) -> bool {
        false
    }
}

/// Set-once host allocator slot shared by backend implementations.
#[derive(Debug, Default)]
pub struct HostAllocator {
    slot: OnceCell<Arc<dyn Allocator>>,
}

impl HostAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the allocator. Tensors created from the first allocator must stay
    /// valid, so a second assignment fails even with the same allocator.
    pub fn set(&self, allocator: Arc<dyn Allocator>, backend: &str) -> Result<()> {
        self.slot.set(allocator).map_err(|_| AllocatorAlreadySetSnafu { backend }.build())
    }

    pub fn get(&self) -> Arc<dyn Allocator> {
        self.slot.get().cloned().unwrap_or_else(default_allocator)
    }

    pub fn is_set(&self) -> bool {
        self.slot.get().is_some()
    }
}
