//! Reference CPU backend.
//!
//! Runs the pass pipeline, lowers the result into a [`CpuCallFrame`] and keeps
//! one executable per function in its [`CompileCache`].

use std::sync::Arc;

use kiln_device::Allocator;
use kiln_dtype::DType;
use kiln_ir::{Function, Node, Op};
use tracing::{debug, instrument};

use super::cpu_frame::CpuCallFrame;
use crate::backend::{Backend, HostAllocator, Property};
use crate::compile_cache::CompileCache;
use crate::config::PassConfig;
use crate::error::*;
use crate::executable::Executable;
use crate::passes::PassManager;

#[derive(Debug)]
pub struct CpuBackend {
    configuration: String,
    cache: CompileCache,
    allocator: HostAllocator,
    passes: PassManager,
}

impl CpuBackend {
    pub const NAME: &'static str = "CPU";

    /// Backend with the default pass pipeline.
    pub fn new(configuration: impl Into<String>) -> Self {
        Self::with_passes(configuration, PassManager::default_pipeline())
    }

    pub fn with_passes(configuration: impl Into<String>, passes: PassManager) -> Self {
        Self {
            configuration: configuration.into(),
            cache: CompileCache::new(),
            allocator: HostAllocator::new(),
            passes,
        }
    }

    pub fn compile_cache(&self) -> &CompileCache {
        &self.cache
    }

    fn lower(
        &self,
        function: &Arc<Function>,
        pass_config: &PassConfig,
        performance_counters: bool,
    ) -> Result<Executable> {
        if let Some(node) = function.ops().into_iter().find(|node| !self.is_supported(node)) {
            return UnsupportedOperationSnafu { op: node.op().name(), backend: Self::NAME }.fail();
        }

        let lowered = self.passes.run(function, pass_config)?;
        let frame = CpuCallFrame::lower(&lowered)?;
        debug!(function = function.name(), steps = frame.step_count(), "lowered function");

        Ok(Executable::new(Arc::clone(function), Box::new(frame), self.allocator.get(), performance_counters))
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new("")
    }
}

impl Backend for CpuBackend {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configuration(&self) -> &str {
        &self.configuration
    }

    #[instrument(skip_all, fields(function = function.name(), id = %function.id()))]
    fn compile(
        &self,
        function: &Arc<Function>,
        pass_config: &PassConfig,
        performance_counters: bool,
    ) -> Result<Arc<Executable>> {
        self.cache.get_or_compile(function, || self.lower(function, pass_config, performance_counters))
    }

    fn remove_compiled_function(&self, executable: &Arc<Executable>) {
        self.cache.remove(executable);
    }

    fn set_host_memory_allocator(&self, allocator: Arc<dyn Allocator>) -> Result<()> {
        self.allocator.set(allocator, Self::NAME)
    }

    fn host_memory_allocator(&self) -> Arc<dyn Allocator> {
        self.allocator.get()
    }

    fn is_supported(&self, node: &Node) -> bool {
        !matches!(node.op(), Op::Custom { .. })
            && matches!(node.dtype(), DType::Int32 | DType::Int64 | DType::Float32 | DType::Float64)
            && node.shape().is_static()
    }

    fn is_supported_property(&self, property: Property) -> bool {
        match property {
            Property::MemoryAttach => true,
        }
    }
}
