//! Compiled functions.
//!
//! An [`Executable`] is produced by a backend's `compile` and is ready to run
//! for its whole lifetime. It keeps the declared parameter and result lists of
//! the function it was compiled from, the device-specific [`CallFrame`], and
//! the allocator that backs owned tensors created through it.
//!
//! Code holding a possibly-uncompiled executable uses [`ExecutableHandle`],
//! which reports `NotCompiled` instead of running anything.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use kiln_device::{Allocator, TensorView};
use kiln_ir::{Function, Node, PartialShape, Shape};
use parking_lot::Mutex;
use snafu::{OptionExt, ResultExt, ensure};

use crate::error::*;

/// Which side of a call a tensor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TensorRole {
    Input,
    Output,
}

/// Per-operation timing sink handed to a call frame.
pub type OpTimer<'t> = &'t mut dyn FnMut(&str, Duration);

/// Device-specific execution of a lowered function.
///
/// Views passed to `call` are already checked against the function's
/// declared parameters and results. Returning `Ok(false)` reports a numeric
/// fault; outputs are unspecified in that case.
pub trait CallFrame: Send + Sync {
    fn call(
        &self,
        outputs: &mut [TensorView<'_>],
        inputs: &[TensorView<'_>],
        timer: Option<OpTimer<'_>>,
    ) -> Result<bool>;
}

/// Accumulated timing of one operation across calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceCounter {
    name: String,
    total: Duration,
    calls: u64,
}

impl PerformanceCounter {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn total_time(&self) -> Duration {
        self.total
    }

    pub fn call_count(&self) -> u64 {
        self.calls
    }

    pub fn average_time(&self) -> Duration {
        if self.calls == 0 { Duration::ZERO } else { self.total.div_f64(self.calls as f64) }
    }
}

pub struct Executable {
    function: Arc<Function>,
    frame: Box<dyn CallFrame>,
    allocator: Arc<dyn Allocator>,
    performance_counters: bool,
    counters: Mutex<Vec<PerformanceCounter>>,
}

impl Executable {
    pub fn new(
        function: Arc<Function>,
        frame: Box<dyn CallFrame>,
        allocator: Arc<dyn Allocator>,
        performance_counters: bool,
    ) -> Self {
        Self { function, frame, allocator, performance_counters, counters: Mutex::new(Vec::new()) }
    }

    /// The function this executable was compiled from.
    pub fn function(&self) -> &Arc<Function> {
        &self.function
    }

    pub fn parameters(&self) -> &[Arc<Node>] {
        self.function.parameters()
    }

    pub fn results(&self) -> &[Arc<Node>] {
        self.function.results()
    }

    pub fn get_parameter(&self, index: usize) -> Result<&Arc<Node>> {
        let count = self.parameters().len();
        self.parameters().get(index).context(ParameterIndexOutOfBoundsSnafu { index, count })
    }

    pub fn get_result(&self, index: usize) -> Result<&Arc<Node>> {
        let count = self.results().len();
        self.results().get(index).context(ResultIndexOutOfBoundsSnafu { index, count })
    }

    pub fn allocator(&self) -> &Arc<dyn Allocator> {
        &self.allocator
    }

    pub fn performance_counters_enabled(&self) -> bool {
        self.performance_counters
    }

    /// Run the function: read `inputs`, write `outputs`.
    ///
    /// Usage faults (wrong count, element type or shape) are errors and leave
    /// every buffer untouched. `Ok(false)` reports a numeric fault at runtime.
    pub fn call(&self, outputs: &mut [TensorView<'_>], inputs: &[TensorView<'_>]) -> Result<bool> {
        check_views(TensorRole::Input, self.parameters(), inputs)?;
        check_views(TensorRole::Output, self.results(), outputs)?;

        if !self.performance_counters {
            return self.frame.call(outputs, inputs, None);
        }

        let mut samples: Vec<(String, Duration)> = Vec::new();
        let mut record = |name: &str, elapsed: Duration| samples.push((name.to_string(), elapsed));
        let ok = self.frame.call(outputs, inputs, Some(&mut record))?;

        let mut counters = self.counters.lock();
        for (name, elapsed) in samples {
            match counters.iter_mut().find(|c| c.name == name) {
                Some(counter) => {
                    counter.total += elapsed;
                    counter.calls += 1;
                }
                None => counters.push(PerformanceCounter { name, total: elapsed, calls: 1 }),
            }
        }
        Ok(ok)
    }

    /// Counters accumulated so far, in first-seen order. Reading does not reset them.
    pub fn get_performance_data(&self) -> Vec<PerformanceCounter> {
        self.counters.lock().clone()
    }

    /// Owned tensor shaped like parameter `index`.
    pub fn create_input_tensor(&self, index: usize) -> Result<TensorView<'static>> {
        self.allocate_for(self.get_parameter(index)?)
    }

    /// Tensor shaped like parameter `index` over caller memory.
    pub fn create_input_tensor_attached<'a>(&self, index: usize, memory: &'a mut [u8]) -> Result<TensorView<'a>> {
        attach_for(self.get_parameter(index)?, memory)
    }

    /// `pipeline_depth` owned tensors shaped like parameter `index`.
    pub fn create_input_tensors(&self, index: usize, pipeline_depth: usize) -> Result<Vec<TensorView<'static>>> {
        let node = self.get_parameter(index)?;
        (0..pipeline_depth).map(|_| self.allocate_for(node)).collect()
    }

    /// Pipelined tensors for parameter `index`, one per entry of `memories`.
    ///
    /// With no memories this is [`Executable::create_input_tensors`].
    pub fn create_input_tensors_attached<'a>(
        &self,
        index: usize,
        pipeline_depth: usize,
        memories: Vec<&'a mut [u8]>,
    ) -> Result<Vec<TensorView<'a>>> {
        let node = self.get_parameter(index)?;
        self.pipelined_for(node, pipeline_depth, memories)
    }

    /// Owned tensor shaped like result `index`.
    pub fn create_output_tensor(&self, index: usize) -> Result<TensorView<'static>> {
        self.allocate_for(self.get_result(index)?)
    }

    pub fn create_output_tensor_attached<'a>(&self, index: usize, memory: &'a mut [u8]) -> Result<TensorView<'a>> {
        attach_for(self.get_result(index)?, memory)
    }

    pub fn create_output_tensors(&self, index: usize, pipeline_depth: usize) -> Result<Vec<TensorView<'static>>> {
        let node = self.get_result(index)?;
        (0..pipeline_depth).map(|_| self.allocate_for(node)).collect()
    }

    pub fn create_output_tensors_attached<'a>(
        &self,
        index: usize,
        pipeline_depth: usize,
        memories: Vec<&'a mut [u8]>,
    ) -> Result<Vec<TensorView<'a>>> {
        let node = self.get_result(index)?;
        self.pipelined_for(node, pipeline_depth, memories)
    }

    fn allocate_for(&self, node: &Node) -> Result<TensorView<'static>> {
        let shape = static_shape(node)?;
        TensorView::allocate(node.dtype(), &shape, Arc::clone(&self.allocator)).context(DeviceSnafu)
    }

    fn pipelined_for<'a>(
        &self,
        node: &Node,
        pipeline_depth: usize,
        memories: Vec<&'a mut [u8]>,
    ) -> Result<Vec<TensorView<'a>>> {
        if memories.is_empty() {
            let mut views = Vec::with_capacity(pipeline_depth);
            for _ in 0..pipeline_depth {
                views.push(self.allocate_for(node)?);
            }
            return Ok(views);
        }
        ensure!(
            memories.len() == pipeline_depth,
            PipelineDepthMismatchSnafu { depth: pipeline_depth, pointers: memories.len() }
        );
        memories.into_iter().map(|memory| attach_for(node, memory)).collect()
    }
}

impl fmt::Debug for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executable")
            .field("function", &self.function.name())
            .field("id", &self.function.id())
            .field("allocator", &self.allocator.name())
            .field("performance_counters", &self.performance_counters)
            .finish()
    }
}

fn static_shape(node: &Node) -> Result<Shape> {
    node.shape().to_shape().context(DynamicShapeSnafu { node: node.name() })
}

fn attach_for<'a>(node: &Node, memory: &'a mut [u8]) -> Result<TensorView<'a>> {
    let shape = static_shape(node)?;
    TensorView::attach(node.dtype(), &shape, memory).context(DeviceSnafu)
}

fn check_views(role: TensorRole, declared: &[Arc<Node>], views: &[TensorView<'_>]) -> Result<()> {
    ensure!(
        declared.len() == views.len(),
        ArgumentCountMismatchSnafu { role, expected: declared.len(), actual: views.len() }
    );
    for (index, (node, view)) in declared.iter().zip(views).enumerate() {
        ensure!(
            node.dtype() == view.dtype(),
            TensorDTypeMismatchSnafu { role, index, expected: node.dtype(), actual: view.dtype() }
        );
        ensure!(
            node.shape().compatible(&PartialShape::from(view.shape())),
            TensorShapeMismatchSnafu { role, index, expected: node.shape().to_string(), actual: view.shape().to_vec() }
        );
    }
    Ok(())
}

/// Nullable handle to an executable.
///
/// Everything that runs code goes through [`ExecutableHandle::executable`],
/// so an empty handle fails with `NotCompiled` before touching any buffer.
#[derive(Debug, Clone, Default)]
pub struct ExecutableHandle(Option<Arc<Executable>>);

impl ExecutableHandle {
    pub fn empty() -> Self {
        Self(None)
    }

    pub fn is_compiled(&self) -> bool {
        self.0.is_some()
    }

    pub fn executable(&self) -> Result<&Arc<Executable>> {
        self.0.as_ref().context(NotCompiledSnafu)
    }

    pub fn call(&self, outputs: &mut [TensorView<'_>], inputs: &[TensorView<'_>]) -> Result<bool> {
        self.executable()?.call(outputs, inputs)
    }

    pub fn get_parameter(&self, index: usize) -> Result<&Arc<Node>> {
        self.executable()?.get_parameter(index)
    }

    pub fn get_result(&self, index: usize) -> Result<&Arc<Node>> {
        self.executable()?.get_result(index)
    }
}

impl From<Arc<Executable>> for ExecutableHandle {
    fn from(executable: Arc<Executable>) -> Self {
        Self(Some(executable))
    }
}
