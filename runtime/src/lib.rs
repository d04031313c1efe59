//! Compilation and execution for kiln functions.
//!
//! - [`backend`] - The [`Backend`] contract and capability queries
//! - [`backend_registry`] - `DEVICE:CONFIG` lookup of backend factories
//! - [`compile_cache`] - One executable per function identity
//! - [`executable`] - Compiled functions, call frames and tensor helpers
//! - [`passes`] - Graph passes run before lowering, configured by [`PassConfig`]
//! - [`devices`] - Built-in backends

pub mod backend;
pub mod backend_registry;
pub mod compile_cache;
pub mod config;
pub mod devices;
pub mod error;
pub mod executable;
pub mod passes;


pub use backend::{Backend, HostAllocator, Property};
pub use backend_registry::{BACKENDS, BackendFactory, BackendRegistry};
pub use compile_cache::CompileCache;
pub use config::PassConfig;
pub use devices::CpuBackend;
pub use error::*;
pub use executable::{CallFrame, Executable, ExecutableHandle, OpTimer, PerformanceCounter, TensorRole};
pub use passes::{AlgebraicSimplification, Pass, PassManager};
