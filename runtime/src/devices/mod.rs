//! Backend implementations.

pub mod cpu;
pub mod cpu_frame;

pub use cpu::CpuBackend;
pub use cpu_frame::CpuCallFrame;
