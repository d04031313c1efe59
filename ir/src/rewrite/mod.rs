//! Rule-based graph rewriting with per-node fixed-point iteration.

pub mod engine;

pub use engine::{DEFAULT_MAX_ITERATIONS, GraphRewrite, RewriteCallback, RewriteRule};
