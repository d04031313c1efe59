//! Graph representation for the kiln compiler.
//!
//! # Module Organization
//!
//! - [`node`] - Immutable, identity-carrying graph nodes
//! - [`op`] - Operation catalog
//! - [`function`] - Functions: ordered parameters and results over a node graph
//! - [`shape`] - Static and partially known shapes
//! - [`pattern`] - Structural pattern matching
//! - [`rewrite`] - Rule-based graph rewriting
//! - [`error`] - Error types and result handling

pub mod error;
pub mod function;
pub mod node;
pub mod op;
pub mod pattern;
pub mod rewrite;
pub mod shape;

#[cfg(test)]
pub mod test;

pub use error::{Error, Result};
pub use function::{Function, FunctionId};
pub use node::{Node, NodeId, toposort};
pub use op::{BinaryOp, Op, OpKind, UnaryOp};
pub use shape::{Dimension, PartialShape, Shape, element_count};

pub use pattern::{Matcher, PatternGraph, PatternId, PatternNode, RecurrentMatcher};
pub use rewrite::{GraphRewrite, RewriteRule};

pub use kiln_dtype::{ConstValue, DType};
