//! Structural pattern matching over graphs.
//!
//! Patterns are built as a [`PatternGraph`] of [`PatternNode`] variants and
//! matched against graph values by a [`Matcher`]. Every variant defines its
//! own acceptance rule in [`PatternNode::match_value`]; variants compose by
//! recursing through the matcher, which rolls back bindings on failure.
//!
//! # Capture
//!
//! [`PatternNode::Capture`] always succeeds. It appends the current bindings to
//! the matcher's capture history and clears every binding except the capture's
//! static nodes, which delimits one round of a recurring motif.

pub mod matcher;
pub mod node;
pub mod recurrent;

pub use matcher::{Matcher, PatternValueMap};
pub use node::{NodePredicate, OpFilter, PatternGraph, PatternId, PatternNode, predicates};
pub use recurrent::{RecurrentMatch, RecurrentMatcher};
