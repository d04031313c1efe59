pub mod node;
pub mod recurrent;
pub mod rewrite;
