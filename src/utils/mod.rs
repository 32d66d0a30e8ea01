//! Shared utilities: graph infrastructure and DOT helpers.

mod dot;
pub mod graph;

pub use dot::escape_dot;
