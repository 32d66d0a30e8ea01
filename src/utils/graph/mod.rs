//! Graph infrastructure for control-flow and loop analysis.
//!
//! This module provides the arena-backed directed graph the analyses run on, the
//! traits that abstract over graph shapes, and the dominator tree wrapper.
//!
//! # Architecture
//!
//! - **Node and edge identifiers**: [`NodeId`] and [`EdgeId`] are stable handles that
//!   replace the cyclic pointer webs of a classic compiler IR
//! - **Core graph**: [`DirectedGraph`] with adjacency lists in both directions
//! - **Traits**: [`GraphBase`], [`Successors`], [`Predecessors`], [`RootedGraph`]
//! - **Dominance**: [`DominatorTree`], built from an externally computed
//!   immediate-dominator table

mod directed;
mod dominators;
mod edge;
mod node;
mod traits;

pub use directed::DirectedGraph;
pub use dominators::{compute_dominators, DominatorIterator, DominatorTree};
pub use edge::EdgeId;
pub use node::NodeId;
pub use traits::{GraphBase, Predecessors, RootedGraph, Successors};
