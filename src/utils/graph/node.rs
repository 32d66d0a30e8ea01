//! Node identifier for directed graphs.
//!
//! This module provides the [`NodeId`] type, the stable handle under which a graph
//! stores its nodes. In a control-flow graph one node corresponds to one basic
//! block; in a loop inclusion tree one node corresponds to one detected loop.

use std::fmt;

/// A strongly-typed identifier for nodes within a directed graph.
///
/// `NodeId` wraps a `usize` index. Node IDs are assigned sequentially starting from
/// 0 when nodes are added to a graph, so they can be used directly to index
/// per-node side tables (dominator tables, loop membership vectors, ...).
///
/// # Examples
///
/// ```rust
/// use qpuc::utils::graph::{DirectedGraph, NodeId};
///
/// let mut graph: DirectedGraph<&str, ()> = DirectedGraph::new();
/// let header = graph.add_node("header");
/// let body = graph.add_node("body");
///
/// assert_ne!(header, body);
/// assert_eq!(body, NodeId::new(1));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Creates a new `NodeId` from a raw index value.
    ///
    /// Normal usage obtains node IDs from [`DirectedGraph::add_node`](crate::utils::graph::DirectedGraph::add_node);
    /// this constructor exists for side tables and tests.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the raw 0-based index of this node.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<usize> for NodeId {
    #[inline]
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}

impl From<NodeId> for usize {
    #[inline]
    fn from(node: NodeId) -> Self {
        node.0
    }
}
