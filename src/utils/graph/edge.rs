//! Edge identifier for directed graphs.
//!
//! Edges get their own stable handle so that analyses can refer to one specific
//! edge (for instance the back edge anchoring a natural loop) rather than to a
//! pair of nodes, which is ambiguous once a graph holds parallel edges.

use std::fmt;

/// A strongly-typed identifier for edges within a directed graph.
///
/// Edge IDs are assigned sequentially starting from 0 by
/// [`DirectedGraph::add_edge`](crate::utils::graph::DirectedGraph::add_edge).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(pub(crate) usize);

impl EdgeId {
    /// Creates a new `EdgeId` from a raw index value.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        EdgeId(index)
    }

    /// Returns the raw 0-based index of this edge.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeId({})", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_id_basics() {
        let edge = EdgeId::new(5);
        assert_eq!(edge.index(), 5);
        assert_eq!(edge, EdgeId::new(5));
        assert!(EdgeId::new(1) < edge);
        assert_eq!(format!("{edge}"), "e5");
    }
}
