//! Core directed graph implementation.
//!
//! This module provides [`DirectedGraph`], the adjacency-list graph underneath the
//! control-flow graph and the loop inclusion tree. Nodes and edges are stored in
//! arenas and addressed by [`NodeId`] / [`EdgeId`]; both directions of every edge are
//! indexed so forward and backward traversal cost the same.

use crate::{
    utils::graph::{
        edge::EdgeId,
        node::NodeId,
        traits::{GraphBase, Predecessors, Successors},
    },
    Error, Result,
};

#[derive(Debug, Clone)]
struct EdgeData<E> {
    source: NodeId,
    target: NodeId,
    data: E,
}

/// A directed graph with typed node and edge payloads.
///
/// # Type Parameters
///
/// * `N` - The node payload (a basic block reference, a loop, ...)
/// * `E` - The edge payload (edge kind and flags, or `()`)
///
/// # Examples
///
/// ```rust
/// use qpuc::utils::graph::DirectedGraph;
///
/// let mut graph: DirectedGraph<&str, u32> = DirectedGraph::new();
/// let a = graph.add_node("entry");
/// let b = graph.add_node("loop");
/// graph.add_edge(a, b, 1)?;
/// graph.add_edge(b, b, 2)?;
///
/// assert_eq!(graph.successors(b).collect::<Vec<_>>(), vec![b]);
/// assert_eq!(graph.predecessors(b).count(), 2);
/// # Ok::<(), qpuc::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct DirectedGraph<N, E> {
    nodes: Vec<N>,
    edges: Vec<EdgeData<E>>,
    outgoing: Vec<Vec<EdgeId>>,
    incoming: Vec<Vec<EdgeId>>,
}

impl<N, E> Default for DirectedGraph<N, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N, E> DirectedGraph<N, E> {
    /// Creates a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        DirectedGraph {
            nodes: Vec::new(),
            edges: Vec::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
        }
    }

    /// Creates a new empty graph with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(node_capacity: usize, edge_capacity: usize) -> Self {
        DirectedGraph {
            nodes: Vec::with_capacity(node_capacity),
            edges: Vec::with_capacity(edge_capacity),
            outgoing: Vec::with_capacity(node_capacity),
            incoming: Vec::with_capacity(node_capacity),
        }
    }

    /// Adds a node and returns its identifier.
    pub fn add_node(&mut self, data: N) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(data);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        id
    }

    /// Returns the payload of a node, if it exists.
    #[must_use]
    pub fn node(&self, node: NodeId) -> Option<&N> {
        self.nodes.get(node.index())
    }

    /// Returns a mutable reference to the payload of a node, if it exists.
    pub fn node_mut(&mut self, node: NodeId) -> Option<&mut N> {
        self.nodes.get_mut(node.index())
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterates over all node identifiers in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId::new)
    }

    /// Iterates over all nodes together with their payloads.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &N)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, data)| (NodeId::new(i), data))
    }

    /// Adds a directed edge from `source` to `target`.
    ///
    /// Parallel edges and self-loops are allowed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if either endpoint does not exist.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId, data: E) -> Result<EdgeId> {
        if source.index() >= self.nodes.len() {
            return Err(Error::GraphError(format!(
                "source node {} does not exist in graph with {} nodes",
                source,
                self.nodes.len()
            )));
        }
        if target.index() >= self.nodes.len() {
            return Err(Error::GraphError(format!(
                "target node {} does not exist in graph with {} nodes",
                target,
                self.nodes.len()
            )));
        }

        let id = EdgeId::new(self.edges.len());
        self.edges.push(EdgeData {
            source,
            target,
            data,
        });
        self.outgoing[source.index()].push(id);
        self.incoming[target.index()].push(id);

        Ok(id)
    }

    /// Returns the payload of an edge, if it exists.
    #[must_use]
    pub fn edge(&self, edge: EdgeId) -> Option<&E> {
        self.edges.get(edge.index()).map(|e| &e.data)
    }

    /// Returns a mutable reference to the payload of an edge, if it exists.
    pub fn edge_mut(&mut self, edge: EdgeId) -> Option<&mut E> {
        self.edges.get_mut(edge.index()).map(|e| &mut e.data)
    }

    /// Returns `(source, target)` of an edge, if it exists.
    #[must_use]
    pub fn edge_endpoints(&self, edge: EdgeId) -> Option<(NodeId, NodeId)> {
        self.edges.get(edge.index()).map(|e| (e.source, e.target))
    }

    /// Returns the first edge from `source` to `target`, if any.
    #[must_use]
    pub fn find_edge(&self, source: NodeId, target: NodeId) -> Option<EdgeId> {
        self.outgoing
            .get(source.index())?
            .iter()
            .copied()
            .find(|edge| self.edges[edge.index()].target == target)
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Iterates over all edges together with their payloads.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &E)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .map(|(i, e)| (EdgeId::new(i), &e.data))
    }

    /// Iterates over the successors of `node`, one entry per outgoing edge.
    ///
    /// # Panics
    ///
    /// Panics if `node` does not exist.
    pub fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.outgoing[node.index()]
            .iter()
            .map(|&edge_id| self.edges[edge_id.index()].target)
    }

    /// Iterates over the predecessors of `node`, one entry per incoming edge.
    ///
    /// # Panics
    ///
    /// Panics if `node` does not exist.
    pub fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.incoming[node.index()]
            .iter()
            .map(|&edge_id| self.edges[edge_id.index()].source)
    }

    /// Iterates over the outgoing edges of `node` with their payloads.
    ///
    /// # Panics
    ///
    /// Panics if `node` does not exist.
    pub fn outgoing_edges(&self, node: NodeId) -> impl Iterator<Item = (EdgeId, &E)> + '_ {
        self.outgoing[node.index()]
            .iter()
            .map(|&edge_id| (edge_id, &self.edges[edge_id.index()].data))
    }

    /// Iterates over the incoming edges of `node` with their payloads.
    ///
    /// # Panics
    ///
    /// Panics if `node` does not exist.
    pub fn incoming_edges(&self, node: NodeId) -> impl Iterator<Item = (EdgeId, &E)> + '_ {
        self.incoming[node.index()]
            .iter()
            .map(|&edge_id| (edge_id, &self.edges[edge_id.index()].data))
    }
}

impl<N, E> GraphBase for DirectedGraph<N, E> {
    fn node_count(&self) -> usize {
        DirectedGraph::node_count(self)
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        DirectedGraph::node_ids(self)
    }
}

impl<N, E> Successors for DirectedGraph<N, E> {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        DirectedGraph::successors(self, node)
    }
}

impl<N, E> Predecessors for DirectedGraph<N, E> {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        DirectedGraph::predecessors(self, node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_graph() {
        let graph: DirectedGraph<(), ()> = DirectedGraph::new();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.node(NodeId::new(0)).is_none());
    }

    #[test]
    fn test_add_edge_rejects_missing_nodes() {
        let mut graph: DirectedGraph<u32, ()> = DirectedGraph::new();
        let a = graph.add_node(0);

        assert!(matches!(
            graph.add_edge(a, NodeId::new(3), ()),
            Err(Error::GraphError(_))
        ));
        assert!(matches!(
            graph.add_edge(NodeId::new(9), a, ()),
            Err(Error::GraphError(_))
        ));
    }

    #[test]
    fn test_adjacency_and_endpoints() -> Result<()> {
        let mut graph: DirectedGraph<&str, &str> = DirectedGraph::with_capacity(3, 3);
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        let c = graph.add_node("c");
        let ab = graph.add_edge(a, b, "ab")?;
        graph.add_edge(b, c, "bc")?;
        let ca = graph.add_edge(c, a, "ca")?;

        assert_eq!(graph.edge_endpoints(ab), Some((a, b)));
        assert_eq!(graph.edge(ca), Some(&"ca"));
        assert_eq!(graph.find_edge(c, a), Some(ca));
        assert_eq!(graph.find_edge(a, c), None);
        assert_eq!(graph.successors(a).collect::<Vec<_>>(), vec![b]);
        assert_eq!(graph.predecessors(a).collect::<Vec<_>>(), vec![c]);
        assert_eq!(graph.outgoing_edges(b).count(), 1);
        assert_eq!(graph.incoming_edges(b).count(), 1);
        Ok(())
    }

    #[test]
    fn test_payload_mutation() -> Result<()> {
        let mut graph: DirectedGraph<u32, u32> = DirectedGraph::new();
        let a = graph.add_node(1);
        let e = graph.add_edge(a, a, 0)?;

        if let Some(data) = graph.node_mut(a) {
            *data = 10;
        }
        if let Some(data) = graph.edge_mut(e) {
            *data |= 4;
        }

        assert_eq!(graph.node(a), Some(&10));
        assert_eq!(graph.edge(e), Some(&4));
        assert_eq!(graph.nodes().count(), 1);
        assert_eq!(graph.edges().count(), 1);
        Ok(())
    }
}
