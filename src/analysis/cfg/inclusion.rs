//! Loop nesting forest.
//!
//! Loop `A` **includes** loop `B` if `B`'s nodes are a strict subset of `A`'s. The
//! parent of `B` is the innermost loop including it; loops included by nothing are
//! roots. The forest is built from a flat loop list in one go and never updated.

use std::fmt::Write;

use crate::{
    analysis::cfg::ControlFlowLoop,
    utils::graph::{DirectedGraph, NodeId},
};

/// The loop nesting forest of one function.
///
/// Tree nodes are addressed by [`NodeId`]; node `i` holds the `i`-th loop of the
/// list the tree was built from. Edges lead from a loop to the loops it directly
/// includes.
///
/// # Examples
///
/// ```rust
/// use qpuc::analysis::{ControlFlowLoop, LoopInclusionTree};
/// use qpuc::utils::graph::NodeId;
///
/// let n = NodeId::new;
/// let outer = ControlFlowLoop::new(n(3), n(1), [n(2)]);
/// let inner = ControlFlowLoop::new(n(2), n(2), []);
///
/// let tree = LoopInclusionTree::build(vec![inner, outer]);
/// assert_eq!(tree.roots(), vec![n(1)]);
/// assert_eq!(tree.parent(n(0)), Some(n(1)));
/// assert_eq!(tree.longest_path_to_root(n(0)), 1);
/// ```
#[derive(Debug, Clone)]
pub struct LoopInclusionTree {
    graph: DirectedGraph<ControlFlowLoop, ()>,
}

impl LoopInclusionTree {
    /// Builds the forest of `loops`.
    ///
    /// When several loops of equal size include a loop, the one whose sorted node
    /// list (then back edge) compares smallest becomes the parent, so the shape does
    /// not depend on the order of `loops`.
    #[must_use]
    pub fn build(loops: Vec<ControlFlowLoop>) -> Self {
        let mut graph = DirectedGraph::with_capacity(loops.len(), loops.len());
        let ids: Vec<NodeId> = loops.into_iter().map(|l| graph.add_node(l)).collect();

        let mut parents = Vec::with_capacity(ids.len());
        for &child in &ids {
            let Some(child_loop) = graph.node(child) else {
                continue;
            };
            let parent = ids
                .iter()
                .copied()
                .filter_map(|candidate| {
                    graph
                        .node(candidate)
                        .filter(|l| l.includes(child_loop))
                        .map(|l| (candidate, l))
                })
                .min_by(|(_, a), (_, b)| {
                    a.len()
                        .cmp(&b.len())
                        .then_with(|| a.nodes().iter().cmp(b.nodes().iter()))
                        .then_with(|| a.tail().cmp(&b.tail()))
                        .then_with(|| a.back_edge_target().cmp(&b.back_edge_target()))
                })
                .map(|(candidate, _)| candidate);
            if let Some(parent) = parent {
                parents.push((parent, child));
            }
        }

        for (parent, child) in parents {
            // Both ends were just added
            let _ = graph.add_edge(parent, child, ());
        }

        LoopInclusionTree { graph }
    }

    /// Returns the number of loops in the forest.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns `true` if the forest holds no loops.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Returns the loop held by a tree node.
    #[must_use]
    pub fn get(&self, node: NodeId) -> Option<&ControlFlowLoop> {
        self.graph.node(node)
    }

    /// Iterates over all tree nodes with their loops.
    pub fn loops(&self) -> impl Iterator<Item = (NodeId, &ControlFlowLoop)> + '_ {
        self.graph.nodes()
    }

    /// The loop directly including `node`'s loop.
    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        if node.index() >= self.len() {
            return None;
        }
        self.graph.predecessors(node).next()
    }

    /// The loops directly included by `node`'s loop.
    #[must_use]
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        if node.index() >= self.len() {
            return Vec::new();
        }
        self.graph.successors(node).collect()
    }

    /// The loops not included by any other loop.
    #[must_use]
    pub fn roots(&self) -> Vec<NodeId> {
        self.graph
            .node_ids()
            .filter(|&node| self.graph.predecessors(node).next().is_none())
            .collect()
    }

    /// Follows parents from `node` to its root.
    ///
    /// With a `max_depth`, at most that many parent steps are taken; if the cap is
    /// hit the node reached so far is returned.
    #[must_use]
    pub fn find_root(&self, node: NodeId, max_depth: Option<usize>) -> NodeId {
        let mut current = node;
        let mut steps = 0usize;
        while let Some(parent) = self.parent(current) {
            if max_depth.is_some_and(|max| steps >= max) {
                tracing::debug!(
                    start = %node,
                    reached = %current,
                    steps,
                    "root search stopped at depth cap"
                );
                break;
            }
            current = parent;
            steps += 1;
        }
        current
    }

    /// Number of inclusion steps from `node` up to its root; 0 for roots.
    #[must_use]
    pub fn longest_path_to_root(&self, node: NodeId) -> usize {
        let mut length = 0;
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            length += 1;
            current = parent;
        }
        length
    }

    /// Returns `true` if some loop strictly below `node` in the forest contains the
    /// CFG node `cfg_node`.
    #[must_use]
    pub fn has_cfg_node_in_children(&self, node: NodeId, cfg_node: NodeId) -> bool {
        let mut worklist = self.children(node);
        while let Some(child) = worklist.pop() {
            if self.get(child).is_some_and(|l| l.contains(cfg_node)) {
                return true;
            }
            worklist.extend(self.children(child));
        }
        false
    }

    /// Generates a DOT format representation of the forest.
    #[must_use]
    pub fn to_dot(&self, title: Option<&str>) -> String {
        let mut dot = String::new();

        dot.push_str("digraph LoopInclusion {\n");
        if let Some(name) = title {
            let _ = writeln!(dot, "    label=\"Loops: {}\";", crate::utils::escape_dot(name));
        }
        dot.push_str("    labelloc=t;\n");
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n\n");

        for (node, l) in self.graph.nodes() {
            let members = l
                .nodes()
                .iter()
                .map(|member| format!("B{}", member.index()))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(
                dot,
                "    L{} [label=\"L{}: {{{members}}}\\ltail B{}\\l\"];",
                node.index(),
                node.index(),
                l.tail().index()
            );
        }

        dot.push('\n');
        for node in self.graph.node_ids() {
            for child in self.graph.successors(node) {
                let _ = writeln!(dot, "    L{} -> L{};", node.index(), child.index());
            }
        }

        dot.push_str("}\n");
        dot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(index: usize) -> NodeId {
        NodeId::new(index)
    }

    fn lp(tail: usize, target: usize, nodes: &[usize]) -> ControlFlowLoop {
        ControlFlowLoop::new(n(tail), n(target), nodes.iter().map(|&i| n(i)))
    }

    /// A = {1..6} includes B = {2, 3, 4} includes C = {3}; D = {5} is inside A only
    fn sample() -> LoopInclusionTree {
        LoopInclusionTree::build(vec![
            lp(3, 3, &[]),
            lp(6, 1, &[2, 3, 4, 5]),
            lp(5, 5, &[]),
            lp(4, 2, &[3]),
        ])
    }

    #[test]
    fn test_shape() {
        let tree = sample();
        let (c, a, d, b) = (n(0), n(1), n(2), n(3));

        assert_eq!(tree.len(), 4);
        assert_eq!(tree.roots(), vec![a]);
        let mut children = tree.children(a);
        children.sort();
        assert_eq!(children, vec![d, b]);
        assert_eq!(tree.children(b), vec![c]);
        assert_eq!(tree.parent(c), Some(b));
        assert_eq!(tree.parent(a), None);
        assert!(tree.children(c).is_empty());
    }

    #[test]
    fn test_root_and_path_length() {
        let tree = sample();
        let (c, a, d, b) = (n(0), n(1), n(2), n(3));

        assert_eq!(tree.find_root(c, None), a);
        assert_eq!(tree.find_root(a, None), a);
        assert_eq!(tree.find_root(c, Some(1)), b);
        assert_eq!(tree.find_root(c, Some(0)), c);
        assert_eq!(tree.longest_path_to_root(c), 2);
        assert_eq!(tree.longest_path_to_root(d), 1);
        assert_eq!(tree.longest_path_to_root(a), 0);
    }

    #[test]
    fn test_cfg_node_in_children() {
        let tree = sample();
        let (c, a, _, b) = (n(0), n(1), n(2), n(3));

        assert!(tree.has_cfg_node_in_children(a, n(3)));
        assert!(tree.has_cfg_node_in_children(a, n(5)));
        // the node itself does not count
        assert!(!tree.has_cfg_node_in_children(a, n(6)));
        assert!(tree.has_cfg_node_in_children(b, n(3)));
        assert!(!tree.has_cfg_node_in_children(b, n(4)));
        assert!(!tree.has_cfg_node_in_children(c, n(3)));
    }

    #[test]
    fn test_equal_sets_are_siblings() {
        let tree = LoopInclusionTree::build(vec![lp(2, 1, &[]), lp(2, 1, &[]), lp(3, 0, &[1, 2])]);
        assert_eq!(tree.roots(), vec![n(2)]);
        assert_eq!(tree.children(n(2)).len(), 2);
    }

    #[test]
    fn test_to_dot() {
        let dot = sample().to_dot(Some("sample"));
        assert!(dot.starts_with("digraph LoopInclusion {"));
        assert!(dot.contains("L3 [label=\"L3: {B2, B3, B4}\\ltail B4\\l\"];"));
        assert!(dot.contains("L1 -> L3;"));
        assert!(dot.contains("L3 -> L0;"));
    }

    #[test]
    fn test_empty() {
        let tree = LoopInclusionTree::build(Vec::new());
        assert!(tree.is_empty());
        assert!(tree.roots().is_empty());
        assert_eq!(tree.parent(n(0)), None);
    }
}
