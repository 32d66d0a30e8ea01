//! Dominator tree queries.
//!
//! Dominance is computed outside this crate (by the pass manager that owns the
//! function) and handed in as an immediate-dominator table. [`DominatorTree`] wraps
//! that table and answers the questions loop detection asks of it.
//!
//! A node `d` **dominates** a node `n` if every path from the entry node to `n`
//! passes through `d`. The **immediate dominator** of `n` is the unique node that
//! strictly dominates `n` but no other dominator of `n`. Making each node's
//! immediate dominator its parent yields the dominator tree rooted at the entry.
//!
//! Hosts that have no dominance pass of their own can use [`compute_dominators`],
//! an implementation of the iterative Cooper-Harvey-Kennedy algorithm.

use crate::{
    utils::graph::{NodeId, RootedGraph},
    Error, Result,
};

/// Dominance relation of one function's control-flow graph.
///
/// Nodes unreachable from the entry carry no immediate dominator; they dominate
/// only themselves and are dominated by nothing else.
///
/// # Examples
///
/// ```rust
/// use qpuc::utils::graph::{DominatorTree, NodeId};
///
/// // entry -> a -> b, b -> a
/// let entry = NodeId::new(0);
/// let a = NodeId::new(1);
/// let b = NodeId::new(2);
/// let tree = DominatorTree::from_immediate_dominators(entry, vec![None, Some(entry), Some(a)])?;
///
/// assert!(tree.dominates(a, b));
/// assert!(!tree.dominates(b, a));
/// assert_eq!(tree.dominators(b).collect::<Vec<_>>(), vec![b, a, entry]);
/// # Ok::<(), qpuc::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct DominatorTree {
    entry: NodeId,
    idom: Vec<Option<NodeId>>,
}

impl DominatorTree {
    /// Builds the tree from an immediate-dominator table indexed by node.
    ///
    /// The entry's own slot is ignored (it may hold `None` or the entry itself).
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if the entry or any referenced dominator is out
    /// of range, or if following immediate dominators from some node never reaches
    /// the entry.
    pub fn from_immediate_dominators(entry: NodeId, idoms: Vec<Option<NodeId>>) -> Result<Self> {
        let node_count = idoms.len();
        if entry.index() >= node_count {
            return Err(Error::GraphError(format!(
                "entry node {entry} does not exist in table with {node_count} nodes"
            )));
        }

        let mut idom = idoms;
        idom[entry.index()] = None;

        for (index, parent) in idom.iter().enumerate() {
            if let Some(parent) = parent {
                if parent.index() >= node_count {
                    return Err(Error::GraphError(format!(
                        "immediate dominator {parent} of n{index} does not exist"
                    )));
                }
            }
        }

        // Every chain must end at the entry within node_count steps
        for start in 0..node_count {
            let mut current = NodeId::new(start);
            let mut steps = 0;
            while let Some(parent) = idom[current.index()] {
                steps += 1;
                if steps > node_count {
                    return Err(Error::GraphError(format!(
                        "immediate dominator chain of n{start} is cyclic"
                    )));
                }
                current = parent;
            }
            if steps > 0 && current != entry {
                return Err(Error::GraphError(format!(
                    "immediate dominator chain of n{start} ends at {current} instead of the entry"
                )));
            }
        }

        Ok(DominatorTree { entry, idom })
    }

    /// Returns the entry (root) node of the dominator tree.
    #[inline]
    #[must_use]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Returns the immediate dominator of a node, or `None` for the entry node and
    /// unreachable nodes.
    #[inline]
    #[must_use]
    pub fn immediate_dominator(&self, node: NodeId) -> Option<NodeId> {
        self.idom.get(node.index()).copied().flatten()
    }

    /// Returns `true` for the entry and every node with an immediate dominator.
    #[inline]
    #[must_use]
    pub fn is_reachable(&self, node: NodeId) -> bool {
        node == self.entry || self.immediate_dominator(node).is_some()
    }

    /// Checks if node `a` dominates node `b`.
    ///
    /// A node dominates itself.
    ///
    /// # Complexity
    ///
    /// O(depth) where depth is the depth of `b` in the dominator tree.
    #[must_use]
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        self.dominators(b).any(|d| d == a)
    }

    /// Checks if node `a` strictly dominates node `b`.
    #[inline]
    #[must_use]
    pub fn strictly_dominates(&self, a: NodeId, b: NodeId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Returns an iterator over all dominators of a node, from the node itself up to
    /// (and including) the entry node.
    pub fn dominators(&self, node: NodeId) -> DominatorIterator<'_> {
        DominatorIterator {
            tree: self,
            current: Some(node),
        }
    }

    /// Returns the depth of a node in the dominator tree.
    ///
    /// The entry node and unreachable nodes have depth 0.
    #[must_use]
    pub fn depth(&self, node: NodeId) -> usize {
        self.dominators(node).count().saturating_sub(1)
    }

    /// Returns all children of a node in the dominator tree.
    #[must_use]
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.idom
            .iter()
            .enumerate()
            .filter(|(_, parent)| **parent == Some(node))
            .map(|(index, _)| NodeId::new(index))
            .collect()
    }

    /// Returns the number of nodes in the dominator tree.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.idom.len()
    }
}

/// Iterator over dominators of a node, from the node up to the entry.
pub struct DominatorIterator<'a> {
    tree: &'a DominatorTree,
    current: Option<NodeId>,
}

impl Iterator for DominatorIterator<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = self.tree.immediate_dominator(current);
        Some(current)
    }
}

/// Computes the dominator tree of a rooted graph.
///
/// Uses the iterative algorithm by Cooper, Harvey and Kennedy over a reverse
/// postorder of the nodes reachable from the entry. Unreachable nodes end up
/// without an immediate dominator.
///
/// # Examples
///
/// ```rust
/// use qpuc::analysis::ControlFlowGraph;
/// use qpuc::ir::MethodBuilder;
/// use qpuc::utils::graph::{compute_dominators, NodeId};
///
/// let method = MethodBuilder::new("diamond").build_with(|f| {
///     let c = f.local("%c", qpuc::ir::DataType::BOOL);
///     f.block(0, |b| b.branch_if(c, 2));
///     f.block(1, |b| b.jump(3));
///     f.block(2, |b| b.jump(3));
///     f.block(3, |b| b.ret());
/// })?;
/// let cfg = ControlFlowGraph::from_method(&method)?;
/// let tree = compute_dominators(&cfg);
///
/// assert_eq!(tree.immediate_dominator(NodeId::new(3)), Some(NodeId::new(0)));
/// # Ok::<(), qpuc::Error>(())
/// ```
pub fn compute_dominators<G>(graph: &G) -> DominatorTree
where
    G: RootedGraph,
{
    let node_count = graph.node_count();
    let entry = graph.entry();
    if entry.index() >= node_count {
        return DominatorTree {
            entry,
            idom: vec![None; node_count],
        };
    }

    let successors: Vec<Vec<NodeId>> = graph
        .node_ids()
        .map(|node| graph.successors(node).collect())
        .collect();

    // Iterative DFS producing the postorder of reachable nodes
    let mut postorder = Vec::with_capacity(node_count);
    let mut visited = vec![false; node_count];
    let mut stack = vec![(entry, 0usize)];
    visited[entry.index()] = true;
    while let Some((node, next)) = stack.last_mut() {
        if let Some(&succ) = successors[node.index()].get(*next) {
            *next += 1;
            if !visited[succ.index()] {
                visited[succ.index()] = true;
                stack.push((succ, 0));
            }
        } else {
            postorder.push(*node);
            stack.pop();
        }
    }

    let mut order = vec![usize::MAX; node_count];
    for (position, node) in postorder.iter().enumerate() {
        order[node.index()] = position;
    }

    let mut idom: Vec<Option<NodeId>> = vec![None; node_count];
    idom[entry.index()] = Some(entry);

    let intersect = |idom: &[Option<NodeId>], mut a: NodeId, mut b: NodeId| -> NodeId {
        while a != b {
            while order[a.index()] < order[b.index()] {
                a = idom[a.index()].unwrap_or(entry);
            }
            while order[b.index()] < order[a.index()] {
                b = idom[b.index()].unwrap_or(entry);
            }
        }
        a
    };

    let mut changed = true;
    while changed {
        changed = false;
        for &node in postorder.iter().rev() {
            if node == entry {
                continue;
            }
            let mut new_idom: Option<NodeId> = None;
            for pred in graph.predecessors(node) {
                if idom[pred.index()].is_none() {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => pred,
                    Some(current) => intersect(&idom, pred, current),
                });
            }
            if new_idom.is_some() && idom[node.index()] != new_idom {
                idom[node.index()] = new_idom;
                changed = true;
            }
        }
    }

    idom[entry.index()] = None;
    DominatorTree { entry, idom }
}
