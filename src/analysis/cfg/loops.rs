//! Natural loop detection.
//!
//! A **back edge** is an edge `m -> n` whose target `n` dominates its source `m`.
//! The **natural loop** of a back edge is `n` plus every node dominated by `n` from
//! which `m` can be reached without passing through `n`.
//!
//! ```text
//!     [entry]
//!        |
//!        v
//!     [header] <------+  <- back edge target, dominates every loop node
//!        |            |
//!        v            |
//!     [body ...]      |
//!        |            |
//!        v            |
//!     [tail] ---------+  <- back edge source
//!        |
//!        v
//!     [exit]
//! ```
//!
//! Every back edge yields its own [`ControlFlowLoop`]; two back edges into the same
//! header produce two loops, which are not merged.
//!
//! # Generic Loop Detection
//!
//! [`detect_loops`] runs on any graph implementing `GraphBase`, `Successors` and
//! `Predecessors`, paired with a dominator tree for the same graph.

use std::collections::BTreeSet;

use crate::{
    analysis::cfg::ControlFlowGraph,
    ir::{BlockId, InstrId},
    utils::graph::{DominatorTree, GraphBase, NodeId, Predecessors, Successors},
};

/// A natural loop, anchored by exactly one back edge.
///
/// The loop is a plain node set; queries needing the surrounding graph take it as
/// an argument.
///
/// # Examples
///
/// ```rust
/// use qpuc::analysis::{detect_loops, ControlFlowGraph};
/// use qpuc::ir::{DataType, MethodBuilder};
/// use qpuc::utils::graph::{compute_dominators, NodeId};
///
/// let method = MethodBuilder::new("loop").build_with(|f| {
///     let c = f.local("%c", DataType::BOOL);
///     f.block(0, |b| b.nop());
///     f.block(1, |b| b.nop());
///     f.block(2, |b| b.branch_if(c, 1));
///     f.block(3, |b| b.ret());
/// })?;
/// let cfg = ControlFlowGraph::from_method(&method)?;
/// let loops = detect_loops(&cfg, &compute_dominators(&cfg));
///
/// assert_eq!(loops.len(), 1);
/// assert_eq!(loops[0].header(&cfg), Some(NodeId::new(1)));
/// assert_eq!(loops[0].tail(), NodeId::new(2));
/// # Ok::<(), qpuc::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFlowLoop {
    nodes: BTreeSet<NodeId>,
    tail: NodeId,
    target: NodeId,
}

impl ControlFlowLoop {
    /// Creates a loop from its back edge `tail -> target` and its node set.
    ///
    /// Both endpoints are added to the set.
    #[must_use]
    pub fn new(tail: NodeId, target: NodeId, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        let mut nodes: BTreeSet<NodeId> = nodes.into_iter().collect();
        nodes.insert(tail);
        nodes.insert(target);
        ControlFlowLoop {
            nodes,
            tail,
            target,
        }
    }

    /// The node the back edge originates from.
    #[must_use]
    pub fn tail(&self) -> NodeId {
        self.tail
    }

    /// The node the back edge leads to.
    #[must_use]
    pub fn back_edge_target(&self) -> NodeId {
        self.target
    }

    /// The nodes of the loop, in ascending order.
    #[must_use]
    pub fn nodes(&self) -> &BTreeSet<NodeId> {
        &self.nodes
    }

    /// Returns `true` if `node` belongs to the loop.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Returns the number of nodes in the loop.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`, a loop holds at least its back edge target.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The unique node with a predecessor outside of the loop.
    ///
    /// Returns `None` if no node or several nodes are entered from outside.
    #[must_use]
    pub fn header<G: Predecessors>(&self, graph: &G) -> Option<NodeId> {
        let mut entries = self.nodes.iter().copied().filter(|&node| {
            node.index() < graph.node_count()
                && graph.predecessors(node).any(|pred| !self.contains(pred))
        });
        let first = entries.next()?;
        entries.next().is_none().then_some(first)
    }

    /// All nodes outside of the loop with an edge into it.
    #[must_use]
    pub fn predecessors<G: Predecessors>(&self, graph: &G) -> BTreeSet<NodeId> {
        self.nodes
            .iter()
            .filter(|node| node.index() < graph.node_count())
            .flat_map(|&node| graph.predecessors(node).collect::<Vec<_>>())
            .filter(|pred| !self.contains(*pred))
            .collect()
    }

    /// The only node outside of the loop with an edge into it, `None` if there are
    /// none or several.
    #[must_use]
    pub fn single_predecessor<G: Predecessors>(&self, graph: &G) -> Option<NodeId> {
        single(self.predecessors(graph))
    }

    /// All nodes outside of the loop reached by an edge out of it.
    #[must_use]
    pub fn successors<G: Successors>(&self, graph: &G) -> BTreeSet<NodeId> {
        self.nodes
            .iter()
            .filter(|node| node.index() < graph.node_count())
            .flat_map(|&node| graph.successors(node).collect::<Vec<_>>())
            .filter(|succ| !self.contains(*succ))
            .collect()
    }

    /// The only node outside of the loop reached by an edge out of it, `None` if
    /// there are none or several.
    #[must_use]
    pub fn single_successor<G: Successors>(&self, graph: &G) -> Option<NodeId> {
        single(self.successors(graph))
    }

    /// Returns `true` if this loop's nodes are a strict superset of `other`'s.
    #[must_use]
    pub fn includes(&self, other: &ControlFlowLoop) -> bool {
        self.nodes.len() > other.nodes.len() && self.nodes.is_superset(&other.nodes)
    }

    /// Returns `true` if any edge between two nodes of the loop carries the
    /// work-group loop marker.
    #[must_use]
    pub fn is_work_group_loop(&self, cfg: &ControlFlowGraph<'_>) -> bool {
        self.nodes.iter().any(|&node| {
            node.index() < cfg.block_count()
                && cfg
                    .outgoing_edges(node)
                    .any(|(_, target, edge)| self.contains(target) && edge.is_work_group_loop())
        })
    }

    /// Locates an instruction inside the loop's blocks.
    ///
    /// Returns the node holding the instruction and its position in the block, or
    /// `None` if the instruction is outside of the loop.
    #[must_use]
    pub fn find_in_loop(
        &self,
        cfg: &ControlFlowGraph<'_>,
        instruction: InstrId,
    ) -> Option<(NodeId, usize)> {
        let (block, position) = cfg.method().location(instruction)?;
        let node = cfg.node_of(block)?;
        self.contains(node).then_some((node, position))
    }

    /// The blocks of the loop, in ascending order.
    pub fn blocks<'c>(
        &'c self,
        cfg: &'c ControlFlowGraph<'_>,
    ) -> impl Iterator<Item = BlockId> + 'c {
        self.nodes.iter().filter_map(|&node| cfg.block_id(node))
    }
}

fn single(set: BTreeSet<NodeId>) -> Option<NodeId> {
    let mut iter = set.into_iter();
    let first = iter.next()?;
    iter.next().is_none().then_some(first)
}

/// Finds all natural loops of a graph.
///
/// Back edges are visited in ascending order of their source, then in successor
/// order, so the result is deterministic for a given graph.
///
/// Edges whose source is unreachable from the entry are ignored.
#[must_use]
pub fn detect_loops<G>(graph: &G, dominators: &DominatorTree) -> Vec<ControlFlowLoop>
where
    G: GraphBase + Successors + Predecessors,
{
    let mut loops = Vec::new();

    for node in graph.node_ids() {
        if !dominators.is_reachable(node) {
            continue;
        }
        for succ in graph.successors(node) {
            if dominators.dominates(succ, node) {
                let body = expand_loop_body(graph, dominators, node, succ);
                loops.push(ControlFlowLoop::new(node, succ, body));
            }
        }
    }

    tracing::debug!(loops = loops.len(), nodes = graph.node_count(), "detected natural loops");
    loops
}

/// Backward reachability from `tail`, stopping at `header` and restricted to nodes
/// dominated by `header`.
fn expand_loop_body<G>(
    graph: &G,
    dominators: &DominatorTree,
    tail: NodeId,
    header: NodeId,
) -> BTreeSet<NodeId>
where
    G: Predecessors,
{
    let mut body = BTreeSet::new();
    body.insert(header);

    let mut worklist = vec![tail];
    while let Some(node) = worklist.pop() {
        if !body.insert(node) {
            continue;
        }
        for pred in graph.predecessors(node) {
            if !body.contains(&pred) && dominators.dominates(header, pred) {
                worklist.push(pred);
            }
        }
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{DataType, Decorations, MethodBuilder},
        utils::graph::compute_dominators,
    };

    fn n(index: usize) -> NodeId {
        NodeId::new(index)
    }

    fn analyze(method: &crate::ir::Method) -> (ControlFlowGraph<'_>, Vec<ControlFlowLoop>) {
        let cfg = ControlFlowGraph::from_method(method).unwrap();
        let loops = detect_loops(&cfg, &compute_dominators(&cfg));
        (cfg, loops)
    }

    #[test]
    fn test_simple_loop() {
        // 0 -> 1 -> 2 -> 1 (back edge), 2 -> 3
        let method = MethodBuilder::new("simple")
            .build_with(|f| {
                let c = f.local("%c", DataType::BOOL);
                f.block(0, |b| b.nop());
                f.block(1, |b| b.nop());
                f.block(2, |b| b.branch_if(c, 1));
                f.block(3, |b| b.ret());
            })
            .unwrap();
        let (cfg, loops) = analyze(&method);

        assert_eq!(loops.len(), 1);
        let l = &loops[0];
        assert_eq!(l.nodes().iter().copied().collect::<Vec<_>>(), vec![n(1), n(2)]);
        assert_eq!(l.header(&cfg), Some(n(1)));
        assert_eq!(l.tail(), n(2));
        assert_eq!(l.back_edge_target(), n(1));
        assert_eq!(l.single_predecessor(&cfg), Some(n(0)));
        assert_eq!(l.single_successor(&cfg), Some(n(3)));
        assert!(!l.is_work_group_loop(&cfg));
    }

    #[test]
    fn test_self_loop() {
        let method = MethodBuilder::new("self")
            .build_with(|f| {
                let c = f.local("%c", DataType::BOOL);
                f.block(0, |b| b.nop());
                f.block(1, |b| b.branch_if(c, 1));
                f.block(2, |b| b.ret());
            })
            .unwrap();
        let (cfg, loops) = analyze(&method);

        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].len(), 1);
        assert_eq!(loops[0].header(&cfg), Some(n(1)));
        assert_eq!(loops[0].tail(), n(1));
    }

    #[test]
    fn test_two_back_edges_same_header_are_separate() {
        // 1 -> 2 -> 1 and 1 -> 3 -> 1
        let method = MethodBuilder::new("two")
            .build_with(|f| {
                let c = f.local("%c", DataType::BOOL);
                let d = f.local("%d", DataType::BOOL);
                f.block(0, |b| b.nop());
                f.block(1, |b| b.branch_if(c, 3));
                f.block(2, |b| b.jump(1));
                f.block(3, |b| b.branch_if(d, 1));
                f.block(4, |b| b.ret());
            })
            .unwrap();
        let (cfg, loops) = analyze(&method);

        assert_eq!(loops.len(), 2);
        assert_eq!(loops[0].tail(), n(2));
        assert_eq!(loops[1].tail(), n(3));
        for l in &loops {
            assert_eq!(l.header(&cfg), Some(n(1)));
            assert_eq!(l.len(), 2);
        }
        assert!(!loops[0].includes(&loops[1]));
    }

    #[test]
    fn test_multiple_exits() {
        // loop {1, 2} exits to 3 from 1 and to 4 from 2
        let method = MethodBuilder::new("exits")
            .build_with(|f| {
                let c = f.local("%c", DataType::BOOL);
                let d = f.local("%d", DataType::BOOL);
                f.block(0, |b| b.nop());
                f.block(1, |b| b.branch_if(c, 3));
                f.block(2, |b| {
                    b.branch_if(d, 1);
                    b.jump(4);
                });
                f.block(3, |b| b.ret());
                f.block(4, |b| b.ret());
            })
            .unwrap();
        let (cfg, loops) = analyze(&method);

        assert_eq!(loops.len(), 1);
        let exits = loops[0].successors(&cfg);
        assert_eq!(exits.into_iter().collect::<Vec<_>>(), vec![n(3), n(4)]);
        assert_eq!(loops[0].single_successor(&cfg), None);
    }

    #[test]
    fn test_entry_loop_has_no_header() {
        // the entry itself heads the loop, so nothing enters it from outside
        let method = MethodBuilder::new("entry")
            .build_with(|f| {
                let c = f.local("%c", DataType::BOOL);
                f.block(0, |b| b.nop());
                f.block(1, |b| b.branch_if(c, 0));
                f.block(2, |b| b.ret());
            })
            .unwrap();
        let (cfg, loops) = analyze(&method);

        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].header(&cfg), None);
        assert!(loops[0].predecessors(&cfg).is_empty());
        assert_eq!(loops[0].single_predecessor(&cfg), None);
    }

    #[test]
    fn test_nested_includes() {
        // outer {1, 2, 3}, inner {2}
        let method = MethodBuilder::new("nested")
            .build_with(|f| {
                let c = f.local("%c", DataType::BOOL);
                let d = f.local("%d", DataType::BOOL);
                f.block(0, |b| b.nop());
                f.block(1, |b| b.nop());
                f.block(2, |b| b.branch_if(c, 2));
                f.block(3, |b| b.branch_if(d, 1));
                f.block(4, |b| b.ret());
            })
            .unwrap();
        let (_, loops) = analyze(&method);

        assert_eq!(loops.len(), 2);
        let inner = loops.iter().find(|l| l.len() == 1).unwrap();
        let outer = loops.iter().find(|l| l.len() == 3).unwrap();
        assert!(outer.includes(inner));
        assert!(!inner.includes(outer));
        assert!(!outer.includes(outer));
    }

    #[test]
    fn test_work_group_marker_and_find_in_loop() {
        let mut branch = None;
        let method = MethodBuilder::new("wg")
            .build_with(|f| {
                let c = f.local("%c", DataType::BOOL);
                f.block(0, |b| b.nop());
                f.block(1, |b| {
                    b.nop();
                    b.branch_if(c, 1);
                    b.decorate(Decorations::WORK_GROUP_LOOP);
                });
                f.block(2, |b| b.ret());
            })
            .unwrap();
        for (id, instruction) in method.block_instructions(BlockId::new(1)).unwrap() {
            if instruction.is_control_flow() {
                branch = Some(id);
            }
        }
        let (cfg, loops) = analyze(&method);

        assert!(loops[0].is_work_group_loop(&cfg));
        assert_eq!(loops[0].find_in_loop(&cfg, branch.unwrap()), Some((n(1), 1)));
        assert_eq!(loops[0].find_in_loop(&cfg, InstrId::new(0)), None);
        assert_eq!(
            loops[0].blocks(&cfg).collect::<Vec<_>>(),
            vec![BlockId::new(1)]
        );
    }

    #[test]
    fn test_unreachable_self_loop_is_ignored() {
        let method = MethodBuilder::new("dead")
            .build_with(|f| {
                f.block(0, |b| b.ret());
                f.block(1, |b| b.jump(1));
            })
            .unwrap();
        let (_, loops) = analyze(&method);
        assert!(loops.is_empty());
    }
}
