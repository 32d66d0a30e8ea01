//! Control Flow Graph implementation.
//!
//! This module provides the main [`ControlFlowGraph`] structure that wraps the basic
//! blocks of a [`Method`] in a bidirectionally navigable graph.

use std::fmt::Write;

use crate::{
    analysis::cfg::{CfgEdge, CfgEdgeKind, EdgeFlags},
    ir::{BasicBlock, BlockId, InstructionKind, Method},
    utils::{
        escape_dot,
        graph::{DirectedGraph, EdgeId, GraphBase, NodeId, Predecessors, RootedGraph, Successors},
    },
    Error::GraphError,
    Result,
};

/// A control flow graph over the basic blocks of one kernel function.
///
/// Node `n{i}` wraps block `bb{i}`; the entry is always the first block. Edges
/// stem from branch instructions and from fall-through into the next block, and
/// carry the markers of the branches creating them.
///
/// The graph borrows the method it was built from and never modifies it. Later
/// passes may only add edge markers (see [`ControlFlowGraph::mark_work_group_loop`]).
///
/// # Construction
///
/// ```rust
/// use qpuc::analysis::ControlFlowGraph;
/// use qpuc::ir::{DataType, MethodBuilder};
/// use qpuc::utils::graph::NodeId;
///
/// let method = MethodBuilder::new("loop").build_with(|f| {
///     let c = f.local("%c", DataType::BOOL);
///     f.block(0, |b| b.nop());
///     f.block(1, |b| b.branch_if(c, 1));
///     f.block(2, |b| b.ret());
/// })?;
///
/// let cfg = ControlFlowGraph::from_method(&method)?;
/// assert_eq!(cfg.block_count(), 3);
/// assert!(cfg.find_edge(NodeId::new(1), NodeId::new(1)).is_some());
/// assert_eq!(cfg.exits(), &[NodeId::new(2)]);
/// # Ok::<(), qpuc::Error>(())
/// ```
#[derive(Debug)]
pub struct ControlFlowGraph<'a> {
    /// The method whose blocks the nodes wrap.
    method: &'a Method,
    /// The underlying directed graph structure.
    graph: DirectedGraph<BlockId, CfgEdge>,
    /// Index of the entry block (always 0).
    entry: NodeId,
    /// Blocks with no successors or ending with a return.
    exits: Vec<NodeId>,
}

impl<'a> ControlFlowGraph<'a> {
    /// Builds the CFG of a method.
    ///
    /// Every branch adds an edge to its target; a branch taken unconditionally
    /// ends the block's outgoing flow. Unless the block ends unconditionally,
    /// control also falls through into the next block.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GraphError`] if the method has no blocks and
    /// [`crate::Error::Malformed`] if a branch targets a block that does not exist.
    pub fn from_method(method: &'a Method) -> Result<Self> {
        let block_count = method.block_count();
        if block_count == 0 {
            return Err(GraphError(format!(
                "Cannot create CFG of '{}' without blocks",
                method.name
            )));
        }

        let mut graph: DirectedGraph<BlockId, CfgEdge> =
            DirectedGraph::with_capacity(block_count, block_count * 2);
        let node_ids: Vec<NodeId> = method.blocks().map(|(id, _)| graph.add_node(id)).collect();

        let mut exits = Vec::new();
        for (index, (block_id, block)) in method.blocks().enumerate() {
            let source = node_ids[index];
            let mut falls_through = true;
            let mut returns = false;

            for (instr_id, instruction) in method.block_instructions(block_id)? {
                match &instruction.kind {
                    InstructionKind::Branch { target, condition } => {
                        let Some(&target_node) = node_ids.get(target.index()) else {
                            return Err(malformed_error!(
                                "Branch {} in {} targets missing block {} (method has {} blocks)",
                                instr_id,
                                block_id,
                                target,
                                block_count
                            ));
                        };
                        let mut edge =
                            CfgEdge::new(CfgEdgeKind::from_condition(*condition), Some(instr_id));
                        edge.insert_flags(EdgeFlags::from(instruction.decorations));
                        Self::insert_edge(&mut graph, source, target_node, edge)?;

                        if condition.local().is_none() {
                            falls_through = false;
                            break;
                        }
                    }
                    InstructionKind::Return { .. } => {
                        falls_through = false;
                        returns = true;
                        break;
                    }
                    _ => {}
                }
            }

            if falls_through && !method.ends_unconditionally(block) {
                if let Some(&next) = node_ids.get(index + 1) {
                    let edge = CfgEdge::new(CfgEdgeKind::Fallthrough, None);
                    Self::insert_edge(&mut graph, source, next, edge)?;
                }
            }

            if returns || graph.successors(source).next().is_none() {
                exits.push(source);
            }
        }

        Ok(Self {
            method,
            graph,
            entry: node_ids[0],
            exits,
        })
    }

    /// Adds an edge, merging markers into an existing edge between the same blocks.
    fn insert_edge(
        graph: &mut DirectedGraph<BlockId, CfgEdge>,
        source: NodeId,
        target: NodeId,
        edge: CfgEdge,
    ) -> Result<()> {
        if let Some(existing) = graph.find_edge(source, target) {
            if let Some(data) = graph.edge_mut(existing) {
                data.insert_flags(edge.flags());
            }
            return Ok(());
        }
        graph.add_edge(source, target, edge)?;
        Ok(())
    }

    /// Returns the method this graph was built from.
    #[must_use]
    pub fn method(&self) -> &'a Method {
        self.method
    }

    /// Returns the entry node.
    #[must_use]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Returns the exit nodes (no successors, or ending with a return).
    #[must_use]
    pub fn exits(&self) -> &[NodeId] {
        &self.exits
    }

    /// Returns the number of blocks in the graph.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the id of the block wrapped by `node`.
    #[must_use]
    pub fn block_id(&self, node: NodeId) -> Option<BlockId> {
        self.graph.node(node).copied()
    }

    /// Returns the node wrapping `block`.
    #[must_use]
    pub fn node_of(&self, block: BlockId) -> Option<NodeId> {
        (block.index() < self.block_count()).then(|| NodeId::new(block.index()))
    }

    /// Returns the basic block wrapped by `node`.
    #[must_use]
    pub fn block(&self, node: NodeId) -> Option<&'a BasicBlock> {
        let method = self.method;
        self.block_id(node).and_then(|id| method.block(id).ok())
    }

    /// Returns the successors of a node.
    pub fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.successors(node)
    }

    /// Returns the predecessors of a node.
    pub fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.predecessors(node)
    }

    /// Returns the outgoing edges of a node together with their targets.
    pub fn outgoing_edges(
        &self,
        node: NodeId,
    ) -> impl Iterator<Item = (EdgeId, NodeId, &CfgEdge)> + '_ {
        self.graph.outgoing_edges(node).filter_map(|(edge_id, edge)| {
            self.graph
                .edge_endpoints(edge_id)
                .map(|(_, target)| (edge_id, target, edge))
        })
    }

    /// Returns the edge from `source` to `target`, if any.
    #[must_use]
    pub fn find_edge(&self, source: NodeId, target: NodeId) -> Option<&CfgEdge> {
        if source.index() >= self.block_count() {
            return None;
        }
        self.graph
            .find_edge(source, target)
            .and_then(|id| self.graph.edge(id))
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Marks the edge from `source` to `target` as closing a work-group loop.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GraphError`] if there is no such edge.
    pub fn mark_work_group_loop(&mut self, source: NodeId, target: NodeId) -> Result<()> {
        if source.index() >= self.block_count() {
            return Err(GraphError(format!("Node {source} does not exist")));
        }
        let edge = self
            .graph
            .find_edge(source, target)
            .and_then(|id| self.graph.edge_mut(id))
            .ok_or_else(|| GraphError(format!("No edge from {source} to {target}")))?;
        edge.insert_flags(EdgeFlags::WORK_GROUP_LOOP);
        Ok(())
    }

    /// Generates a DOT format representation of the CFG.
    ///
    /// Blocks are rendered with their instructions, the entry in green and exits in
    /// red. Work-group loop edges are drawn bold.
    #[must_use]
    pub fn to_dot(&self, title: Option<&str>) -> String {
        let mut dot = String::new();

        dot.push_str("digraph CFG {\n");
        if let Some(name) = title {
            let _ = writeln!(dot, "    label=\"CFG: {}\";", escape_dot(name));
        }
        dot.push_str("    labelloc=t;\n");
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n");
        dot.push_str("    edge [fontname=\"Courier\", fontsize=9];\n\n");

        for node in self.graph.node_ids() {
            let Some(block) = self.block(node) else {
                continue;
            };
            let is_entry = node == self.entry;
            let is_exit = self.exits.contains(&node);

            let mut label = format!("B{} {}", node.index(), escape_dot(&block.label));
            if is_entry {
                label.push_str(" (entry)");
            }
            if is_exit {
                label.push_str(" (exit)");
            }
            label.push_str("\\l");

            for &instr in block.instructions() {
                if let Ok(instruction) = self.method.instruction(instr) {
                    let _ = write!(label, "{}\\l", escape_dot(&instruction.to_string()));
                }
            }

            let style = if is_entry {
                ", style=filled, fillcolor=lightgreen"
            } else if is_exit {
                ", style=filled, fillcolor=lightcoral"
            } else {
                ""
            };

            let _ = writeln!(dot, "    B{} [label=\"{label}\"{style}];", node.index());
        }

        dot.push('\n');

        for node in self.graph.node_ids() {
            for (_, target, edge) in self.outgoing_edges(node) {
                let color = match edge.kind() {
                    CfgEdgeKind::Unconditional => "black",
                    CfgEdgeKind::ConditionalTrue => "green",
                    CfgEdgeKind::ConditionalFalse => "red",
                    CfgEdgeKind::Fallthrough => "gray",
                };
                let bold = if edge.is_work_group_loop() {
                    ", style=bold"
                } else {
                    ""
                };

                let _ = writeln!(
                    dot,
                    "    B{} -> B{} [label=\"{}\", color={color}{bold}];",
                    node.index(),
                    target.index(),
                    escape_dot(&edge.kind().to_string())
                );
            }
        }

        dot.push_str("}\n");
        dot
    }
}

impl GraphBase for ControlFlowGraph<'_> {
    fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        self.graph.node_ids()
    }
}

impl Successors for ControlFlowGraph<'_> {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.graph.successors(node)
    }
}

impl Predecessors for ControlFlowGraph<'_> {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.graph.predecessors(node)
    }
}

impl RootedGraph for ControlFlowGraph<'_> {
    fn entry(&self) -> NodeId {
        self.entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{DataType, Decorations, MethodBuilder},
        Error,
    };

    fn n(index: usize) -> NodeId {
        NodeId::new(index)
    }

    #[test]
    fn test_single_block() {
        let method = MethodBuilder::new("single")
            .build_with(|f| f.block(0, |b| b.ret()))
            .unwrap();
        let cfg = ControlFlowGraph::from_method(&method).unwrap();

        assert_eq!(cfg.block_count(), 1);
        assert_eq!(cfg.edge_count(), 0);
        assert_eq!(cfg.entry(), n(0));
        assert_eq!(cfg.exits(), &[n(0)]);
        assert_eq!(cfg.block_id(n(0)), Some(BlockId::new(0)));
    }

    #[test]
    fn test_conditional_branch_and_fallthrough() {
        let method = MethodBuilder::new("diamond")
            .build_with(|f| {
                let c = f.local("%c", DataType::BOOL);
                f.block(0, |b| b.branch_if(c, 2));
                f.block(1, |b| b.jump(3));
                f.block(2, |b| b.nop());
                f.block(3, |b| b.ret());
            })
            .unwrap();
        let cfg = ControlFlowGraph::from_method(&method).unwrap();

        assert_eq!(
            cfg.find_edge(n(0), n(2)).map(CfgEdge::kind),
            Some(CfgEdgeKind::ConditionalTrue)
        );
        assert_eq!(
            cfg.find_edge(n(0), n(1)).map(CfgEdge::kind),
            Some(CfgEdgeKind::Fallthrough)
        );
        assert_eq!(
            cfg.find_edge(n(1), n(3)).map(CfgEdge::kind),
            Some(CfgEdgeKind::Unconditional)
        );
        assert!(cfg.find_edge(n(1), n(2)).is_none());
        assert_eq!(
            cfg.find_edge(n(2), n(3)).map(CfgEdge::kind),
            Some(CfgEdgeKind::Fallthrough)
        );
        assert_eq!(cfg.predecessors(n(3)).count(), 2);
        assert_eq!(cfg.exits(), &[n(3)]);
    }

    #[test]
    fn test_duplicate_edges_merge_flags() {
        let method = MethodBuilder::new("dup")
            .build_with(|f| {
                let c = f.local("%c", DataType::BOOL);
                f.block(0, |b| {
                    b.branch_if(c, 1);
                    b.decorate(Decorations::WORK_GROUP_LOOP);
                });
                f.block(1, |b| b.ret());
            })
            .unwrap();
        let cfg = ControlFlowGraph::from_method(&method).unwrap();

        assert_eq!(cfg.edge_count(), 1);
        let edge = cfg.find_edge(n(0), n(1)).unwrap();
        assert_eq!(edge.kind(), CfgEdgeKind::ConditionalTrue);
        assert!(edge.is_work_group_loop());
    }

    #[test]
    fn test_dangling_target_is_malformed() {
        let method = MethodBuilder::new("dangling")
            .build_with(|f| f.block(0, |b| b.jump(0)))
            .unwrap();
        assert!(ControlFlowGraph::from_method(&method).is_ok());

        let mut method = method;
        let block = method.add_block("%extra");
        method
            .push_instruction(
                block,
                crate::ir::InstructionKind::Branch {
                    target: BlockId::new(9),
                    condition: crate::ir::BranchCondition::Always,
                }
                .into(),
            )
            .unwrap();
        assert!(matches!(
            ControlFlowGraph::from_method(&method),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_empty_method_is_rejected() {
        let method = Method::new("empty");
        assert!(matches!(
            ControlFlowGraph::from_method(&method),
            Err(Error::GraphError(_))
        ));
    }

    #[test]
    fn test_mark_work_group_loop() {
        let method = MethodBuilder::new("wg")
            .build_with(|f| {
                let c = f.local("%c", DataType::BOOL);
                f.block(0, |b| b.branch_if(c, 0));
                f.block(1, |b| b.ret());
            })
            .unwrap();
        let mut cfg = ControlFlowGraph::from_method(&method).unwrap();

        assert!(!cfg.find_edge(n(0), n(0)).unwrap().is_work_group_loop());
        cfg.mark_work_group_loop(n(0), n(0)).unwrap();
        assert!(cfg.find_edge(n(0), n(0)).unwrap().is_work_group_loop());
        assert!(cfg.mark_work_group_loop(n(1), n(0)).is_err());
        assert!(cfg.mark_work_group_loop(n(7), n(0)).is_err());
    }

    #[test]
    fn test_to_dot() {
        let method = MethodBuilder::new("dot")
            .build_with(|f| {
                let c = f.local("%c", DataType::BOOL);
                f.block(0, |b| b.branch_if(c, 0));
                f.block(1, |b| b.ret());
            })
            .unwrap();
        let cfg = ControlFlowGraph::from_method(&method).unwrap();
        let dot = cfg.to_dot(Some("dot"));

        assert!(dot.starts_with("digraph CFG {"));
        assert!(dot.contains("label=\"CFG: dot\""));
        assert!(dot.contains("fillcolor=lightgreen"));
        assert!(dot.contains("B0 -> B0 [label=\"true\", color=green];"));
        assert!(dot.contains("B0 -> B1 [label=\"fallthrough\", color=gray];"));
        assert!(dot.ends_with("}\n"));
    }
}
