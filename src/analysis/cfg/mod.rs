//! Control Flow Graph (CFG) construction and loop structure.
//!
//! # Architecture
//!
//! The CFG builds upon the generic [`crate::utils::graph::DirectedGraph`]
//! infrastructure, wrapping the basic blocks of a [`crate::ir::Method`] in nodes and
//! leaving dominance to a [`crate::utils::graph::DominatorTree`] supplied alongside.
//!
//! # Key Components
//!
//! - [`ControlFlowGraph`] - The graph over one method's blocks
//! - [`CfgEdge`] / [`CfgEdgeKind`] / [`EdgeFlags`] - Edge kind and markers
//! - [`ControlFlowLoop`] / [`detect_loops`] - Natural loops from back edges
//! - [`LoopInclusionTree`] - The loop nesting forest
//!
//! # Examples
//!
//! ```rust
//! use qpuc::analysis::{detect_loops, ControlFlowGraph, LoopInclusionTree};
//! use qpuc::ir::{DataType, MethodBuilder};
//! use qpuc::utils::graph::compute_dominators;
//!
//! let method = MethodBuilder::new("nested").build_with(|f| {
//!     let c = f.local("%c", DataType::BOOL);
//!     let d = f.local("%d", DataType::BOOL);
//!     f.block(0, |b| b.nop());
//!     f.block(1, |b| b.nop());
//!     f.block(2, |b| b.branch_if(c, 2));
//!     f.block(3, |b| b.branch_if(d, 1));
//!     f.block(4, |b| b.ret());
//! })?;
//!
//! let cfg = ControlFlowGraph::from_method(&method)?;
//! let loops = detect_loops(&cfg, &compute_dominators(&cfg));
//! let tree = LoopInclusionTree::build(loops);
//! assert_eq!(tree.roots().len(), 1);
//! # Ok::<(), qpuc::Error>(())
//! ```

mod edge;
mod graph;
mod inclusion;
mod loops;

pub use edge::{CfgEdge, CfgEdgeKind, EdgeFlags};
pub use graph::ControlFlowGraph;
pub use inclusion::LoopInclusionTree;
pub use loops::{detect_loops, ControlFlowLoop};
