//! Program analysis for QPU kernels.
//!
//! This module provides the loop and memory analyses the backend's optimizations
//! build on. It builds upon the generic graph infrastructure in
//! [`crate::utils::graph`] and the arena IR in [`crate::ir`]; no analysis mutates
//! either.
//!
//! # Architecture
//!
//! - [`cfg`] - Control flow graph, natural loops and the loop inclusion forest
//! - [`DataDependencyGraph`] - Locals flowing between basic blocks
//! - [`InductionAnalyzer`] - Induction variables and iteration counts
//! - [`find_loop_invariants`] - Loop-invariant instructions
//! - [`MemoryAccessInfo`] - Memory operand classification and VPM eligibility
//! - [`analyze_function`] / [`analyze_functions`] - The whole loop pipeline per
//!   function
//!
//! # Usage
//!
//! ```rust
//! use qpuc::analysis::{detect_loops, ControlFlowGraph};
//! use qpuc::ir::{DataType, MethodBuilder};
//! use qpuc::utils::graph::compute_dominators;
//!
//! let method = MethodBuilder::new("spin").build_with(|f| {
//!     let c = f.local("%c", DataType::BOOL);
//!     f.block(0, |b| b.nop());
//!     f.block(1, |b| b.branch_if(c, 1));
//!     f.block(2, |b| b.ret());
//! })?;
//!
//! let cfg = ControlFlowGraph::from_method(&method)?;
//! let dominators = compute_dominators(&cfg);
//! let loops = detect_loops(&cfg, &dominators);
//! assert_eq!(loops.len(), 1);
//! assert!(dominators.dominates(cfg.entry(), loops[0].tail()));
//! # Ok::<(), qpuc::Error>(())
//! ```

pub mod cfg;

mod analyzer;
mod dependency;
mod induction;
mod invariants;
mod memory;

pub use analyzer::{analyze_function, analyze_functions, FunctionSummary, LoopSummary};
pub use cfg::{
    detect_loops, CfgEdge, CfgEdgeKind, ControlFlowGraph, ControlFlowLoop, EdgeFlags,
    LoopInclusionTree,
};
pub use dependency::DataDependencyGraph;
pub use induction::{InductionAnalyzer, InductionVariable};
pub use invariants::find_loop_invariants;
pub use memory::{is_derived_from_memory, MemoryAccessInfo};
