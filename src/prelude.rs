//! # qpuc Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the qpuc library. Import this module to get quick access to the essential
//! types for building kernels and running the loop and memory analyses.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all qpuc operations
pub use crate::Error;

/// The result type used throughout qpuc
pub use crate::Result;

/// Hardware parameters and analysis caps
pub use crate::BackendConfig;

// ================================================================================================
// Intermediate Representation
// ================================================================================================

/// Arena, handles and the construction DSL
pub use crate::ir::{BlockId, InstrId, LocalId, Method, MethodBuilder};

/// Types, operands and instructions
pub use crate::ir::{
    AddressSpace, BranchCondition, Comparison, DataType, Decorations, Instruction,
    InstructionKind, LocalKind, MemoryInstruction, MemoryOperation, OpCode, Value,
};

// ================================================================================================
// Analyses
// ================================================================================================

/// Control flow and loop structure
pub use crate::analysis::{detect_loops, ControlFlowGraph, ControlFlowLoop, LoopInclusionTree};

/// Per-loop analyses
pub use crate::analysis::{
    find_loop_invariants, DataDependencyGraph, InductionAnalyzer, InductionVariable,
};

/// Memory classification
pub use crate::analysis::{is_derived_from_memory, MemoryAccessInfo};

/// Whole-function driver
pub use crate::analysis::{analyze_function, analyze_functions, FunctionSummary, LoopSummary};

// ================================================================================================
// Graph Infrastructure
// ================================================================================================

/// Dominance and graph traits
pub use crate::utils::graph::{
    compute_dominators, DominatorTree, GraphBase, NodeId, Predecessors, RootedGraph, Successors,
};

// ================================================================================================
// Frontend Artifacts
// ================================================================================================

/// Compilation data handles and source detection
pub use crate::precompilation::{detect_source_type, CompilationData, Frontend, SourceType};
