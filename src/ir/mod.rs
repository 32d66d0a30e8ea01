//! Intermediate representation of kernel functions.
//!
//! The IR is SSA-like but not strictly SSA: a local may be assigned more than once
//! (loop counters usually are). Cyclic relations between locals and instructions
//! are expressed through arena handles instead of pointers.
//!
//! # Architecture
//!
//! - [`types`](DataType) - data types and address spaces
//! - [`Value`] - literal or local operand with a type
//! - [`Local`] - named value slot with kind tag and use-list
//! - [`Instruction`] - closed instruction set with decorations
//! - [`MemoryInstruction`] - the four memory operations
//! - [`Method`] - the arena tying it all together
//! - [`MethodBuilder`] - closure-based construction DSL

mod builder;
mod instruction;
mod local;
mod memory;
mod method;
mod types;
mod value;

pub use builder::{BlockBuilder, MethodBuilder, MethodContext, Operand};
pub use instruction::{
    BranchCondition, Comparison, Decorations, InstrId, Instruction, InstructionKind, OpCode,
};
pub use local::{Local, LocalId, LocalKind, LocalUse, UseKind};
pub use memory::{MemoryInstruction, MemoryOperation};
pub use method::{BasicBlock, BlockId, Method};
pub use types::{AddressSpace, DataType, POINTER_WIDTH};
pub use value::{Literal, Value, ValueKind};
