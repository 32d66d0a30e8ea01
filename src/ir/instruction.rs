//! The closed instruction set of the IR.

use std::fmt;

use bitflags::bitflags;
use strum::{Display, EnumIter, EnumString};

use crate::ir::{BlockId, LocalId, MemoryInstruction, MemoryOperation, Value};

/// Handle of an instruction inside its method's arena.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrId(pub(crate) usize);

impl InstrId {
    /// Creates a new `InstrId` from a raw index value.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        InstrId(index)
    }

    /// Returns the raw 0-based index of this instruction.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstrId({})", self.0)
    }
}

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Arithmetic and bitwise operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum OpCode {
    /// Integer addition
    Add,
    /// Integer subtraction
    Sub,
    /// Integer multiplication
    Mul,
    /// Bitwise and
    And,
    /// Bitwise or
    Or,
    /// Bitwise exclusive or
    Xor,
    /// Shift left
    Shl,
    /// Logical shift right
    Shr,
    /// Bitwise negation (unary)
    Not,
}

/// Integer comparison operators.
///
/// # Examples
///
/// ```rust
/// use qpuc::ir::Comparison;
///
/// assert!(Comparison::Lt.evaluate(1, 2));
/// assert_eq!(Comparison::Lt.negate(), Comparison::Ge);
/// // a < b  <=>  b > a
/// assert_eq!(Comparison::Lt.swap(), Comparison::Gt);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Comparison {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Comparison {
    /// The operator that holds exactly when this one does not.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Comparison::Eq => Comparison::Ne,
            Comparison::Ne => Comparison::Eq,
            Comparison::Lt => Comparison::Ge,
            Comparison::Le => Comparison::Gt,
            Comparison::Gt => Comparison::Le,
            Comparison::Ge => Comparison::Lt,
        }
    }

    /// The operator to use when both operands change sides.
    #[must_use]
    pub fn swap(self) -> Self {
        match self {
            Comparison::Eq | Comparison::Ne => self,
            Comparison::Lt => Comparison::Gt,
            Comparison::Le => Comparison::Ge,
            Comparison::Gt => Comparison::Lt,
            Comparison::Ge => Comparison::Le,
        }
    }

    /// Applies the operator to two integers.
    #[must_use]
    pub fn evaluate(self, left: i64, right: i64) -> bool {
        match self {
            Comparison::Eq => left == right,
            Comparison::Ne => left != right,
            Comparison::Lt => left < right,
            Comparison::Le => left <= right,
            Comparison::Gt => left > right,
            Comparison::Ge => left >= right,
        }
    }
}

bitflags! {
    /// Markers attached to instructions by earlier passes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Decorations: u8 {
        /// Must not be removed, duplicated or reordered
        const VOLATILE = 0x01;
        /// Branch closing the implicit loop over the work-items of a work-group
        const WORK_GROUP_LOOP = 0x02;
    }
}

/// When a branch is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchCondition {
    /// Always taken
    Always,
    /// Taken if the local holds a non-zero value
    IfTrue(LocalId),
    /// Taken if the local holds zero
    IfFalse(LocalId),
}

impl BranchCondition {
    /// The tested local, if any.
    #[must_use]
    pub fn local(self) -> Option<LocalId> {
        match self {
            BranchCondition::Always => None,
            BranchCondition::IfTrue(local) | BranchCondition::IfFalse(local) => Some(local),
        }
    }
}

/// The instruction variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    /// `dest = source`
    Move {
        /// Assigned local
        dest: LocalId,
        /// Copied value
        source: Value,
    },
    /// `dest = left op right`, or `dest = op left` for unary operations
    Operation {
        /// The operation
        op: OpCode,
        /// Assigned local
        dest: LocalId,
        /// First operand
        left: Value,
        /// Second operand, absent for unary operations
        right: Option<Value>,
    },
    /// `dest = left cmp right`
    Compare {
        /// Assigned boolean local
        dest: LocalId,
        /// The operator
        comparison: Comparison,
        /// First operand
        left: Value,
        /// Second operand
        right: Value,
    },
    /// Transfers control to the start of `target`
    Branch {
        /// Target block
        target: BlockId,
        /// When the branch is taken
        condition: BranchCondition,
    },
    /// Memory access
    Memory(MemoryInstruction),
    /// Call of a builtin or library function
    Call {
        /// Assigned local, absent for void functions
        dest: Option<LocalId>,
        /// Callee name
        function: String,
        /// Call arguments
        args: Vec<Value>,
        /// Whether the callee has neither side effects nor state
        pure: bool,
    },
    /// Leaves the kernel
    Return {
        /// Returned value, if any
        value: Option<Value>,
    },
    /// Placeholder without effect
    Nop,
}

/// One instruction with its decorations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instruction {
    /// What the instruction does
    pub kind: InstructionKind,
    /// Markers from earlier passes
    pub decorations: Decorations,
}

impl Instruction {
    /// Creates an undecorated instruction.
    #[must_use]
    pub fn new(kind: InstructionKind) -> Self {
        Instruction {
            kind,
            decorations: Decorations::empty(),
        }
    }

    /// Adds decorations.
    #[must_use]
    pub fn with_decorations(mut self, decorations: Decorations) -> Self {
        self.decorations |= decorations;
        self
    }

    /// The local assigned by this instruction.
    ///
    /// A memory READ assigns its destination; the addresses of all other memory
    /// operations are only read.
    #[must_use]
    pub fn output(&self) -> Option<LocalId> {
        match &self.kind {
            InstructionKind::Move { dest, .. }
            | InstructionKind::Operation { dest, .. }
            | InstructionKind::Compare { dest, .. } => Some(*dest),
            InstructionKind::Call { dest, .. } => *dest,
            InstructionKind::Memory(memory) if memory.operation() == MemoryOperation::Read => {
                memory.destination().as_local()
            }
            _ => None,
        }
    }

    /// The values read by this instruction, in operand order.
    #[must_use]
    pub fn arguments(&self) -> Vec<&Value> {
        match &self.kind {
            InstructionKind::Move { source, .. } => vec![source],
            InstructionKind::Operation { left, right, .. } => {
                std::iter::once(left).chain(right.as_ref()).collect()
            }
            InstructionKind::Compare { left, right, .. } => vec![left, right],
            InstructionKind::Memory(memory) => {
                if memory.operation() == MemoryOperation::Read {
                    vec![memory.source(), memory.count()]
                } else {
                    vec![memory.destination(), memory.source(), memory.count()]
                }
            }
            InstructionKind::Call { args, .. } => args.iter().collect(),
            InstructionKind::Return { value } => value.iter().collect(),
            InstructionKind::Branch { .. } | InstructionKind::Nop => Vec::new(),
        }
    }

    /// All locals read by this instruction, including a branch condition.
    #[must_use]
    pub fn read_locals(&self) -> Vec<LocalId> {
        let mut locals: Vec<LocalId> = self
            .arguments()
            .into_iter()
            .filter_map(Value::as_local)
            .collect();
        if let InstructionKind::Branch { condition, .. } = &self.kind {
            locals.extend(condition.local());
        }
        locals
    }

    /// Returns `true` if the instruction reads `local`.
    #[must_use]
    pub fn reads_local(&self, local: LocalId) -> bool {
        self.read_locals().contains(&local)
    }

    /// Returns `true` if executing the instruction has effects beyond its output.
    #[must_use]
    pub fn has_side_effects(&self) -> bool {
        if self.decorations.contains(Decorations::VOLATILE) {
            return true;
        }
        match &self.kind {
            InstructionKind::Memory(memory) => memory.has_side_effects(),
            InstructionKind::Call { pure, .. } => !pure,
            InstructionKind::Branch { .. } | InstructionKind::Return { .. } => true,
            InstructionKind::Move { .. }
            | InstructionKind::Operation { .. }
            | InstructionKind::Compare { .. }
            | InstructionKind::Nop => false,
        }
    }

    /// The memory access, if this is a memory instruction.
    #[must_use]
    pub fn as_memory(&self) -> Option<&MemoryInstruction> {
        match &self.kind {
            InstructionKind::Memory(memory) => Some(memory),
            _ => None,
        }
    }

    /// Returns `true` for branches and returns.
    #[must_use]
    pub fn is_control_flow(&self) -> bool {
        matches!(
            self.kind,
            InstructionKind::Branch { .. } | InstructionKind::Return { .. }
        )
    }
}

impl From<InstructionKind> for Instruction {
    fn from(kind: InstructionKind) -> Self {
        Instruction::new(kind)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            InstructionKind::Move { dest, source } => write!(f, "{dest} = {source}")?,
            InstructionKind::Operation {
                op,
                dest,
                left,
                right: Some(right),
            } => write!(f, "{dest} = {op} {left}, {right}")?,
            InstructionKind::Operation {
                op,
                dest,
                left,
                right: None,
            } => write!(f, "{dest} = {op} {left}")?,
            InstructionKind::Compare {
                dest,
                comparison,
                left,
                right,
            } => write!(f, "{dest} = icmp {comparison} {left}, {right}")?,
            InstructionKind::Branch { target, condition } => match condition {
                BranchCondition::Always => write!(f, "br {target}")?,
                BranchCondition::IfTrue(local) => write!(f, "br {target} if {local}")?,
                BranchCondition::IfFalse(local) => write!(f, "br {target} unless {local}")?,
            },
            InstructionKind::Memory(memory) => write!(f, "{memory}")?,
            InstructionKind::Call {
                dest,
                function,
                args,
                ..
            } => {
                if let Some(dest) = dest {
                    write!(f, "{dest} = ")?;
                }
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(f, "call {function}({})", args.join(", "))?;
            }
            InstructionKind::Return { value: Some(value) } => write!(f, "ret {value}")?,
            InstructionKind::Return { value: None } => write!(f, "ret")?,
            InstructionKind::Nop => write!(f, "nop")?,
        }
        if self.decorations.contains(Decorations::VOLATILE) {
            write!(f, " (volatile)")?;
        }
        if self.decorations.contains(Decorations::WORK_GROUP_LOOP) {
            write!(f, " (work-group loop)")?;
        }
        Ok(())
    }
}
