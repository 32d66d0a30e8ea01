//! Kernel functions: the arena owning locals, instructions and basic blocks.

use std::{collections::HashSet, fmt};

use crate::{
    ir::{
        DataType, InstrId, Instruction, InstructionKind, Local, LocalId, LocalKind, LocalUse,
        UseKind, Value,
    },
    Result,
};

/// Handle of a basic block inside its method.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    /// Creates a new `BlockId` from a raw index value.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        BlockId(index)
    }

    /// Returns the raw 0-based index of this block.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// An ordered sequence of instructions with a label.
#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    /// Label as emitted by the frontend
    pub label: String,
    instructions: Vec<InstrId>,
}

impl BasicBlock {
    /// The instructions of this block in execution order.
    #[must_use]
    pub fn instructions(&self) -> &[InstrId] {
        &self.instructions
    }

    /// Returns `true` if the block holds no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// A kernel function.
///
/// Locals, instructions and blocks live in arenas addressed by [`LocalId`],
/// [`InstrId`] and [`BlockId`]. Appending an instruction records it in the
/// use-lists of every local it reads or writes.
///
/// # Examples
///
/// ```rust
/// use qpuc::ir::{DataType, Instruction, InstructionKind, LocalKind, Method, Value};
///
/// let mut method = Method::new("kernel");
/// let entry = method.add_block("%entry");
/// let x = method.add_local("%x", DataType::INT32, LocalKind::Ordinary);
/// let mov = method.push_instruction(
///     entry,
///     Instruction::new(InstructionKind::Move { dest: x, source: Value::int(7) }),
/// )?;
///
/// assert_eq!(method.local(x)?.writers().collect::<Vec<_>>(), vec![mov]);
/// assert_eq!(method.location(mov), Some((entry, 0)));
/// # Ok::<(), qpuc::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Method {
    /// Function name
    pub name: String,
    locals: Vec<Local>,
    instructions: Vec<Instruction>,
    locations: Vec<(BlockId, usize)>,
    blocks: Vec<BasicBlock>,
}

impl Method {
    /// Creates an empty method.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Method {
            name: name.into(),
            ..Method::default()
        }
    }

    /// Adds a local and returns its handle.
    pub fn add_local(&mut self, name: impl Into<String>, ty: DataType, kind: LocalKind) -> LocalId {
        let id = LocalId::new(self.locals.len());
        self.locals.push(Local::new(name, ty, kind));
        id
    }

    /// Records that `local` aliases or was derived from `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if either local does not exist.
    pub fn set_reference(&mut self, local: LocalId, reference: LocalId) -> Result<()> {
        self.local(reference)?;
        self.local_mut(local)?.reference = Some(reference);
        Ok(())
    }

    /// Appends an empty basic block.
    pub fn add_block(&mut self, label: impl Into<String>) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        self.blocks.push(BasicBlock {
            label: label.into(),
            instructions: Vec::new(),
        });
        id
    }

    /// Appends an instruction to the end of `block` and updates the use-lists.
    ///
    /// Branch targets are not checked here, since a branch may refer to a block
    /// appended later; [`crate::analysis::ControlFlowGraph::from_method`] rejects
    /// dangling targets.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the block or any referenced local does
    /// not exist.
    pub fn push_instruction(&mut self, block: BlockId, instruction: Instruction) -> Result<InstrId> {
        if block.index() >= self.blocks.len() {
            return Err(malformed_error!("Block {} does not exist", block));
        }

        let output = instruction.output();
        let reads = instruction.read_locals();
        for local in output.iter().chain(reads.iter()) {
            if local.index() >= self.locals.len() {
                return Err(malformed_error!(
                    "Instruction '{}' refers to unknown local {}",
                    instruction,
                    local
                ));
            }
        }

        let id = InstrId::new(self.instructions.len());
        let mut seen = HashSet::new();
        for local in reads {
            if seen.insert(local) {
                self.locals[local.index()].users.push(LocalUse {
                    instruction: id,
                    kind: UseKind::Reader,
                });
            }
        }
        if let Some(local) = output {
            self.locals[local.index()].users.push(LocalUse {
                instruction: id,
                kind: UseKind::Writer,
            });
        }

        let position = self.blocks[block.index()].instructions.len();
        self.blocks[block.index()].instructions.push(id);
        self.locations.push((block, position));
        self.instructions.push(instruction);
        Ok(id)
    }

    /// Returns a local.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for a dangling id.
    pub fn local(&self, id: LocalId) -> Result<&Local> {
        self.locals
            .get(id.index())
            .ok_or_else(|| malformed_error!("Local {} does not exist", id))
    }

    fn local_mut(&mut self, id: LocalId) -> Result<&mut Local> {
        self.locals
            .get_mut(id.index())
            .ok_or_else(|| malformed_error!("Local {} does not exist", id))
    }

    /// Returns an instruction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for a dangling id.
    pub fn instruction(&self, id: InstrId) -> Result<&Instruction> {
        self.instructions
            .get(id.index())
            .ok_or_else(|| malformed_error!("Instruction {} does not exist", id))
    }

    /// Returns a basic block.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for a dangling id.
    pub fn block(&self, id: BlockId) -> Result<&BasicBlock> {
        self.blocks
            .get(id.index())
            .ok_or_else(|| malformed_error!("Block {} does not exist", id))
    }

    /// The block holding an instruction and its position in that block.
    #[must_use]
    pub fn location(&self, id: InstrId) -> Option<(BlockId, usize)> {
        self.locations.get(id.index()).copied()
    }

    /// Number of basic blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// All blocks in layout order.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .map(|(index, block)| (BlockId::new(index), block))
    }

    /// All locals in creation order.
    pub fn locals(&self) -> impl Iterator<Item = (LocalId, &Local)> + '_ {
        self.locals
            .iter()
            .enumerate()
            .map(|(index, local)| (LocalId::new(index), local))
    }

    /// Number of instructions.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// The instructions of one block with their handles, in execution order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for a dangling block id.
    pub fn block_instructions(
        &self,
        block: BlockId,
    ) -> Result<impl Iterator<Item = (InstrId, &Instruction)> + '_> {
        let block = self.block(block)?;
        Ok(block
            .instructions
            .iter()
            .map(|&id| (id, &self.instructions[id.index()])))
    }

    /// A value referring to `local`, typed with the local's type.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for a dangling id.
    pub fn value_of(&self, local: LocalId) -> Result<Value> {
        Ok(Value::local(local, self.local(local)?.ty.clone()))
    }

    /// Resolves a derived or aliased local to the local it ultimately refers to.
    ///
    /// Follows `reference` links; a cycle stops at the last local not yet visited.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for a dangling id.
    pub fn base_of(&self, local: LocalId) -> Result<LocalId> {
        let mut current = local;
        let mut visited = HashSet::new();
        visited.insert(current);
        while let Some(next) = self.local(current)?.reference {
            if !visited.insert(next) {
                break;
            }
            current = next;
        }
        Ok(current)
    }

    /// Renders a value with the local's name instead of its handle.
    #[must_use]
    pub fn describe_value(&self, value: &Value) -> String {
        match value.as_local().and_then(|id| self.locals.get(id.index())) {
            Some(local) => format!("{} {}", value.ty, local.name),
            None => value.to_string(),
        }
    }

    /// Returns `true` if the block's last instruction is an unconditional branch or
    /// a return, so control never falls through into the next block.
    #[must_use]
    pub fn ends_unconditionally(&self, block: &BasicBlock) -> bool {
        block
            .instructions
            .last()
            .and_then(|id| self.instructions.get(id.index()))
            .is_some_and(|instruction| match &instruction.kind {
                InstructionKind::Branch { condition, .. } => condition.local().is_none(),
                InstructionKind::Return { .. } => true,
                _ => false,
            })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "kernel {} {{", self.name)?;
        for (id, block) in self.blocks() {
            writeln!(f, "{id} ({}):", block.label)?;
            for instr in &block.instructions {
                writeln!(f, "    {}", self.instructions[instr.index()])?;
            }
        }
        write!(f, "}}")
    }
}
