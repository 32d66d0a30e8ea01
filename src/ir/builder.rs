//! Builder pattern for programmatic method construction.
//!
//! The builder uses a closure-based API where all blocks are defined within a
//! single expression, so the control-flow structure of a kernel stays visible at a
//! glance:
//!
//! ```rust
//! use qpuc::ir::{DataType, MethodBuilder};
//!
//! let method = MethodBuilder::new("select").build_with(|f| {
//!     let cond = f.parameter("%cond", DataType::BOOL);
//!
//!     f.block(0, |b| b.branch_if(cond, 2));
//!     f.block(1, |b| b.jump(3));
//!     f.block(2, |b| b.jump(3));
//!     f.block(3, |b| b.ret());
//! })?;
//!
//! assert_eq!(method.block_count(), 4);
//! # Ok::<(), qpuc::Error>(())
//! ```
//!
//! Blocks are identified by index; gaps are filled with empty blocks. Errors raised
//! while the closure runs (an operand naming an unknown local, a READ with a count
//! other than one) are collected and the first one is returned by
//! [`MethodBuilder::build_with`].

use std::collections::BTreeMap;

use crate::{
    ir::{
        AddressSpace, BlockId, BranchCondition, Comparison, DataType, Decorations, Instruction,
        InstructionKind, LocalId, LocalKind, MemoryInstruction, MemoryOperation, Method, OpCode,
        Value,
    },
    Error, Result,
};

/// An instruction operand as accepted by the builder.
///
/// Locals are resolved to values typed with the local's own type, plain integers
/// become `i32` literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// A local, typed on resolution
    Local(LocalId),
    /// A fully specified value
    Value(Value),
}

impl From<LocalId> for Operand {
    fn from(local: LocalId) -> Self {
        Operand::Local(local)
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Operand::Value(Value::int(i64::from(value)))
    }
}

/// Builder for constructing methods programmatically.
#[derive(Debug)]
pub struct MethodBuilder {
    method: Method,
    blocks: BTreeMap<usize, Vec<Instruction>>,
    error: Option<Error>,
}

impl MethodBuilder {
    /// Creates a builder for a method called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        MethodBuilder {
            method: Method::new(name),
            blocks: BTreeMap::new(),
            error: None,
        }
    }

    /// Builds the method using a closure that defines all locals and blocks.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded while the closure ran, or the error of
    /// appending an instruction to the method.
    pub fn build_with<F>(mut self, f: F) -> Result<Method>
    where
        F: FnOnce(&mut MethodContext<'_>),
    {
        let mut ctx = MethodContext { builder: &mut self };
        f(&mut ctx);
        self.build()
    }

    fn build(self) -> Result<Method> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut method = self.method;
        let block_count = self.blocks.keys().next_back().map_or(0, |max| max + 1);
        for index in 0..block_count {
            method.add_block(format!("%bb{index}"));
        }
        for (index, instructions) in self.blocks {
            for instruction in instructions {
                method.push_instruction(BlockId::new(index), instruction)?;
            }
        }
        Ok(method)
    }

    fn record(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

/// Context passed to the build closure for defining locals and blocks.
pub struct MethodContext<'a> {
    builder: &'a mut MethodBuilder,
}

impl MethodContext<'_> {
    /// Declares a kernel parameter.
    pub fn parameter(&mut self, name: &str, ty: DataType) -> LocalId {
        self.builder.method.add_local(name, ty, LocalKind::Parameter)
    }

    /// Declares a global holding `element`; the returned local is its address.
    pub fn global(
        &mut self,
        name: &str,
        element: DataType,
        address_space: AddressSpace,
        constant: bool,
    ) -> LocalId {
        self.builder.method.add_local(
            name,
            element.pointer_to(address_space),
            LocalKind::Global {
                constant,
                address_space,
            },
        )
    }

    /// Declares a stack allocation holding `element`; the returned local is its address.
    pub fn stack_allocation(&mut self, name: &str, element: DataType) -> LocalId {
        self.builder.method.add_local(
            name,
            element.pointer_to(AddressSpace::Private),
            LocalKind::StackAllocation,
        )
    }

    /// Declares an ordinary local.
    pub fn local(&mut self, name: &str, ty: DataType) -> LocalId {
        self.builder.method.add_local(name, ty, LocalKind::Ordinary)
    }

    /// Declares an ordinary local aliasing `reference`.
    pub fn alias(&mut self, name: &str, ty: DataType, reference: LocalId) -> LocalId {
        let id = self.local(name, ty);
        if let Err(error) = self.builder.method.set_reference(id, reference) {
            self.builder.record(error);
        }
        id
    }

    /// Defines the block with index `id`.
    pub fn block<F>(&mut self, id: usize, f: F)
    where
        F: FnOnce(&mut BlockBuilder<'_>),
    {
        let mut block = BlockBuilder {
            method: &self.builder.method,
            instructions: Vec::new(),
            error: None,
        };
        f(&mut block);

        let BlockBuilder {
            instructions,
            error,
            ..
        } = block;
        if let Some(error) = error {
            self.builder.record(error);
        }
        self.builder
            .blocks
            .entry(id)
            .or_default()
            .extend(instructions);
    }
}

/// Builder for the instructions of one block.
///
/// Operations write into an explicitly given destination local; nothing is
/// allocated implicitly.
pub struct BlockBuilder<'a> {
    method: &'a Method,
    instructions: Vec<Instruction>,
    error: Option<Error>,
}

impl BlockBuilder<'_> {
    fn record(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn resolve(&mut self, operand: impl Into<Operand>) -> Value {
        match operand.into() {
            Operand::Value(value) => value,
            Operand::Local(local) => match self.method.value_of(local) {
                Ok(value) => value,
                Err(error) => {
                    self.record(error);
                    Value::local(local, DataType::Void)
                }
            },
        }
    }

    /// Appends an arbitrary instruction.
    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// Adds decorations to the most recently appended instruction.
    pub fn decorate(&mut self, decorations: Decorations) {
        if let Some(last) = self.instructions.last_mut() {
            last.decorations |= decorations;
        }
    }

    /// Adds: `dest = source`
    pub fn mov(&mut self, dest: LocalId, source: impl Into<Operand>) {
        let source = self.resolve(source);
        self.push(InstructionKind::Move { dest, source }.into());
    }

    /// Adds: `dest = left op right`
    pub fn op(
        &mut self,
        op: OpCode,
        dest: LocalId,
        left: impl Into<Operand>,
        right: impl Into<Operand>,
    ) {
        let left = self.resolve(left);
        let right = self.resolve(right);
        self.push(
            InstructionKind::Operation {
                op,
                dest,
                left,
                right: Some(right),
            }
            .into(),
        );
    }

    /// Adds: `dest = left + right`
    pub fn add(&mut self, dest: LocalId, left: impl Into<Operand>, right: impl Into<Operand>) {
        self.op(OpCode::Add, dest, left, right);
    }

    /// Adds: `dest = left - right`
    pub fn sub(&mut self, dest: LocalId, left: impl Into<Operand>, right: impl Into<Operand>) {
        self.op(OpCode::Sub, dest, left, right);
    }

    /// Adds: `dest = left * right`
    pub fn mul(&mut self, dest: LocalId, left: impl Into<Operand>, right: impl Into<Operand>) {
        self.op(OpCode::Mul, dest, left, right);
    }

    /// Adds: `dest = left cmp right`
    pub fn compare(
        &mut self,
        dest: LocalId,
        comparison: Comparison,
        left: impl Into<Operand>,
        right: impl Into<Operand>,
    ) {
        let left = self.resolve(left);
        let right = self.resolve(right);
        self.push(
            InstructionKind::Compare {
                dest,
                comparison,
                left,
                right,
            }
            .into(),
        );
    }

    /// Adds an unconditional branch to block `target`.
    pub fn jump(&mut self, target: usize) {
        self.branch(target, BranchCondition::Always);
    }

    /// Adds a branch to block `target` taken if `cond` is true.
    pub fn branch_if(&mut self, cond: LocalId, target: usize) {
        self.branch(target, BranchCondition::IfTrue(cond));
    }

    /// Adds a branch to block `target` taken if `cond` is false.
    pub fn branch_unless(&mut self, cond: LocalId, target: usize) {
        self.branch(target, BranchCondition::IfFalse(cond));
    }

    fn branch(&mut self, target: usize, condition: BranchCondition) {
        self.push(
            InstructionKind::Branch {
                target: BlockId::new(target),
                condition,
            }
            .into(),
        );
    }

    /// Adds a memory instruction with explicit operation and count.
    pub fn memory(
        &mut self,
        operation: MemoryOperation,
        destination: impl Into<Operand>,
        source: impl Into<Operand>,
        count: impl Into<Operand>,
    ) {
        let destination = self.resolve(destination);
        let source = self.resolve(source);
        let count = self.resolve(count);
        match MemoryInstruction::new(operation, destination, source, count) {
            Ok(memory) => self.push(InstructionKind::Memory(memory).into()),
            Err(error) => self.record(error),
        }
    }

    /// Adds: `dest = load memory at address`
    pub fn read(&mut self, dest: LocalId, address: impl Into<Operand>) {
        self.memory(MemoryOperation::Read, dest, address, 1);
    }

    /// Adds: `store value into address`
    pub fn write(&mut self, address: impl Into<Operand>, value: impl Into<Operand>) {
        self.memory(MemoryOperation::Write, address, value, 1);
    }

    /// Adds: `copy count entries from source into dest`
    pub fn copy(
        &mut self,
        dest: impl Into<Operand>,
        source: impl Into<Operand>,
        count: impl Into<Operand>,
    ) {
        self.memory(MemoryOperation::Copy, dest, source, count);
    }

    /// Adds: `fill dest with count copies of value`
    pub fn fill(
        &mut self,
        dest: impl Into<Operand>,
        value: impl Into<Operand>,
        count: impl Into<Operand>,
    ) {
        self.memory(MemoryOperation::Fill, dest, value, count);
    }

    /// Adds a call of `function`.
    pub fn call(&mut self, dest: Option<LocalId>, function: &str, args: Vec<Operand>, pure: bool) {
        let args = args.into_iter().map(|arg| self.resolve(arg)).collect();
        self.push(
            InstructionKind::Call {
                dest,
                function: function.to_string(),
                args,
                pure,
            }
            .into(),
        );
    }

    /// Adds a return without value.
    pub fn ret(&mut self) {
        self.push(InstructionKind::Return { value: None }.into());
    }

    /// Adds a return of `value`.
    pub fn ret_val(&mut self, value: impl Into<Operand>) {
        let value = self.resolve(value);
        self.push(InstructionKind::Return { value: Some(value) }.into());
    }

    /// Adds a no-op.
    pub fn nop(&mut self) {
        self.push(InstructionKind::Nop.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_and_gaps() {
        let method = MethodBuilder::new("k")
            .build_with(|f| {
                f.block(0, |b| b.jump(3));
                f.block(3, |b| b.ret());
            })
            .unwrap();

        assert_eq!(method.block_count(), 4);
        assert!(method.block(BlockId::new(1)).unwrap().is_empty());
        assert_eq!(method.instruction_count(), 2);
    }

    #[test]
    fn test_operands_take_local_types() {
        let method = MethodBuilder::new("k")
            .build_with(|f| {
                let p = f.parameter("%p", DataType::INT16);
                let x = f.local("%x", DataType::INT16);
                f.block(0, |b| {
                    b.add(x, p, 3);
                    b.ret_val(x);
                });
            })
            .unwrap();

        let (_, add) = method.block_instructions(BlockId::new(0)).unwrap().next().unwrap();
        match &add.kind {
            InstructionKind::Operation { left, right, .. } => {
                assert_eq!(left.ty, DataType::INT16);
                assert_eq!(right.as_ref().and_then(Value::as_literal), Some(3));
            }
            other => panic!("unexpected instruction {other:?}"),
        }
    }

    #[test]
    fn test_memory_shapes() {
        let method = MethodBuilder::new("k")
            .build_with(|f| {
                let buf = f.stack_allocation("%buf", DataType::INT32.array_of(4));
                let g = f.global("@g", DataType::INT32, AddressSpace::Global, false);
                let x = f.local("%x", DataType::INT32);
                f.block(0, |b| {
                    b.read(x, g);
                    b.write(g, x);
                    b.copy(buf, g, 4);
                    b.fill(buf, 0, 4);
                });
            })
            .unwrap();
        assert_eq!(method.instruction_count(), 4);

        let failed = MethodBuilder::new("k").build_with(|f| {
            let g = f.global("@g", DataType::INT32, AddressSpace::Global, false);
            let x = f.local("%x", DataType::INT32);
            f.block(0, |b| b.memory(MemoryOperation::Write, g, x, 2));
        });
        assert!(matches!(failed, Err(Error::Classification { .. })));
    }

    #[test]
    fn test_unknown_local_is_reported() {
        let result = MethodBuilder::new("k").build_with(|f| {
            f.block(0, |b| b.mov(LocalId::new(9), LocalId::new(8)));
        });
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_decorate_last_instruction() {
        let method = MethodBuilder::new("k")
            .build_with(|f| {
                let c = f.local("%c", DataType::BOOL);
                f.block(0, |b| {
                    b.branch_if(c, 0);
                    b.decorate(Decorations::WORK_GROUP_LOOP);
                });
                f.block(1, |b| b.ret());
            })
            .unwrap();

        let (_, branch) = method.block_instructions(BlockId::new(0)).unwrap().next().unwrap();
        assert!(branch.decorations.contains(Decorations::WORK_GROUP_LOOP));
    }
}
