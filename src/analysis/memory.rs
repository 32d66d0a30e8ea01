//! Memory operand classification.
//!
//! Every memory access is traced back to the areas it touches: globals, stack
//! allocations and the host buffers passed in through parameters. From the origin
//! of an address and the width of the accessed element, [`MemoryAccessInfo`]
//! decides whether the access may be served from the VPM scratchpad instead of
//! going through DMA on the external memory bus.
//!
//! # VPM eligibility of addresses
//!
//! | Origin                                   | Eligible                                 |
//! |------------------------------------------|------------------------------------------|
//! | Constant global                          | yes                                      |
//! | Non-constant global in `local` space     | yes                                      |
//! | Other non-constant global                | no                                       |
//! | Parameter                                | no                                       |
//! | Stack allocation                         | if one frame per QPU fits into the VPM   |
//! | Struct or array-of-struct element        | no                                       |
//! | Element wider than the VPM               | no                                       |
//!
//! All queries validate the operand shapes on every call, so a memory instruction
//! that became invalid through rewriting is reported instead of misclassified.

use std::collections::{BTreeSet, HashSet};

use crate::{
    ir::{
        AddressSpace, DataType, InstrId, InstructionKind, LocalId, LocalKind, MemoryInstruction,
        MemoryOperation, Method, OpCode, Value,
    },
    BackendConfig, Result,
};

/// Returns `true` if `local` holds an address into a global, a stack allocation or
/// the memory behind a parameter.
///
/// Locals with writers are derived from memory only if every writer is: moves of
/// a derived local, or additions and subtractions of an offset to exactly one
/// derived pointer. Values loaded from memory are not addresses the classifier can
/// follow; any other producer is logged and rejected. A local nobody writes is
/// accepted.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] for dangling local or instruction ids.
///
/// # Examples
///
/// ```rust
/// use qpuc::analysis::is_derived_from_memory;
/// use qpuc::ir::{AddressSpace, DataType, MethodBuilder};
///
/// let ptr = DataType::INT32.pointer_to(AddressSpace::Global);
/// let mut ids = None;
/// let method = MethodBuilder::new("offset").build_with(|f| {
///     let base = f.parameter("%in", ptr.clone());
///     let element = f.local("%element", ptr.clone());
///     f.block(0, |b| b.add(element, base, 4));
///     ids = Some((base, element));
/// })?;
/// let (base, element) = ids.unwrap();
///
/// assert!(is_derived_from_memory(&method, base)?);
/// assert!(is_derived_from_memory(&method, element)?);
/// # Ok::<(), qpuc::Error>(())
/// ```
pub fn is_derived_from_memory(method: &Method, local: LocalId) -> Result<bool> {
    derived_from_memory(method, local, &mut HashSet::new())
}

fn derived_from_memory(
    method: &Method,
    local: LocalId,
    visited: &mut HashSet<LocalId>,
) -> Result<bool> {
    // a cycle adds no producer of its own
    if !visited.insert(local) {
        return Ok(true);
    }

    let base = method.local(method.base_of(local)?)?;
    if base.resides_in_memory() || base.is_parameter() {
        return Ok(true);
    }

    // no writers: nothing contradicts the address
    for writer in method.local(local)?.writers() {
        let instruction = method.instruction(writer)?;
        let derived = match &instruction.kind {
            InstructionKind::Move { source, .. } => match source.as_local() {
                Some(source) => derived_from_memory(method, source, visited)?,
                None => {
                    tracing::debug!(
                        local = %base.name,
                        instruction = %instruction,
                        "pointer assigned from literal"
                    );
                    false
                }
            },
            InstructionKind::Memory(_) => false,
            InstructionKind::Operation {
                op: OpCode::Add | OpCode::Sub,
                left,
                right: Some(right),
                ..
            } => match (left.ty.is_pointer(), right.ty.is_pointer()) {
                (true, false) => match left.as_local() {
                    Some(pointer) => derived_from_memory(method, pointer, visited)?,
                    None => false,
                },
                (false, true) => match right.as_local() {
                    Some(pointer) => derived_from_memory(method, pointer, visited)?,
                    None => false,
                },
                // pointer + pointer or integer arithmetic
                _ => false,
            },
            _ => {
                tracing::debug!(
                    instruction = %instruction,
                    method = %method.name,
                    "unhandled source of pointer"
                );
                false
            }
        };
        if !derived {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Classification queries for one memory instruction.
///
/// # Examples
///
/// ```rust
/// use qpuc::analysis::MemoryAccessInfo;
/// use qpuc::ir::{AddressSpace, DataType, InstrId, MethodBuilder};
/// use qpuc::BackendConfig;
///
/// let method = MethodBuilder::new("lut").build_with(|f| {
///     let table = f.global("@table", DataType::INT32, AddressSpace::Constant, true);
///     let value = f.local("%value", DataType::INT32);
///     f.block(0, |b| b.read(value, table));
/// })?;
/// let config = BackendConfig::default();
///
/// let info = MemoryAccessInfo::new(&method, InstrId::new(0), &config)?;
/// assert!(info.accesses_constant_global()?);
/// assert!(info.can_move_source_into_vpm()?);
/// assert!(!info.can_move_destination_into_vpm()?);
/// # Ok::<(), qpuc::Error>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MemoryAccessInfo<'a> {
    method: &'a Method,
    instruction: &'a MemoryInstruction,
    config: &'a BackendConfig,
}

impl<'a> MemoryAccessInfo<'a> {
    /// Wraps the memory instruction `id` of `method`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if `id` is dangling or does not name a
    /// memory instruction.
    pub fn new(method: &'a Method, id: InstrId, config: &'a BackendConfig) -> Result<Self> {
        let instruction = method
            .instruction(id)?
            .as_memory()
            .ok_or_else(|| malformed_error!("Instruction {} is not a memory access", id))?;
        Ok(Self::from_instruction(method, instruction, config))
    }

    /// Wraps a memory instruction whose operands refer to the locals of `method`.
    #[must_use]
    pub fn from_instruction(
        method: &'a Method,
        instruction: &'a MemoryInstruction,
        config: &'a BackendConfig,
    ) -> Self {
        MemoryAccessInfo {
            method,
            instruction,
            config,
        }
    }

    /// The classified instruction.
    #[must_use]
    pub fn instruction(&self) -> &'a MemoryInstruction {
        self.instruction
    }

    /// Whether the source may be placed in the VPM.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Classification`] if an operand fails validation.
    pub fn can_move_source_into_vpm(&self) -> Result<bool> {
        self.instruction.check_single_entry()?;
        let is_address = matches!(
            self.instruction.operation(),
            MemoryOperation::Copy | MemoryOperation::Read
        );
        self.can_move_into_vpm(self.instruction.source(), is_address)
    }

    /// Whether the destination may be placed in the VPM.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Classification`] if an operand fails validation.
    pub fn can_move_destination_into_vpm(&self) -> Result<bool> {
        self.instruction.check_single_entry()?;
        let is_address = self.instruction.operation() != MemoryOperation::Read;
        self.can_move_into_vpm(self.instruction.destination(), is_address)
    }

    /// Whether any accessed area is a constant global.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Classification`] if an address fails validation.
    pub fn accesses_constant_global(&self) -> Result<bool> {
        self.any_area(|kind| matches!(kind, LocalKind::Global { constant: true, .. }))
    }

    /// Whether any accessed area is a stack allocation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Classification`] if an address fails validation.
    pub fn accesses_stack_allocation(&self) -> Result<bool> {
        self.any_area(|kind| *kind == LocalKind::StackAllocation)
    }

    /// Whether any accessed area is a global in the `local` address space, i.e.
    /// memory shared by one work-group.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Classification`] if an address fails validation.
    pub fn accesses_local_memory(&self) -> Result<bool> {
        self.any_area(is_work_group_global)
    }

    /// The type of one entry read by the instruction.
    ///
    /// With `sized`, a COPY yields an array of `count` entries.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Classification`] if an operand fails validation, or
    /// if a sized type is requested for a non-literal count.
    pub fn source_element_type(&self, sized: bool) -> Result<DataType> {
        let source = self.instruction.source();
        match self.instruction.operation() {
            MemoryOperation::Copy => {
                self.check_memory_location(source)?;
                self.pointee(source, sized)
            }
            MemoryOperation::Fill => {
                self.check_local_value(source)?;
                Ok(source.ty.clone())
            }
            MemoryOperation::Read => {
                self.check_memory_location(source)?;
                self.instruction.check_single_entry()?;
                self.pointee(source, false)
            }
            MemoryOperation::Write => {
                self.check_local_value(source)?;
                self.instruction.check_single_entry()?;
                Ok(source.ty.clone())
            }
        }
    }

    /// The type of one entry written by the instruction.
    ///
    /// With `sized`, a COPY or FILL yields an array of `count` entries.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Classification`] if an operand fails validation, or
    /// if a sized type is requested for a non-literal count.
    pub fn destination_element_type(&self, sized: bool) -> Result<DataType> {
        let destination = self.instruction.destination();
        match self.instruction.operation() {
            MemoryOperation::Copy | MemoryOperation::Fill => {
                self.check_memory_location(destination)?;
                self.pointee(destination, sized)
            }
            MemoryOperation::Read => {
                self.check_local_value(destination)?;
                self.instruction.check_single_entry()?;
                Ok(destination.ty.clone())
            }
            MemoryOperation::Write => {
                self.check_memory_location(destination)?;
                self.instruction.check_single_entry()?;
                self.pointee(destination, false)
            }
        }
    }

    /// The origin locals of all accessed memory areas.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Classification`] if an address fails validation.
    pub fn memory_areas(&self) -> Result<BTreeSet<LocalId>> {
        let mut areas = BTreeSet::new();
        for address in self.addresses() {
            let local = self.check_memory_location(address)?;
            areas.insert(self.method.base_of(local)?);
        }
        Ok(areas)
    }

    /// The operands addressing memory.
    fn addresses(&self) -> Vec<&'a Value> {
        let instruction = self.instruction;
        match instruction.operation() {
            MemoryOperation::Copy => vec![instruction.source(), instruction.destination()],
            MemoryOperation::Fill | MemoryOperation::Write => vec![instruction.destination()],
            MemoryOperation::Read => vec![instruction.source()],
        }
    }

    fn any_area(&self, predicate: impl Fn(&LocalKind) -> bool) -> Result<bool> {
        for area in self.memory_areas()? {
            if predicate(&self.method.local(area)?.kind) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Validates an address operand and returns its local.
    fn check_memory_location(&self, value: &Value) -> Result<LocalId> {
        if !value.ty.is_pointer() {
            return Err(classification_error!(
                self.method.describe_value(value),
                "Operand needs to be a pointer"
            ));
        }
        match value.as_local() {
            Some(local) if is_derived_from_memory(self.method, local)? => Ok(local),
            _ => Err(classification_error!(
                self.method.describe_value(value),
                "Operand needs to refer to a memory location or a parameter containing one"
            )),
        }
    }

    fn check_local_value(&self, value: &Value) -> Result<()> {
        let Some(local) = value.as_local() else {
            return Ok(());
        };
        let local = self.method.local(local)?;
        if local.resides_in_memory()
            || (local.is_parameter() && (local.ty.is_pointer() || local.ty.is_array()))
        {
            return Err(classification_error!(
                self.method.describe_value(value),
                "Operand needs to be a local value (local, register)"
            ));
        }
        Ok(())
    }

    fn pointee(&self, address: &Value, sized: bool) -> Result<DataType> {
        let element = address.ty.element_type().cloned().ok_or_else(|| {
            classification_error!(
                self.method.describe_value(address),
                "Operand needs to be a pointer"
            )
        })?;
        if !sized {
            return Ok(element);
        }
        let count = self
            .instruction
            .count()
            .as_literal()
            .and_then(|count| u32::try_from(count).ok())
            .ok_or_else(|| {
                classification_error!(
                    self.instruction,
                    "Cannot calculate type-size from dynamically sized memory-operation"
                )
            })?;
        Ok(element.array_of(count))
    }

    fn can_move_into_vpm(&self, value: &Value, is_address: bool) -> Result<bool> {
        if !is_address {
            return self.can_move_local_value_into_vpm(value);
        }

        let local = self.check_memory_location(value)?;
        let base = self.method.local(self.method.base_of(local)?)?;
        let Some(element) = base.ty.element_type() else {
            return Ok(false);
        };
        if element.is_struct_or_struct_array() {
            return Ok(false);
        }

        let width = element.physical_width();
        let capacity = self.config.vpm_capacity;
        if width > capacity {
            return Ok(false);
        }

        Ok(match base.kind {
            LocalKind::Global { constant, .. } => constant || is_work_group_global(&base.kind),
            // one stack frame per QPU
            LocalKind::StackAllocation => {
                u64::from(width) * u64::from(self.config.num_qpus) < u64::from(capacity)
            }
            LocalKind::Parameter | LocalKind::Ordinary => false,
        })
    }

    fn can_move_local_value_into_vpm(&self, value: &Value) -> Result<bool> {
        if !self.config.lower_register_values_into_vpm {
            return Ok(false);
        }
        let Some(local) = value.as_local() else {
            return Ok(false);
        };
        for user in self.method.local(local)?.users() {
            if self.method.instruction(user.instruction)?.as_memory().is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Globals in the `local` address space, shared by one work-group.
fn is_work_group_global(kind: &LocalKind) -> bool {
    matches!(
        kind,
        LocalKind::Global {
            address_space: AddressSpace::Local,
            ..
        }
    )
}
