//! Memory instructions.
//!
//! A [`MemoryInstruction`] moves data between memory and locals, or between two
//! memory areas. It is the only instruction that touches memory, so every later
//! lowering decision (DMA through the external bus, or VPM scratchpad access) starts
//! from one of these.
//!
//! | Operation | Destination       | Source            | Count        |
//! |-----------|-------------------|-------------------|--------------|
//! | `Copy`    | memory location   | memory location   | any          |
//! | `Fill`    | memory location   | local value       | any          |
//! | `Read`    | local value       | memory location   | literal `1`  |
//! | `Write`   | memory location   | local value       | literal `1`  |
//!
//! Only the count shape is checked on construction; the operand classification
//! queries in [`crate::analysis::MemoryAccessInfo`] need the owning method and
//! validate the remaining requirements on every call.

use std::fmt;

use strum::{Display, EnumIter, EnumString, FromRepr};

use crate::{ir::Value, Error, Result};

/// The kind of memory access.
///
/// # Examples
///
/// ```rust
/// use qpuc::{ir::MemoryOperation, Error};
///
/// assert_eq!(MemoryOperation::try_from(3).unwrap(), MemoryOperation::Write);
/// assert!(matches!(
///     MemoryOperation::try_from(7),
///     Err(Error::UnknownMemoryOperation(7))
/// ));
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, FromRepr,
)]
#[strum(serialize_all = "UPPERCASE")]
#[repr(u8)]
pub enum MemoryOperation {
    /// Copies `count` entries from one memory area into another
    Copy = 0,
    /// Fills `count` entries of a memory area with a local value
    Fill = 1,
    /// Loads one entry from memory into a local
    Read = 2,
    /// Stores a local into one entry of memory
    Write = 3,
}

impl MemoryOperation {
    /// Returns `true` for operations restricted to a single entry.
    #[must_use]
    pub fn is_single_entry(self) -> bool {
        matches!(self, MemoryOperation::Read | MemoryOperation::Write)
    }
}

impl TryFrom<u8> for MemoryOperation {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self> {
        MemoryOperation::from_repr(tag).ok_or(Error::UnknownMemoryOperation(tag))
    }
}

/// A memory access with destination, source and entry count.
///
/// For [`MemoryOperation::Read`] the destination is the local receiving the loaded
/// value; for every other operation the destination is the address written to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoryInstruction {
    operation: MemoryOperation,
    destination: Value,
    source: Value,
    count: Value,
}

impl MemoryInstruction {
    /// Creates a memory instruction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Classification`] if a READ or WRITE is given any count other
    /// than the literal `1`.
    pub fn new(
        operation: MemoryOperation,
        destination: Value,
        source: Value,
        count: Value,
    ) -> Result<Self> {
        let instruction = MemoryInstruction {
            operation,
            destination,
            source,
            count,
        };
        if operation.is_single_entry() && !instruction.count.is_literal(1) {
            return Err(classification_error!(
                instruction,
                "Can only use the entry count for copying or filling memory"
            ));
        }
        Ok(instruction)
    }

    /// Creates a memory instruction from a raw operation tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMemoryOperation`] for tags above 3, otherwise the
    /// errors of [`MemoryInstruction::new`].
    pub fn from_raw(tag: u8, destination: Value, source: Value, count: Value) -> Result<Self> {
        Self::new(MemoryOperation::try_from(tag)?, destination, source, count)
    }

    /// Creates a single-entry load of `source` into `destination`.
    ///
    /// # Errors
    ///
    /// Never fails for the fixed unit count; the signature matches [`MemoryInstruction::new`].
    pub fn read(destination: Value, source: Value) -> Result<Self> {
        Self::new(MemoryOperation::Read, destination, source, Value::int(1))
    }

    /// Creates a single-entry store of `source` into `destination`.
    ///
    /// # Errors
    ///
    /// Never fails for the fixed unit count; the signature matches [`MemoryInstruction::new`].
    pub fn write(destination: Value, source: Value) -> Result<Self> {
        Self::new(MemoryOperation::Write, destination, source, Value::int(1))
    }

    /// The kind of access.
    #[must_use]
    pub fn operation(&self) -> MemoryOperation {
        self.operation
    }

    /// The written address, or for READ the local receiving the value.
    #[must_use]
    pub fn destination(&self) -> &Value {
        &self.destination
    }

    /// The read address, or for FILL and WRITE the local value stored.
    #[must_use]
    pub fn source(&self) -> &Value {
        &self.source
    }

    /// Number of entries accessed.
    #[must_use]
    pub fn count(&self) -> &Value {
        &self.count
    }

    /// Memory accesses are never removable or reorderable.
    #[must_use]
    pub fn has_side_effects(&self) -> bool {
        true
    }

    /// Re-checks the unit count of READ and WRITE.
    pub(crate) fn check_single_entry(&self) -> Result<()> {
        if self.operation.is_single_entry() && !self.count.is_literal(1) {
            return Err(classification_error!(
                self.count,
                "Operand needs to be the constant one"
            ));
        }
        Ok(())
    }
}

impl fmt::Display for MemoryInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operation {
            MemoryOperation::Copy => write!(
                f,
                "copy {} entries from {} into {}",
                self.count, self.source, self.destination
            ),
            MemoryOperation::Fill => write!(
                f,
                "fill {} with {} copies of {}",
                self.destination, self.count, self.source
            ),
            MemoryOperation::Read => {
                write!(f, "{} = load memory at {}", self.destination, self.source)
            }
            MemoryOperation::Write => {
                write!(f, "store {} into {}", self.source, self.destination)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{AddressSpace, DataType, LocalId};

    fn pointer(index: usize) -> Value {
        Value::local(
            LocalId::new(index),
            DataType::INT32.pointer_to(AddressSpace::Global),
        )
    }

    fn scalar(index: usize) -> Value {
        Value::local(LocalId::new(index), DataType::INT32)
    }

    #[test]
    fn test_single_entry_counts() {
        assert!(MemoryInstruction::read(scalar(0), pointer(1)).is_ok());
        assert!(MemoryInstruction::write(pointer(1), scalar(0)).is_ok());

        let result =
            MemoryInstruction::new(MemoryOperation::Write, pointer(1), scalar(0), Value::int(2));
        assert!(matches!(result, Err(Error::Classification { .. })));

        let result =
            MemoryInstruction::new(MemoryOperation::Read, scalar(0), pointer(1), scalar(2));
        assert!(matches!(result, Err(Error::Classification { .. })));
    }

    #[test]
    fn test_bulk_operations_accept_any_count() {
        let copy =
            MemoryInstruction::new(MemoryOperation::Copy, pointer(0), pointer(1), scalar(2))
                .unwrap();
        assert!(copy.check_single_entry().is_ok());

        let fill =
            MemoryInstruction::new(MemoryOperation::Fill, pointer(0), scalar(1), Value::int(64))
                .unwrap();
        assert_eq!(fill.count().as_literal(), Some(64));
        assert!(fill.has_side_effects());
    }

    #[test]
    fn test_raw_tags() {
        let read = MemoryInstruction::from_raw(2, scalar(0), pointer(1), Value::int(1)).unwrap();
        assert_eq!(read.operation(), MemoryOperation::Read);

        let unknown = MemoryInstruction::from_raw(4, scalar(0), pointer(1), Value::int(1));
        assert!(matches!(unknown, Err(Error::UnknownMemoryOperation(4))));
    }

    #[test]
    fn test_rendering() {
        let copy = MemoryInstruction::new(
            MemoryOperation::Copy,
            pointer(0),
            pointer(1),
            Value::int(8),
        )
        .unwrap();
        assert_eq!(
            copy.to_string(),
            "copy i32 8 entries from i32 __global* %1 into i32 __global* %0"
        );

        let fill =
            MemoryInstruction::new(MemoryOperation::Fill, pointer(0), Value::int(0), Value::int(4))
                .unwrap();
        assert_eq!(
            fill.to_string(),
            "fill i32 __global* %0 with i32 4 copies of i32 0"
        );

        let read = MemoryInstruction::read(scalar(2), pointer(1)).unwrap();
        assert_eq!(read.to_string(), "i32 %2 = load memory at i32 __global* %1");

        let write = MemoryInstruction::write(pointer(1), scalar(2)).unwrap();
        assert_eq!(write.to_string(), "store i32 %2 into i32 __global* %1");
        assert_eq!(MemoryOperation::Fill.to_string(), "FILL");
    }
}
