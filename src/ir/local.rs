//! Locals: named value slots with use-lists.
//!
//! Every local of a [`Method`](crate::ir::Method) carries a [`LocalKind`] tag that
//! says where its value lives, and a list of the instructions reading or writing it.
//! The use-lists are maintained by the method while instructions are appended;
//! analyses only ever read them.

use std::fmt;

use strum::{Display, EnumIter, EnumString};

use crate::ir::{AddressSpace, DataType, InstrId};

/// Handle of a local inside its method's arena.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalId(pub(crate) usize);

impl LocalId {
    /// Creates a new `LocalId` from a raw index value.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        LocalId(index)
    }

    /// Returns the raw 0-based index of this local.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalId({})", self.0)
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Where the value of a local lives.
///
/// Globals and stack allocations *reside in memory*: the local itself is the
/// address (its type is a pointer) and the contents live in memory. Parameters
/// are passed in by the host and may hold pointers into host-visible memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalKind {
    /// Kernel parameter
    Parameter,
    /// Module-level variable
    Global {
        /// Whether the contents are immutable
        constant: bool,
        /// The address space the variable is placed in
        address_space: AddressSpace,
    },
    /// Per work-item stack slot
    StackAllocation,
    /// Register-like temporary
    Ordinary,
}

impl LocalKind {
    /// Returns `true` if the local is an address whose contents live in memory.
    #[must_use]
    pub fn resides_in_memory(&self) -> bool {
        matches!(self, LocalKind::Global { .. } | LocalKind::StackAllocation)
    }
}

/// How an instruction uses a local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum UseKind {
    /// The instruction reads the local's current value
    Reader,
    /// The instruction assigns the local
    Writer,
}

/// One entry of a local's use-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalUse {
    /// The using instruction
    pub instruction: InstrId,
    /// Whether it reads or writes
    pub kind: UseKind,
}

/// A named value slot.
#[derive(Debug, Clone)]
pub struct Local {
    /// Name as emitted by the frontend (e.g. `%i.0`)
    pub name: String,
    /// The local's type; pointer-typed for memory-resident locals
    pub ty: DataType,
    /// Where the value lives
    pub kind: LocalKind,
    /// The local this one aliases or was derived from, if any
    pub reference: Option<LocalId>,
    pub(crate) users: Vec<LocalUse>,
}

impl Local {
    /// Creates a local without users.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: DataType, kind: LocalKind) -> Self {
        Local {
            name: name.into(),
            ty,
            kind,
            reference: None,
            users: Vec::new(),
        }
    }

    /// Returns `true` for kernel parameters.
    #[must_use]
    pub fn is_parameter(&self) -> bool {
        self.kind == LocalKind::Parameter
    }

    /// Returns `true` for globals.
    #[must_use]
    pub fn is_global(&self) -> bool {
        matches!(self.kind, LocalKind::Global { .. })
    }

    /// Returns `true` for constant globals.
    #[must_use]
    pub fn is_constant_global(&self) -> bool {
        matches!(self.kind, LocalKind::Global { constant: true, .. })
    }

    /// Returns `true` for stack allocations.
    #[must_use]
    pub fn is_stack_allocation(&self) -> bool {
        self.kind == LocalKind::StackAllocation
    }

    /// Returns `true` if the local is an address whose contents live in memory.
    #[must_use]
    pub fn resides_in_memory(&self) -> bool {
        self.kind.resides_in_memory()
    }

    /// All uses in the order the instructions were appended.
    #[must_use]
    pub fn users(&self) -> &[LocalUse] {
        &self.users
    }

    /// Instructions assigning this local.
    pub fn writers(&self) -> impl Iterator<Item = InstrId> + '_ {
        self.users_of_kind(UseKind::Writer)
    }

    /// Instructions reading this local.
    pub fn readers(&self) -> impl Iterator<Item = InstrId> + '_ {
        self.users_of_kind(UseKind::Reader)
    }

    fn users_of_kind(&self, kind: UseKind) -> impl Iterator<Item = InstrId> + '_ {
        self.users
            .iter()
            .filter(move |user| user.kind == kind)
            .map(|user| user.instruction)
    }
}

impl fmt::Display for Local {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ty, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_predicates() {
        let global = Local::new(
            "@table",
            DataType::INT32.pointer_to(AddressSpace::Constant),
            LocalKind::Global {
                constant: true,
                address_space: AddressSpace::Constant,
            },
        );
        assert!(global.is_global());
        assert!(global.is_constant_global());
        assert!(global.resides_in_memory());
        assert!(!global.is_parameter());

        let param = Local::new("%in", DataType::INT32, LocalKind::Parameter);
        assert!(param.is_parameter());
        assert!(!param.resides_in_memory());

        let stack = Local::new(
            "%buf",
            DataType::INT8.pointer_to(AddressSpace::Private),
            LocalKind::StackAllocation,
        );
        assert!(stack.is_stack_allocation());
        assert!(stack.resides_in_memory());
    }

    #[test]
    fn test_use_list_filters() {
        let mut local = Local::new("%i", DataType::INT32, LocalKind::Ordinary);
        local.users.push(LocalUse {
            instruction: InstrId::new(0),
            kind: UseKind::Writer,
        });
        local.users.push(LocalUse {
            instruction: InstrId::new(1),
            kind: UseKind::Reader,
        });
        local.users.push(LocalUse {
            instruction: InstrId::new(1),
            kind: UseKind::Writer,
        });

        assert_eq!(
            local.writers().collect::<Vec<_>>(),
            vec![InstrId::new(0), InstrId::new(1)]
        );
        assert_eq!(local.readers().collect::<Vec<_>>(), vec![InstrId::new(1)]);
        assert_eq!(local.to_string(), "i32 %i");
    }
}
