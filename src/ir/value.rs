//! Operands: literals and references to locals.

use std::fmt;

use crate::ir::{DataType, LocalId};

/// A 64-bit signed integer constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal(pub i64);

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a [`Value`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// A compile-time constant
    Literal(Literal),
    /// The current contents of a local
    Local(LocalId),
}

/// A typed operand of an instruction.
///
/// # Examples
///
/// ```rust
/// use qpuc::ir::{DataType, LocalId, Value};
///
/// let one = Value::int(1);
/// assert_eq!(one.as_literal(), Some(1));
/// assert_eq!(one.ty, DataType::INT32);
///
/// let counter = Value::local(LocalId::new(0), DataType::INT32);
/// assert_eq!(counter.as_local(), Some(LocalId::new(0)));
/// assert_eq!(counter.as_literal(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Value {
    /// The literal or local this value refers to
    pub kind: ValueKind,
    /// The type of this value
    pub ty: DataType,
}

impl Value {
    /// Creates an `i32` literal.
    #[must_use]
    pub fn int(value: i64) -> Self {
        Self::literal(value, DataType::INT32)
    }

    /// Creates a literal of the given type.
    #[must_use]
    pub fn literal(value: i64, ty: DataType) -> Self {
        Value {
            kind: ValueKind::Literal(Literal(value)),
            ty,
        }
    }

    /// Creates a reference to a local.
    #[must_use]
    pub fn local(local: LocalId, ty: DataType) -> Self {
        Value {
            kind: ValueKind::Local(local),
            ty,
        }
    }

    /// Returns the literal payload, if this is a literal.
    #[must_use]
    pub fn literal_value(&self) -> Option<Literal> {
        match self.kind {
            ValueKind::Literal(literal) => Some(literal),
            ValueKind::Local(_) => None,
        }
    }

    /// Returns the literal as integer, if this is a literal.
    #[must_use]
    pub fn as_literal(&self) -> Option<i64> {
        self.literal_value().map(|literal| literal.0)
    }

    /// Returns the referenced local, if this is a local reference.
    #[must_use]
    pub fn as_local(&self) -> Option<LocalId> {
        match self.kind {
            ValueKind::Local(local) => Some(local),
            ValueKind::Literal(_) => None,
        }
    }

    /// Returns `true` if this value is the literal `expected`.
    #[must_use]
    pub fn is_literal(&self, expected: i64) -> bool {
        self.as_literal() == Some(expected)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ValueKind::Literal(literal) => write!(f, "{} {literal}", self.ty),
            ValueKind::Local(local) => write!(f, "{} {local}", self.ty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_accessors() {
        let value = Value::literal(-3, DataType::INT8);
        assert_eq!(value.literal_value(), Some(Literal(-3)));
        assert!(value.is_literal(-3));
        assert!(!value.is_literal(1));
        assert_eq!(value.as_local(), None);
        assert_eq!(value.to_string(), "i8 -3");
    }

    #[test]
    fn test_local_display() {
        let value = Value::local(LocalId::new(4), DataType::INT32);
        assert_eq!(value.to_string(), "i32 %4");
        assert!(!value.is_literal(4));
    }
}
