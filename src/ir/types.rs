//! Data types of IR values.
//!
//! [`DataType`] models the subset of the OpenCL C type system the backend needs:
//! scalars and short vectors, pointers into one of the OpenCL address spaces,
//! fixed-size arrays and structs. Physical widths are in bytes as laid out in
//! memory on the VideoCore IV.

use std::fmt;

use strum::{Display, EnumIter, EnumString, FromRepr};

/// Size of a pointer on the VideoCore IV, in bytes.
pub const POINTER_WIDTH: u32 = 4;

/// OpenCL address space a pointer refers to.
///
/// # Examples
///
/// ```rust
/// use qpuc::ir::AddressSpace;
/// use std::str::FromStr;
///
/// assert_eq!(AddressSpace::from_str("local").unwrap(), AddressSpace::Local);
/// assert_eq!(AddressSpace::from_repr(2), Some(AddressSpace::Constant));
/// assert_eq!(AddressSpace::Global.to_string(), "global");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, FromRepr,
)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum AddressSpace {
    /// Per work-item memory (`__private`), the default for stack allocations.
    Private = 0,
    /// Device memory shared by all work-groups (`__global`).
    Global = 1,
    /// Read-only device memory (`__constant`).
    Constant = 2,
    /// Memory shared within one work-group (`__local`).
    Local = 3,
    /// Unspecified address space (`__generic`).
    Generic = 4,
}

/// The type of an IR value.
///
/// # Examples
///
/// ```rust
/// use qpuc::ir::{AddressSpace, DataType};
///
/// let array = DataType::INT32.array_of(16);
/// assert_eq!(array.physical_width(), 64);
///
/// let pointer = array.pointer_to(AddressSpace::Local);
/// assert_eq!(pointer.physical_width(), 4);
/// assert_eq!(pointer.element_type(), Some(&DataType::INT32.array_of(16)));
/// assert_eq!(pointer.to_string(), "[16 x i32] __local*");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    /// No value (return type of procedures).
    Void,
    /// Integer scalar or vector with `lanes` elements of `bits` each.
    Scalar {
        /// Bits per element
        bits: u8,
        /// Vector width, 1 for scalars
        lanes: u8,
    },
    /// Pointer to `element` in `address_space`.
    Pointer {
        /// The pointed-to type
        element: Box<DataType>,
        /// The address space the pointer refers to
        address_space: AddressSpace,
    },
    /// Fixed-size array.
    Array {
        /// The element type
        element: Box<DataType>,
        /// Number of elements
        size: u32,
    },
    /// Named aggregate.
    Struct {
        /// The struct name without the `%struct.` prefix
        name: String,
        /// Member types in declaration order
        elements: Vec<DataType>,
    },
}

impl DataType {
    /// 1-bit boolean.
    pub const BOOL: DataType = DataType::Scalar { bits: 1, lanes: 1 };
    /// 8-bit integer.
    pub const INT8: DataType = DataType::Scalar { bits: 8, lanes: 1 };
    /// 16-bit integer.
    pub const INT16: DataType = DataType::Scalar { bits: 16, lanes: 1 };
    /// 32-bit integer.
    pub const INT32: DataType = DataType::Scalar { bits: 32, lanes: 1 };

    /// Creates a vector type with `lanes` elements of `bits` each.
    #[must_use]
    pub const fn vector(bits: u8, lanes: u8) -> Self {
        DataType::Scalar { bits, lanes }
    }

    /// Wraps this type into a pointer to `address_space`.
    #[must_use]
    pub fn pointer_to(self, address_space: AddressSpace) -> Self {
        DataType::Pointer {
            element: Box::new(self),
            address_space,
        }
    }

    /// Wraps this type into an array of `size` elements.
    #[must_use]
    pub fn array_of(self, size: u32) -> Self {
        DataType::Array {
            element: Box::new(self),
            size,
        }
    }

    /// Returns `true` for pointer types.
    #[must_use]
    pub fn is_pointer(&self) -> bool {
        matches!(self, DataType::Pointer { .. })
    }

    /// Returns `true` for array types.
    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, DataType::Array { .. })
    }

    /// Returns `true` for struct types.
    #[must_use]
    pub fn is_struct(&self) -> bool {
        matches!(self, DataType::Struct { .. })
    }

    /// Returns the address space of a pointer type.
    #[must_use]
    pub fn address_space(&self) -> Option<AddressSpace> {
        match self {
            DataType::Pointer { address_space, .. } => Some(*address_space),
            _ => None,
        }
    }

    /// Returns the pointed-to type of a pointer or the element type of an array.
    #[must_use]
    pub fn element_type(&self) -> Option<&DataType> {
        match self {
            DataType::Pointer { element, .. } | DataType::Array { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Returns `true` for structs and arrays whose element type is a struct.
    #[must_use]
    pub fn is_struct_or_struct_array(&self) -> bool {
        match self {
            DataType::Struct { .. } => true,
            DataType::Array { element, .. } => element.is_struct(),
            _ => false,
        }
    }

    /// Returns the number of bytes a value of this type occupies in memory.
    ///
    /// Booleans and other sub-byte scalars occupy one byte per lane.
    #[must_use]
    pub fn physical_width(&self) -> u32 {
        match self {
            DataType::Void => 0,
            DataType::Scalar { bits, lanes } => u32::from(bits.div_ceil(8)) * u32::from(*lanes),
            DataType::Pointer { .. } => POINTER_WIDTH,
            DataType::Array { element, size } => element.physical_width().saturating_mul(*size),
            DataType::Struct { elements, .. } => elements
                .iter()
                .map(DataType::physical_width)
                .fold(0u32, u32::saturating_add),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Void => write!(f, "void"),
            DataType::Scalar { bits, lanes: 1 } => write!(f, "i{bits}"),
            DataType::Scalar { bits, lanes } => write!(f, "<{lanes} x i{bits}>"),
            DataType::Pointer {
                element,
                address_space: AddressSpace::Private,
            } => write!(f, "{element}*"),
            DataType::Pointer {
                element,
                address_space,
            } => write!(f, "{element} __{address_space}*"),
            DataType::Array { element, size } => write!(f, "[{size} x {element}]"),
            DataType::Struct { name, .. } => write!(f, "%struct.{name}"),
        }
    }
}
