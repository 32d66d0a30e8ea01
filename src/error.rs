use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! classification_error {
    ($operand:expr, $msg:expr) => {
        crate::Error::Classification {
            message: $msg.to_string(),
            operand: $operand.to_string(),
        }
    };
}

pub(crate) use classification_error;
pub(crate) use malformed_error;

/// The generic Error type, which covers every error this library can return.
///
/// Errors fall into two classes. Malformed-IR errors ([`Error::Malformed`],
/// [`Error::Classification`], [`Error::UnknownMemoryOperation`]) are fatal for the
/// compilation of the current function. Everything an analysis merely cannot prove
/// (no unique loop header, no induction variable, no literal bound) is reported as
/// `None` by the respective query and never shows up here.
///
/// # Error Categories
///
/// ## Intermediate Representation Errors
/// - [`Error::Malformed`] - Structurally invalid IR (dangling ids, bad shapes)
/// - [`Error::Classification`] - A memory operand failed validation
/// - [`Error::UnknownMemoryOperation`] - A raw memory-operation tag could not be decoded
///
/// ## Graph Errors
/// - [`Error::GraphError`] - Invalid node or edge references during graph construction
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Filesystem I/O errors while handling compilation data
/// - [`Error::Error`] - Miscellaneous failures
///
/// # Examples
///
/// ```rust
/// use qpuc::{
///     ir::{MemoryInstruction, MemoryOperation, Value, DataType},
///     Error,
/// };
///
/// let result = MemoryInstruction::new(
///     MemoryOperation::Write,
///     Value::int(0),
///     Value::int(0),
///     Value::int(2),
/// );
/// assert!(matches!(result, Err(Error::Classification { .. })));
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The intermediate representation is structurally invalid.
    ///
    /// Raised when an id does not refer to an existing entity or an instruction
    /// has a shape the operation cannot work with. The error carries the source
    /// location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A memory instruction operand violates the shape required by its operation.
    ///
    /// Examples are a READ/WRITE with an entry count other than the literal one, or
    /// an address operand that cannot be traced back to a parameter, global or
    /// stack allocation.
    #[error("Invalid memory operand '{operand}': {message}")]
    Classification {
        /// What requirement the operand violated
        message: String,
        /// The rendered operand
        operand: String,
    },

    /// A raw memory-operation tag does not name any known operation.
    #[error("Unknown memory operation type - {0}")]
    UnknownMemoryOperation(u8),

    /// Graph construction error.
    ///
    /// Raised when an edge references a node that does not exist.
    #[error("{0}")]
    GraphError(String),

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that occur while reading or writing compilation
    /// data backed by (temporary) files.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
