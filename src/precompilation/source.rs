//! Source type tags and their detection from raw bytes.

use strum::{Display, EnumIter, EnumString, FromRepr};

/// Magic number of a raw LLVM bitcode stream (`'B' 'C' 0xC0 0xDE`).
const LLVM_BITCODE_MAGIC: [u8; 4] = [b'B', b'C', 0xC0, 0xDE];

/// Magic number of the LLVM bitcode wrapper header.
const LLVM_BITCODE_WRAPPER_MAGIC: u32 = 0x0B17_C0DE;

/// Magic number of a SPIR-V module.
const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Magic number of a binary QPU machine code module.
const QPUASM_MAGIC: u32 = 0xDEAD_BEAF;

/// The type of some compilation input or output.
///
/// The discriminants are the raw values used when the type crosses an interface
/// as an integer.
///
/// # Examples
///
/// ```rust
/// use qpuc::precompilation::SourceType;
///
/// assert_eq!(SourceType::from_repr(4), Some(SourceType::SpirvBin));
/// assert_eq!(SourceType::LlvmIrText.to_string(), "llvm-ir-text");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter, FromRepr,
)]
#[strum(serialize_all = "kebab-case")]
#[repr(u8)]
pub enum SourceType {
    /// Type was not (yet) determined
    #[default]
    Unknown = 0,
    /// OpenCL C source code
    #[strum(to_string = "opencl-c")]
    OpenClC = 1,
    /// LLVM IR in textual representation
    LlvmIrText = 2,
    /// LLVM IR bitcode
    LlvmIrBin = 3,
    /// SPIR-V in binary representation
    SpirvBin = 4,
    /// SPIR-V in textual representation
    SpirvText = 5,
    /// Generated machine code in hexadecimal representation
    QpuasmHex = 6,
    /// Generated machine code in binary representation
    QpuasmBin = 7,
}

impl SourceType {
    /// Returns `true` for the textual representations.
    #[must_use]
    pub fn is_text(self) -> bool {
        matches!(
            self,
            SourceType::OpenClC
                | SourceType::LlvmIrText
                | SourceType::SpirvText
                | SourceType::QpuasmHex
        )
    }
}

/// The compiler frontend consuming the precompiled input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum Frontend {
    /// Whichever frontend is available, preferring LLVM IR
    #[default]
    Default,
    /// The LLVM IR frontend
    LlvmIr,
    /// The SPIR-V frontend
    SpirV,
}

/// Returns whether `input` can be fed to `frontend` without further precompilation.
///
/// OpenCL C always needs to be compiled first and machine code is an output
/// format, so neither is accepted by any frontend.
///
/// # Examples
///
/// ```rust
/// use qpuc::precompilation::{is_supported_by_frontend, Frontend, SourceType};
///
/// assert!(is_supported_by_frontend(SourceType::LlvmIrBin, Frontend::Default));
/// assert!(!is_supported_by_frontend(SourceType::SpirvBin, Frontend::LlvmIr));
/// assert!(!is_supported_by_frontend(SourceType::OpenClC, Frontend::Default));
/// ```
#[must_use]
pub fn is_supported_by_frontend(input: SourceType, frontend: Frontend) -> bool {
    let llvm = matches!(input, SourceType::LlvmIrBin | SourceType::LlvmIrText);
    let spirv = matches!(input, SourceType::SpirvBin | SourceType::SpirvText);
    match frontend {
        Frontend::Default => llvm || spirv,
        Frontend::LlvmIr => llvm,
        Frontend::SpirV => spirv,
    }
}

/// Determines the type of some compilation data from its leading bytes.
///
/// Binary formats are recognized by their magic numbers (in either byte order for
/// SPIR-V), textual formats by characteristic markers. Anything unrecognized is
/// [`SourceType::Unknown`].
///
/// # Examples
///
/// ```rust
/// use qpuc::precompilation::{detect_source_type, SourceType};
///
/// assert_eq!(detect_source_type(&[b'B', b'C', 0xC0, 0xDE, 0x35]), SourceType::LlvmIrBin);
/// assert_eq!(detect_source_type(b"; ModuleID = 'kernel.cl'\n"), SourceType::LlvmIrText);
/// assert_eq!(detect_source_type(b"__kernel void f() {}"), SourceType::OpenClC);
/// assert_eq!(detect_source_type(&[]), SourceType::Unknown);
/// ```
#[must_use]
pub fn detect_source_type(data: &[u8]) -> SourceType {
    if let Some(magic) = data.get(..4) {
        if magic == LLVM_BITCODE_MAGIC {
            return SourceType::LlvmIrBin;
        }

        let word = [magic[0], magic[1], magic[2], magic[3]];
        let little = u32::from_le_bytes(word);
        let big = u32::from_be_bytes(word);
        if little == LLVM_BITCODE_WRAPPER_MAGIC {
            return SourceType::LlvmIrBin;
        }
        if little == SPIRV_MAGIC || big == SPIRV_MAGIC {
            return SourceType::SpirvBin;
        }
        if little == QPUASM_MAGIC {
            return SourceType::QpuasmBin;
        }
    }

    let Ok(text) = std::str::from_utf8(data) else {
        return SourceType::Unknown;
    };

    if text.contains("OpCapability") || text.contains("; SPIR-V") {
        SourceType::SpirvText
    } else if text.contains("; ModuleID")
        || text.contains("target triple")
        || text.contains("target datalayout")
    {
        SourceType::LlvmIrText
    } else if text.contains("__kernel") || text.contains("kernel void") {
        SourceType::OpenClC
    } else if is_hex_listing(text) {
        SourceType::QpuasmHex
    } else {
        SourceType::Unknown
    }
}

/// A hex listing is a non-empty comma/whitespace separated list of `0x` words,
/// optionally interleaved with `//` comments.
fn is_hex_listing(text: &str) -> bool {
    let mut words = 0usize;
    for line in text.lines() {
        let code = line.split("//").next().unwrap_or_default();
        for token in code
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
        {
            let Some(digits) = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
            else {
                return false;
            };
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                return false;
            }
            words += 1;
        }
    }
    words > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_repr_round_trip() {
        for ty in SourceType::iter() {
            assert_eq!(SourceType::from_repr(ty as u8), Some(ty));
        }
        assert_eq!(SourceType::from_repr(8), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(SourceType::OpenClC.to_string(), "opencl-c");
        assert_eq!(SourceType::from_str("spirv-bin").ok(), Some(SourceType::SpirvBin));
        assert_eq!(Frontend::SpirV.to_string(), "spir-v");
    }

    #[test]
    fn test_detect_binary_magics() {
        assert_eq!(
            detect_source_type(&[0xDE, 0xC0, 0x17, 0x0B, 0, 0]),
            SourceType::LlvmIrBin
        );
        assert_eq!(detect_source_type(&[0x03, 0x02, 0x23, 0x07]), SourceType::SpirvBin);
        assert_eq!(detect_source_type(&[0x07, 0x23, 0x02, 0x03]), SourceType::SpirvBin);
        assert_eq!(detect_source_type(&[0xAF, 0xBE, 0xAD, 0xDE]), SourceType::QpuasmBin);
        assert_eq!(detect_source_type(&[0xFF, 0xFE, 0x00, 0x01]), SourceType::Unknown);
    }

    #[test]
    fn test_detect_text_markers() {
        assert_eq!(
            detect_source_type(b"; SPIR-V\n; Version: 1.0\nOpCapability Kernel\n"),
            SourceType::SpirvText
        );
        assert_eq!(
            detect_source_type(b"target triple = \"spir-unknown-unknown\"\n"),
            SourceType::LlvmIrText
        );
        assert_eq!(
            detect_source_type(b"0x00001234, 0x10020867, // nop\n0xdeadbeef\n"),
            SourceType::QpuasmHex
        );
        assert_eq!(detect_source_type(b"hello world"), SourceType::Unknown);
    }

    #[test]
    fn test_frontend_support() {
        for frontend in Frontend::iter() {
            assert!(!is_supported_by_frontend(SourceType::OpenClC, frontend));
            assert!(!is_supported_by_frontend(SourceType::QpuasmBin, frontend));
            assert!(!is_supported_by_frontend(SourceType::Unknown, frontend));
        }
        assert!(is_supported_by_frontend(SourceType::SpirvText, Frontend::Default));
        assert!(is_supported_by_frontend(SourceType::SpirvText, Frontend::SpirV));
        assert!(is_supported_by_frontend(SourceType::LlvmIrText, Frontend::LlvmIr));
        assert!(!is_supported_by_frontend(SourceType::LlvmIrText, Frontend::SpirV));
    }
}
