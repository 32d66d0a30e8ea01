//! Frontend-facing artifacts.
//!
//! The compilation pipeline that invokes external LLVM and SPIR-V toolchains lives
//! outside of this crate. What it hands over is modelled here:
//!
//! - [`SourceType`] / [`detect_source_type`] - what kind of artifact some bytes are
//! - [`Frontend`] / [`is_supported_by_frontend`] - which frontend accepts which input
//! - [`CompilationData`] - a file, temporary file or in-memory buffer holding an artifact
//! - [`StdlibFiles`] / [`find_standard_library_files`] - the precompiled standard library

mod data;
mod source;
mod stdlib;

pub use data::{CompilationData, DataView};
pub use source::{detect_source_type, is_supported_by_frontend, Frontend, SourceType};
pub use stdlib::{find_standard_library_files, StdlibFiles, DEFAULT_STDLIB_FOLDERS};
