//! Location of the precompiled OpenCL C standard library.

use std::path::{Path, PathBuf};

use crate::precompilation::Frontend;

/// Folders searched after the caller-supplied ones.
pub const DEFAULT_STDLIB_FOLDERS: &[&str] = &["/usr/local/include/qpu-stdlib", "/usr/include/qpu-stdlib"];

const CONFIGURATION_HEADER: &str = "defines.h";
const PRECOMPILED_HEADER: &str = "stdlib.h.pch";
const LLVM_MODULE: &str = "stdlib.bc";
const SPIRV_MODULE: &str = "stdlib.spv";

/// Paths of the standard library files, `None` where a file was not found.
///
/// The table is resolved once by [`find_standard_library_files`] and carried by
/// [`crate::BackendConfig`]; nothing caches it globally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StdlibFiles {
    /// The `defines.h` configuration header. Always required.
    pub configuration_header: Option<PathBuf>,
    /// The precompiled header. Only required by the SPIR-V frontend.
    pub precompiled_header: Option<PathBuf>,
    /// The precompiled LLVM module. Only required by the LLVM IR frontend.
    pub llvm_module: Option<PathBuf>,
    /// The precompiled SPIR-V module. Only required by the SPIR-V frontend.
    pub spirv_module: Option<PathBuf>,
}

impl StdlibFiles {
    /// Returns whether every file `frontend` needs was found.
    ///
    /// [`Frontend::Default`] is satisfied by either frontend's file set.
    #[must_use]
    pub fn is_complete_for(&self, frontend: Frontend) -> bool {
        let llvm = self.llvm_module.is_some();
        let spirv = self.precompiled_header.is_some() && self.spirv_module.is_some();
        self.configuration_header.is_some()
            && match frontend {
                Frontend::Default => llvm || spirv,
                Frontend::LlvmIr => llvm,
                Frontend::SpirV => spirv,
            }
    }
}

/// Looks up the standard library files in `additional_folders`, then in
/// [`DEFAULT_STDLIB_FOLDERS`]. For every file the first folder containing it wins.
///
/// # Examples
///
/// ```rust
/// use qpuc::precompilation::find_standard_library_files;
///
/// let files = find_standard_library_files(&["/nonexistent"]);
/// # let _ = files;
/// ```
#[must_use]
pub fn find_standard_library_files(additional_folders: &[&str]) -> StdlibFiles {
    let folders: Vec<&Path> = additional_folders
        .iter()
        .chain(DEFAULT_STDLIB_FOLDERS)
        .map(Path::new)
        .collect();

    let lookup = |name: &str| {
        folders
            .iter()
            .map(|folder| folder.join(name))
            .find(|candidate| candidate.is_file())
    };

    let files = StdlibFiles {
        configuration_header: lookup(CONFIGURATION_HEADER),
        precompiled_header: lookup(PRECOMPILED_HEADER),
        llvm_module: lookup(LLVM_MODULE),
        spirv_module: lookup(SPIRV_MODULE),
    };

    if files.configuration_header.is_none() {
        tracing::warn!(
            folders = folders.len(),
            "standard library configuration header not found"
        );
    }
    tracing::debug!(
        header = ?files.configuration_header,
        pch = ?files.precompiled_header,
        llvm = ?files.llvm_module,
        spirv = ?files.spirv_module,
        "resolved standard library files"
    );

    files
}
