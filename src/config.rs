//! Configuration for the backend analyses.
//!
//! This module provides [`BackendConfig`], which carries the hardware parameters the
//! memory classifier needs, the caps bounding pathological inputs, and the resolved
//! standard library location.

use crate::precompilation::StdlibFiles;

/// Number of QPUs of the VideoCore IV.
pub const DEFAULT_NUM_QPUS: u32 = 12;

/// Capacity of the VPM scratchpad in bytes.
pub const DEFAULT_VPM_CAPACITY: u32 = 12 * 1024;

/// Configuration for the backend analyses.
///
/// # Examples
///
/// ```rust
/// use qpuc::BackendConfig;
///
/// let config = BackendConfig {
///     max_invariant_iterations: Some(8),
///     ..BackendConfig::default()
/// };
/// assert_eq!(config.vpm_capacity, 12 * 1024);
/// assert!(!config.lower_register_values_into_vpm);
/// ```
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Number of QPUs sharing the VPM, one stack frame each (default: 12).
    pub num_qpus: u32,

    /// Capacity of the VPM scratchpad in bytes (default: 12 KiB).
    pub vpm_capacity: u32,

    /// Maximum rounds of the loop-invariant fixpoint, `None` for unbounded.
    ///
    /// Hitting the cap returns the invariants found so far and logs a warning.
    pub max_invariant_iterations: Option<usize>,

    /// Maximum number of parent steps when searching a loop's root in the
    /// inclusion forest, `None` for unbounded.
    pub max_inclusion_depth: Option<usize>,

    /// Allow lowering of register values whose only users are memory instructions
    /// into the VPM (default: false).
    pub lower_register_values_into_vpm: bool,

    /// Location of the precompiled standard library.
    pub stdlib: StdlibFiles,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            num_qpus: DEFAULT_NUM_QPUS,
            vpm_capacity: DEFAULT_VPM_CAPACITY,
            max_invariant_iterations: None,
            max_inclusion_depth: None,
            lower_register_values_into_vpm: false,
            stdlib: StdlibFiles::default(),
        }
    }
}

impl BackendConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with the standard library resolved from the default
    /// and `additional_folders` search locations.
    #[must_use]
    pub fn with_stdlib(additional_folders: &[&str]) -> Self {
        Self {
            stdlib: crate::precompilation::find_standard_library_files(additional_folders),
            ..Self::default()
        }
    }

    /// Creates a configuration with small caps, for untrusted input.
    #[must_use]
    pub fn bounded() -> Self {
        Self {
            max_invariant_iterations: Some(32),
            max_inclusion_depth: Some(64),
            ..Self::default()
        }
    }
}
