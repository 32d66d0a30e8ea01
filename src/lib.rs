// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]
//#![deny(unsafe_code)]
// - 'precompilation/data.rs' uses mmap to map compilation data files into memory

//! # qpuc
//!
//! The analysis core of a compiler backend that lowers OpenCL C kernels (via LLVM IR
//! or SPIR-V) onto the statically-scheduled VideoCore IV QPU instruction set.
//!
//! Two families of analyses live here, both running on the same arena-based
//! intermediate representation:
//!
//! - **Control-flow loop analysis** - natural loop detection from back edges, the
//!   loop inclusion forest, induction variable recovery with iteration bounds, and
//!   loop-invariant discovery. Vectorization, work-group loop unrolling and bound
//!   elimination all build on these results.
//! - **Memory operand classification** - for every memory access, which memory area
//!   it ultimately targets and whether it can be rerouted through the on-chip VPM
//!   scratchpad instead of the external memory bus.
//!
//! ## Features
//!
//! - **Arena IR** - [`ir::Method`] owns locals, instructions and basic blocks and
//!   keeps use-lists current; [`ir::MethodBuilder`] builds test kernels tersely
//! - **Read-only analyses** - nothing in [`analysis`] mutates the IR or the CFG
//! - **Explicit configuration** - [`BackendConfig`] carries hardware parameters,
//!   analysis caps and the resolved standard library location
//! - **Parallel driver** - [`analysis::analyze_functions`] analyzes independent
//!   kernels concurrently
//!
//! ## Quick Start
//!
//! ```rust
//! use qpuc::prelude::*;
//!
//! // i = 0; do { i = i + 1 } while (i < 16)
//! let method = MethodBuilder::new("count").build_with(|f| {
//!     let i = f.local("%i", DataType::INT32);
//!     let cond = f.local("%cond", DataType::BOOL);
//!     f.block(0, |b| b.mov(i, Value::int(0)));
//!     f.block(1, |b| {
//!         b.add(i, Value::local(i, DataType::INT32), Value::int(1));
//!         b.compare(cond, Comparison::Lt, Value::local(i, DataType::INT32), Value::int(16));
//!         b.branch_if(cond, 1);
//!     });
//!     f.block(2, |b| b.ret());
//! })?;
//!
//! let config = BackendConfig::default();
//! let summary = analyze_function(&method, &config)?;
//! assert_eq!(summary.loops.len(), 1);
//! assert_eq!(summary.loops[0].iteration_count, Some(16));
//! # Ok::<(), qpuc::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`Result<T>`]. Malformed IR (dangling ids,
//! untraceable memory operands, non-unit READ/WRITE counts) is reported as an
//! [`Error`]; analyses that merely cannot prove something answer `None`.
//!
//! ## Logging
//!
//! Diagnostics are emitted through the `tracing` facade. The library never installs
//! a subscriber; attach one in the host application to see them.

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use qpuc::prelude::*;
///
/// let config = BackendConfig::default();
/// assert_eq!(config.num_qpus, 12);
/// ```
pub mod prelude;

/// Backend configuration: hardware parameters, analysis caps and the standard
/// library location.
pub mod config;

/// The intermediate representation the analyses operate on.
///
/// # Key Types
///
/// - [`ir::Method`] - Arena owning locals, instructions and basic blocks
/// - [`ir::Local`] / [`ir::Value`] / [`ir::DataType`] - Typed value slots and operands
/// - [`ir::Instruction`] / [`ir::InstructionKind`] - The closed instruction set
/// - [`ir::MemoryInstruction`] - COPY / FILL / READ / WRITE with validated operands
/// - [`ir::MethodBuilder`] - Closure-based construction DSL
pub mod ir;

/// Control-flow and memory analyses.
///
/// # Key Types
///
/// - [`analysis::ControlFlowGraph`] - Basic-block graph built from a method
/// - [`analysis::ControlFlowLoop`] - A natural loop anchored by one back edge
/// - [`analysis::LoopInclusionTree`] - Loop nesting forest
/// - [`analysis::InductionVariable`] - Recovered loop counter with bounds
/// - [`analysis::MemoryAccessInfo`] - Memory operand classification queries
pub mod analysis;

/// Frontend artifacts: source type detection, compilation data storage and the
/// standard library file table.
pub mod precompilation;

/// Graph infrastructure and shared helpers.
pub mod utils;

pub use config::BackendConfig;

/// `qpuc` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub use error::Result;

/// `qpuc` Error type
///
/// The main error type for all operations in this crate. See [`Error`] for the
/// variants and which situations raise them.
pub use error::Error;
