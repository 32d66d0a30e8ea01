//! Control flow edge types for the CFG.
//!
//! This module defines the edge representations used in the control flow graph,
//! providing semantic information about how control flows between basic blocks.

use bitflags::bitflags;
use strum::Display;

use crate::ir::{BranchCondition, Decorations, InstrId};

/// The kind of control flow represented by an edge.
///
/// # Examples
///
/// ```rust
/// use qpuc::analysis::CfgEdgeKind;
///
/// let edge_kind = CfgEdgeKind::ConditionalTrue;
/// assert!(edge_kind.is_conditional());
/// assert_eq!(edge_kind.to_string(), "true");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum CfgEdgeKind {
    /// An unconditional branch.
    #[strum(serialize = "")]
    Unconditional,

    /// A branch taken when its condition local holds a non-zero value.
    #[strum(serialize = "true")]
    ConditionalTrue,

    /// A branch taken when its condition local holds zero.
    #[strum(serialize = "false")]
    ConditionalFalse,

    /// Fall-through into the next block in layout order.
    #[strum(serialize = "fallthrough")]
    Fallthrough,
}

impl CfgEdgeKind {
    /// Returns `true` if this is a conditional branch edge.
    #[must_use]
    pub const fn is_conditional(&self) -> bool {
        matches!(self, Self::ConditionalTrue | Self::ConditionalFalse)
    }

    /// The kind of edge a branch with `condition` produces.
    #[must_use]
    pub const fn from_condition(condition: BranchCondition) -> Self {
        match condition {
            BranchCondition::Always => Self::Unconditional,
            BranchCondition::IfTrue(_) => Self::ConditionalTrue,
            BranchCondition::IfFalse(_) => Self::ConditionalFalse,
        }
    }
}

bitflags! {
    /// Markers placed on CFG edges by earlier passes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EdgeFlags: u8 {
        /// The edge closes the implicit loop over the work-items of a work-group
        const WORK_GROUP_LOOP = 0x01;
    }
}

impl From<Decorations> for EdgeFlags {
    fn from(decorations: Decorations) -> Self {
        let mut flags = EdgeFlags::empty();
        if decorations.contains(Decorations::WORK_GROUP_LOOP) {
            flags |= EdgeFlags::WORK_GROUP_LOOP;
        }
        flags
    }
}

/// An edge in the control flow graph.
///
/// Two blocks are connected by at most one edge. When several branches (or a
/// branch and the fall-through) lead to the same block, the first one determines
/// the kind and the markers of all of them are merged.
///
/// # Examples
///
/// ```rust
/// use qpuc::analysis::{CfgEdge, CfgEdgeKind, EdgeFlags};
///
/// let edge = CfgEdge::new(CfgEdgeKind::Unconditional, None);
/// assert!(!edge.kind().is_conditional());
/// assert!(!edge.is_work_group_loop());
/// assert_eq!(edge.flags(), EdgeFlags::empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfgEdge {
    kind: CfgEdgeKind,
    flags: EdgeFlags,
    branch: Option<InstrId>,
}

impl CfgEdge {
    /// Creates an unmarked edge, optionally remembering the branch it stems from.
    #[must_use]
    pub const fn new(kind: CfgEdgeKind, branch: Option<InstrId>) -> Self {
        Self {
            kind,
            flags: EdgeFlags::empty(),
            branch,
        }
    }

    /// Returns the kind of control flow this edge represents.
    #[must_use]
    pub const fn kind(&self) -> CfgEdgeKind {
        self.kind
    }

    /// Returns the markers of this edge.
    #[must_use]
    pub const fn flags(&self) -> EdgeFlags {
        self.flags
    }

    /// The branch instruction creating this edge, `None` for fall-through.
    #[must_use]
    pub const fn branch(&self) -> Option<InstrId> {
        self.branch
    }

    /// Returns `true` if the edge carries the work-group loop marker.
    #[must_use]
    pub fn is_work_group_loop(&self) -> bool {
        self.flags.contains(EdgeFlags::WORK_GROUP_LOOP)
    }

    /// Adds markers to the edge.
    pub fn insert_flags(&mut self, flags: EdgeFlags) {
        self.flags |= flags;
    }
}
