//! Loop-invariant instruction discovery.
//!
//! An instruction inside a loop is invariant if every value it reads is a literal,
//! is defined only outside of the loop, or is produced only by instructions already
//! known to be invariant. The set is grown to a fixpoint. Instructions with
//! observable effects are never reported.

use std::collections::BTreeSet;

use crate::{
    analysis::cfg::{ControlFlowGraph, ControlFlowLoop},
    ir::{Decorations, InstrId, Instruction, InstructionKind, LocalId, Method},
    Result,
};

/// Finds the loop-invariant instructions of `cfg_loop`.
///
/// The fixpoint runs at most `max_iterations` rounds when given. Hitting the cap
/// logs a warning and returns the invariants found so far, all of which are
/// genuinely invariant.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if the loop refers to blocks or instructions
/// the method does not hold.
///
/// # Examples
///
/// ```rust
/// use qpuc::analysis::{detect_loops, find_loop_invariants, ControlFlowGraph};
/// use qpuc::ir::{DataType, MethodBuilder, Value};
/// use qpuc::utils::graph::compute_dominators;
///
/// let method = MethodBuilder::new("licm").build_with(|f| {
///     let n = f.parameter("%n", DataType::INT32);
///     let k = f.local("%k", DataType::INT32);
///     let c = f.local("%c", DataType::BOOL);
///     f.block(0, |b| b.nop());
///     f.block(1, |b| {
///         b.mul(k, n, Value::int(4));
///         b.branch_if(c, 1);
///     });
///     f.block(2, |b| b.ret());
/// })?;
/// let cfg = ControlFlowGraph::from_method(&method)?;
/// let loops = detect_loops(&cfg, &compute_dominators(&cfg));
///
/// let invariants = find_loop_invariants(&cfg, &loops[0], None)?;
/// assert_eq!(invariants.len(), 1);
/// # Ok::<(), qpuc::Error>(())
/// ```
pub fn find_loop_invariants(
    cfg: &ControlFlowGraph<'_>,
    cfg_loop: &ControlFlowLoop,
    max_iterations: Option<usize>,
) -> Result<BTreeSet<InstrId>> {
    let method = cfg.method();

    let in_loop = loop_instructions(cfg, cfg_loop)?;
    let mut candidates = Vec::new();
    for &id in &in_loop {
        let instruction = method.instruction(id)?;
        if is_candidate(instruction) {
            candidates.push((id, instruction));
        }
    }

    let mut invariants = BTreeSet::new();
    let mut rounds = 0usize;
    loop {
        if max_iterations.is_some_and(|max| rounds >= max) {
            tracing::warn!(
                rounds,
                found = invariants.len(),
                method = %method.name,
                "loop-invariant search stopped at iteration cap"
            );
            break;
        }
        rounds += 1;

        let mut changed = false;
        for &(id, instruction) in &candidates {
            if invariants.contains(&id) {
                continue;
            }
            let mut operands_invariant = true;
            for local in instruction.read_locals() {
                if !is_invariant_local(method, local, &in_loop, &invariants)? {
                    operands_invariant = false;
                    break;
                }
            }
            if operands_invariant {
                invariants.insert(id);
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    Ok(invariants)
}

/// All instructions placed in the blocks of `cfg_loop`.
pub(crate) fn loop_instructions(
    cfg: &ControlFlowGraph<'_>,
    cfg_loop: &ControlFlowLoop,
) -> Result<BTreeSet<InstrId>> {
    let method = cfg.method();
    let mut in_loop = BTreeSet::new();
    for block in cfg_loop.blocks(cfg) {
        in_loop.extend(method.block_instructions(block)?.map(|(id, _)| id));
    }
    Ok(in_loop)
}

/// Side-effect free instructions producing a value.
fn is_candidate(instruction: &Instruction) -> bool {
    if instruction.decorations.contains(Decorations::VOLATILE) {
        return false;
    }
    match &instruction.kind {
        InstructionKind::Move { .. }
        | InstructionKind::Operation { .. }
        | InstructionKind::Compare { .. } => true,
        InstructionKind::Call { dest, pure, .. } => *pure && dest.is_some(),
        InstructionKind::Branch { .. }
        | InstructionKind::Memory(_)
        | InstructionKind::Return { .. }
        | InstructionKind::Nop => false,
    }
}

/// A local is invariant if no writer is inside the loop, or if every writer is and
/// all of them are invariant.
pub(crate) fn is_invariant_local(
    method: &Method,
    local: LocalId,
    in_loop: &BTreeSet<InstrId>,
    invariants: &BTreeSet<InstrId>,
) -> Result<bool> {
    let local = method.local(local)?;
    let (inside, outside): (Vec<InstrId>, Vec<InstrId>) =
        local.writers().partition(|writer| in_loop.contains(writer));

    if inside.is_empty() {
        return Ok(true);
    }
    Ok(outside.is_empty() && inside.iter().all(|writer| invariants.contains(writer)))
}
