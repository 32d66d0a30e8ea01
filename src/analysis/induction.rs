//! Induction variable recovery.
//!
//! An induction variable is a local that enters a loop with exactly one initial
//! assignment from outside and is updated once per iteration by adding or
//! subtracting a loop-invariant step. The update is recognized either in place
//! (`i = i + s`) or through a temporary that is moved back (`t = i + s; i = t`).
//!
//! With iteration information requested, the comparison gating the loop's
//! repetition is recovered as well, which allows computing the number of
//! iterations for literal bounds.

use std::{collections::BTreeSet, fmt};

use crate::{
    analysis::{
        cfg::{ControlFlowGraph, ControlFlowLoop},
        dependency::DataDependencyGraph,
        invariants::{find_loop_invariants, is_invariant_local, loop_instructions},
    },
    ir::{
        BlockId, BranchCondition, Comparison, InstrId, InstructionKind, LocalId, Method, OpCode,
        Value,
    },
    utils::graph::NodeId,
    BackendConfig, Result,
};

/// A recovered induction variable with its optional repeat condition.
///
/// All bound queries return `None` when the operand they need is not a literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InductionVariable {
    /// The induction local
    pub local: LocalId,
    /// The assignment outside the loop providing the initial value
    pub initial_assignment: InstrId,
    /// The initial value, the moved value or the local itself for other writers
    pub initial_value: Value,
    /// The in-loop add or sub applying the step
    pub induction_step: InstrId,
    /// [`OpCode::Add`] or [`OpCode::Sub`]
    pub step_op: OpCode,
    /// The loop-invariant operand of the step
    pub step_value: Value,
    /// The local holding the stepped value; the induction local itself for
    /// in-place updates
    pub step_result: LocalId,
    /// The comparison that holds whenever the loop repeats, normalized to
    /// `local <op> value`
    pub repeat_condition: Option<(Comparison, Value)>,
    /// Whether the repeat condition is evaluated on the value before the step
    pub condition_checked_before_step: bool,
}

impl InductionVariable {
    /// The literal initial value.
    #[must_use]
    pub fn lower_bound(&self) -> Option<i64> {
        self.initial_value.as_literal()
    }

    /// The literal value the induction local is compared against.
    #[must_use]
    pub fn upper_bound(&self) -> Option<i64> {
        self.repeat_condition
            .as_ref()
            .and_then(|(_, value)| value.as_literal())
    }

    /// The signed literal step; negative for subtraction.
    #[must_use]
    pub fn step(&self) -> Option<i64> {
        let step = self.step_value.as_literal()?;
        match self.step_op {
            OpCode::Sub => step.checked_neg(),
            _ => Some(step),
        }
    }

    /// Distance between the bounds, `|upper - lower|`.
    #[must_use]
    pub fn range(&self) -> Option<u64> {
        Some(self.upper_bound()?.abs_diff(self.lower_bound()?))
    }

    /// Number of times the loop body runs.
    ///
    /// A condition checked before the step sees `lower`, `lower + step`, ...;
    /// one checked after the step sees `lower + step`, `lower + 2 * step`, ... and
    /// the body has already run once when it is first evaluated. Returns `None`
    /// if the loop does not terminate by counting or the bounds are not literal.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use qpuc::analysis::InductionVariable;
    /// use qpuc::ir::{Comparison, InstrId, LocalId, OpCode, Value};
    ///
    /// let i = LocalId::new(0);
    /// let mut variable = InductionVariable {
    ///     local: i,
    ///     initial_assignment: InstrId::new(0),
    ///     initial_value: Value::int(0),
    ///     induction_step: InstrId::new(2),
    ///     step_op: OpCode::Add,
    ///     step_value: Value::int(1),
    ///     step_result: i,
    ///     repeat_condition: Some((Comparison::Lt, Value::int(10))),
    ///     condition_checked_before_step: true,
    /// };
    /// assert_eq!(variable.iteration_count(), Some(10));
    ///
    /// variable.repeat_condition = Some((Comparison::Le, Value::int(10)));
    /// assert_eq!(variable.iteration_count(), Some(11));
    /// ```
    #[must_use]
    pub fn iteration_count(&self) -> Option<u64> {
        let (comparison, _) = self.repeat_condition.as_ref()?;
        let lower = self.lower_bound()?;
        let upper = self.upper_bound()?;
        let step = self.step()?;

        if self.condition_checked_before_step {
            repeat_prefix(*comparison, lower, upper, step)
        } else {
            repeat_prefix(*comparison, lower.checked_add(step)?, upper, step)?.checked_add(1)
        }
    }
}

impl fmt::Display for InductionVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {} ({} {})",
            self.local, self.initial_value, self.step_op, self.step_value
        )?;
        if let Some((comparison, value)) = &self.repeat_condition {
            let position = if self.condition_checked_before_step {
                "before"
            } else {
                "after"
            };
            write!(f, " while {comparison} {value} ({position} step)")?;
        }
        Ok(())
    }
}

/// Number of consecutive `k >= 0` for which `start + k * step <cmp> upper` holds.
fn repeat_prefix(comparison: Comparison, start: i64, upper: i64, step: i64) -> Option<u64> {
    if step == 0 {
        return None;
    }
    if !comparison.evaluate(start, upper) {
        return Some(0);
    }

    let (start, upper, step) = (i128::from(start), i128::from(upper), i128::from(step));
    let count = match comparison {
        Comparison::Lt if step > 0 => (upper - start + step - 1) / step,
        Comparison::Le if step > 0 => (upper - start) / step + 1,
        Comparison::Gt if step < 0 => (start - upper - step - 1) / -step,
        Comparison::Ge if step < 0 => (start - upper) / -step + 1,
        Comparison::Ne => {
            let distance = upper - start;
            if distance % step != 0 || distance / step <= 0 {
                return None;
            }
            distance / step
        }
        Comparison::Eq => 1,
        // moving away from the bound while the condition holds
        _ => return None,
    };
    u64::try_from(count).ok()
}

/// The in-loop update of a candidate.
struct Step {
    instruction: InstrId,
    op: OpCode,
    value: Value,
    result: LocalId,
    // the instruction assigning the induction local inside the loop
    writer: InstrId,
}

/// Recovers the induction variables of loops of one function.
///
/// # Examples
///
/// ```rust
/// use qpuc::analysis::{detect_loops, ControlFlowGraph, DataDependencyGraph, InductionAnalyzer};
/// use qpuc::ir::{Comparison, DataType, MethodBuilder};
/// use qpuc::utils::graph::compute_dominators;
/// use qpuc::BackendConfig;
///
/// let method = MethodBuilder::new("count").build_with(|f| {
///     let i = f.local("%i", DataType::INT32);
///     let c = f.local("%c", DataType::BOOL);
///     f.block(0, |b| b.mov(i, 0));
///     f.block(1, |b| {
///         b.compare(c, Comparison::Lt, i, 100);
///         b.branch_unless(c, 3);
///     });
///     f.block(2, |b| {
///         b.add(i, i, 1);
///         b.jump(1);
///     });
///     f.block(3, |b| b.ret());
/// })?;
///
/// let cfg = ControlFlowGraph::from_method(&method)?;
/// let loops = detect_loops(&cfg, &compute_dominators(&cfg));
/// let deps = DataDependencyGraph::from_method(&method)?;
/// let config = BackendConfig::default();
///
/// let analyzer = InductionAnalyzer::new(&cfg, &deps, &config);
/// let variables = analyzer.find(&loops[0], true)?;
/// assert_eq!(variables[0].iteration_count(), Some(100));
/// # Ok::<(), qpuc::Error>(())
/// ```
pub struct InductionAnalyzer<'a, 'm> {
    cfg: &'a ControlFlowGraph<'m>,
    dependencies: &'a DataDependencyGraph,
    config: &'a BackendConfig,
}

impl<'a, 'm> InductionAnalyzer<'a, 'm> {
    /// Creates an analyzer over `cfg` using the cross-block `dependencies`.
    #[must_use]
    pub fn new(
        cfg: &'a ControlFlowGraph<'m>,
        dependencies: &'a DataDependencyGraph,
        config: &'a BackendConfig,
    ) -> Self {
        InductionAnalyzer {
            cfg,
            dependencies,
            config,
        }
    }

    /// Finds the induction variables of `cfg_loop`, ordered by local.
    ///
    /// With `include_iteration_information`, the repeat condition of every variable
    /// is searched as well; variables without one are still reported.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the loop or the dependency graph
    /// refer to blocks, instructions or locals the method does not hold.
    pub fn find(
        &self,
        cfg_loop: &ControlFlowLoop,
        include_iteration_information: bool,
    ) -> Result<Vec<InductionVariable>> {
        let method = self.cfg.method();
        let loop_blocks: BTreeSet<BlockId> = cfg_loop.blocks(self.cfg).collect();
        let in_loop = loop_instructions(self.cfg, cfg_loop)?;
        let invariants =
            find_loop_invariants(self.cfg, cfg_loop, self.config.max_invariant_iterations)?;

        let mut variables = Vec::new();
        for (local, source_blocks) in self.candidates(method, cfg_loop, &loop_blocks, &in_loop)? {
            let name = &method.local(local)?.name;
            if source_blocks.len() != 1 {
                tracing::trace!(
                    local = %name,
                    definitions = source_blocks.len(),
                    "no unique initial assignment"
                );
                continue;
            }
            let Some(&source) = source_blocks.iter().next() else {
                continue;
            };
            let Some(initial_assignment) = Self::last_writer(method, source, local)? else {
                continue;
            };

            let Some(step) = Self::recognize_step(method, local, &in_loop, &invariants)? else {
                tracing::trace!(local = %name, "in-loop update is not an invariant add or sub");
                continue;
            };

            let initial_value = match &method.instruction(initial_assignment)?.kind {
                InstructionKind::Move { source, .. } => source.clone(),
                _ => method.value_of(local)?,
            };

            let mut variable = InductionVariable {
                local,
                initial_assignment,
                initial_value,
                induction_step: step.instruction,
                step_op: step.op,
                step_value: step.value,
                step_result: step.result,
                repeat_condition: None,
                condition_checked_before_step: true,
            };
            if include_iteration_information {
                self.find_repeat_condition(cfg_loop, &loop_blocks, step.writer, &mut variable)?;
            }
            variables.push(variable);
        }

        Ok(variables)
    }

    /// Locals written inside the loop that flow in from outside, with the blocks
    /// outside the loop they flow in from.
    fn candidates(
        &self,
        method: &Method,
        cfg_loop: &ControlFlowLoop,
        loop_blocks: &BTreeSet<BlockId>,
        in_loop: &BTreeSet<InstrId>,
    ) -> Result<std::collections::BTreeMap<LocalId, BTreeSet<BlockId>>> {
        let mut candidates: std::collections::BTreeMap<LocalId, BTreeSet<BlockId>> =
            std::collections::BTreeMap::new();
        for &block in loop_blocks {
            for (source, locals) in self.dependencies.incoming(block) {
                if loop_blocks.contains(&source) {
                    continue;
                }
                for &local in locals {
                    if method.local(local)?.writers().any(|w| in_loop.contains(&w))
                        && self.reaches_loop_entry(method, cfg_loop, source, local)?
                    {
                        candidates.entry(local).or_default().insert(source);
                    }
                }
            }
        }
        Ok(candidates)
    }

    /// Whether the value `local` holds when leaving `source` can enter the loop: some
    /// path reaches the loop header without passing another write of `local`.
    fn reaches_loop_entry(
        &self,
        method: &Method,
        cfg_loop: &ControlFlowLoop,
        source: BlockId,
        local: LocalId,
    ) -> Result<bool> {
        let Some(start) = self.cfg.node_of(source) else {
            return Ok(false);
        };
        let header = cfg_loop.back_edge_target();
        let killing: BTreeSet<NodeId> = method
            .local(local)?
            .writers()
            .filter_map(|writer| method.location(writer))
            .filter_map(|(block, _)| self.cfg.node_of(block))
            .collect();

        let mut visited = BTreeSet::new();
        let mut pending: Vec<NodeId> = self.cfg.successors(start).collect();
        while let Some(node) = pending.pop() {
            if node == header {
                return Ok(true);
            }
            if cfg_loop.contains(node) || killing.contains(&node) || !visited.insert(node) {
                continue;
            }
            pending.extend(self.cfg.successors(node));
        }
        Ok(false)
    }

    /// Whether every path from the loop header to `to` within one iteration passes
    /// through `through`.
    fn precedes_in_iteration(
        &self,
        cfg_loop: &ControlFlowLoop,
        through: BlockId,
        to: BlockId,
    ) -> bool {
        let header = cfg_loop.back_edge_target();
        let (Some(through), Some(to)) = (self.cfg.node_of(through), self.cfg.node_of(to)) else {
            return false;
        };
        if through == header {
            return true;
        }

        let mut visited = BTreeSet::from([header]);
        let mut pending = vec![header];
        while let Some(node) = pending.pop() {
            if node == to {
                return false;
            }
            for next in self.cfg.successors(node) {
                if next != through && cfg_loop.contains(next) && visited.insert(next) {
                    pending.push(next);
                }
            }
        }
        true
    }

    fn last_writer(method: &Method, block: BlockId, local: LocalId) -> Result<Option<InstrId>> {
        Ok(method
            .block_instructions(block)?
            .filter(|(_, instruction)| instruction.output() == Some(local))
            .map(|(id, _)| id)
            .last())
    }

    /// Matches the single in-loop writer of `local` against the update shapes.
    fn recognize_step(
        method: &Method,
        local: LocalId,
        in_loop: &BTreeSet<InstrId>,
        invariants: &BTreeSet<InstrId>,
    ) -> Result<Option<Step>> {
        let Some(writer) = Self::single_loop_writer(method, local, in_loop)? else {
            return Ok(None);
        };

        let (instruction, result) = match &method.instruction(writer)?.kind {
            InstructionKind::Operation { dest, .. } if *dest == local => (writer, local),
            InstructionKind::Move { dest, source } if *dest == local => {
                let Some(temporary) = source.as_local() else {
                    return Ok(None);
                };
                match Self::single_loop_writer(method, temporary, in_loop)? {
                    Some(update) => (update, temporary),
                    None => return Ok(None),
                }
            }
            _ => return Ok(None),
        };

        let InstructionKind::Operation {
            op,
            dest,
            left,
            right: Some(right),
        } = &method.instruction(instruction)?.kind
        else {
            return Ok(None);
        };
        if *dest != result {
            return Ok(None);
        }

        let step_value = match op {
            OpCode::Add if left.as_local() == Some(local) => right,
            OpCode::Add if right.as_local() == Some(local) => left,
            OpCode::Sub if left.as_local() == Some(local) => right,
            _ => return Ok(None),
        };
        if let Some(step_local) = step_value.as_local() {
            if step_local == local
                || step_local == result
                || !is_invariant_local(method, step_local, in_loop, invariants)?
            {
                return Ok(None);
            }
        }

        Ok(Some(Step {
            instruction,
            op: *op,
            value: step_value.clone(),
            result,
            writer,
        }))
    }

    fn single_loop_writer(
        method: &Method,
        local: LocalId,
        in_loop: &BTreeSet<InstrId>,
    ) -> Result<Option<InstrId>> {
        let mut writers = method.local(local)?.writers().filter(|w| in_loop.contains(w));
        match (writers.next(), writers.next()) {
            (Some(writer), None) => Ok(Some(writer)),
            _ => Ok(None),
        }
    }

    /// Searches a comparison of the induction local (or its stepped value) whose
    /// result controls a branch repeating or leaving the loop.
    fn find_repeat_condition(
        &self,
        cfg_loop: &ControlFlowLoop,
        loop_blocks: &BTreeSet<BlockId>,
        writer: InstrId,
        variable: &mut InductionVariable,
    ) -> Result<()> {
        let method = self.cfg.method();
        let tracked = [variable.local, variable.step_result];
        let writer_location = method.location(writer);

        for &block in loop_blocks {
            for (compare_id, instruction) in method.block_instructions(block)? {
                let InstructionKind::Compare {
                    dest,
                    comparison,
                    left,
                    right,
                } = &instruction.kind
                else {
                    continue;
                };

                let (comparison, read, bound) = match (left.as_local(), right.as_local()) {
                    (Some(l), _) if tracked.contains(&l) => (*comparison, l, right),
                    (_, Some(r)) if tracked.contains(&r) => (comparison.swap(), r, left),
                    _ => continue,
                };
                if bound.as_local().is_some_and(|b| tracked.contains(&b)) {
                    continue;
                }

                let Some(repeat) = self.repeat_comparison(cfg_loop, loop_blocks, *dest, comparison)?
                else {
                    continue;
                };

                // the stepped value is read if the writer runs first in every iteration
                let before_step = if read == variable.local {
                    match (writer_location, method.location(compare_id)) {
                        (Some((wb, wp)), Some((cb, cp))) if wb == cb => cp < wp,
                        (Some((wb, _)), Some((cb, _))) => {
                            !self.precedes_in_iteration(cfg_loop, wb, cb)
                        }
                        _ => true,
                    }
                } else {
                    false
                };

                variable.repeat_condition = Some((repeat, bound.clone()));
                variable.condition_checked_before_step = before_step;
                return Ok(());
            }
        }

        tracing::trace!(
            local = %variable.local,
            "no comparison controls the loop repetition"
        );
        Ok(())
    }

    /// The comparison holding whenever the loop repeats, if `condition` controls a
    /// branch that either jumps back to the loop header or leaves the loop.
    fn repeat_comparison(
        &self,
        cfg_loop: &ControlFlowLoop,
        loop_blocks: &BTreeSet<BlockId>,
        condition: LocalId,
        comparison: Comparison,
    ) -> Result<Option<Comparison>> {
        let method = self.cfg.method();
        let header = self.cfg.block_id(cfg_loop.back_edge_target());

        for &block in loop_blocks {
            for (_, instruction) in method.block_instructions(block)? {
                let InstructionKind::Branch {
                    target,
                    condition: branch_condition,
                } = &instruction.kind
                else {
                    continue;
                };
                let holds_when_taken = match branch_condition {
                    BranchCondition::IfTrue(local) if *local == condition => comparison,
                    BranchCondition::IfFalse(local) if *local == condition => comparison.negate(),
                    _ => continue,
                };

                if Some(*target) == header {
                    return Ok(Some(holds_when_taken));
                }
                if !loop_blocks.contains(target) {
                    return Ok(Some(holds_when_taken.negate()));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::cfg::detect_loops,
        ir::{DataType, MethodBuilder},
        utils::graph::compute_dominators,
    };

    fn variables_of(method: &Method) -> Vec<InductionVariable> {
        let cfg = ControlFlowGraph::from_method(method).unwrap();
        let loops = detect_loops(&cfg, &compute_dominators(&cfg));
        assert_eq!(loops.len(), 1);
        let deps = DataDependencyGraph::from_method(method).unwrap();
        let config = BackendConfig::default();
        InductionAnalyzer::new(&cfg, &deps, &config)
            .find(&loops[0], true)
            .unwrap()
    }

    /// while (i <cmp> bound) { i += step }
    fn checked_before(start: i32, comparison: Comparison, bound: i32, step: i32) -> Method {
        MethodBuilder::new("while")
            .build_with(|f| {
                let i = f.local("%i", DataType::INT32);
                let c = f.local("%c", DataType::BOOL);
                f.block(0, |b| b.mov(i, start));
                f.block(1, |b| {
                    b.compare(c, comparison, i, bound);
                    b.branch_unless(c, 3);
                });
                f.block(2, |b| {
                    b.add(i, i, step);
                    b.jump(1);
                });
                f.block(3, |b| b.ret());
            })
            .unwrap()
    }

    /// do { i += step } while (i <cmp> bound)
    fn checked_after(start: i32, comparison: Comparison, bound: i32, step: i32) -> Method {
        MethodBuilder::new("do_while")
            .build_with(|f| {
                let i = f.local("%i", DataType::INT32);
                let c = f.local("%c", DataType::BOOL);
                f.block(0, |b| b.mov(i, start));
                f.block(1, |b| {
                    b.add(i, i, step);
                    b.compare(c, comparison, i, bound);
                    b.branch_if(c, 1);
                });
                f.block(2, |b| b.ret());
            })
            .unwrap()
    }

    fn count(method: &Method) -> Option<u64> {
        let variables = variables_of(method);
        assert_eq!(variables.len(), 1);
        variables[0].iteration_count()
    }

    #[test]
    fn test_canonical_loop() {
        let variables = variables_of(&checked_before(0, Comparison::Lt, 16, 1));
        let variable = &variables[0];

        assert_eq!(variable.lower_bound(), Some(0));
        assert_eq!(variable.upper_bound(), Some(16));
        assert_eq!(variable.step(), Some(1));
        assert_eq!(variable.range(), Some(16));
        assert_eq!(variable.repeat_condition.as_ref().map(|(c, _)| *c), Some(Comparison::Lt));
        assert!(variable.condition_checked_before_step);
        assert_eq!(variable.iteration_count(), Some(16));
    }

    #[test]
    fn test_counts_strict_and_inclusive() {
        // before step: the body sees 0..N-1 (strict) or 0..N (inclusive)
        assert_eq!(count(&checked_before(0, Comparison::Lt, 10, 1)), Some(10));
        assert_eq!(count(&checked_before(0, Comparison::Le, 10, 1)), Some(11));
        // after step: the first check sees 1, the body already ran once
        assert_eq!(count(&checked_after(0, Comparison::Lt, 10, 1)), Some(10));
        assert_eq!(count(&checked_after(0, Comparison::Le, 10, 1)), Some(11));
    }

    #[test]
    fn test_counts_with_stride_and_equal_bounds() {
        assert_eq!(count(&checked_before(0, Comparison::Lt, 10, 3)), Some(4));
        assert_eq!(count(&checked_after(0, Comparison::Lt, 10, 3)), Some(4));
        assert_eq!(count(&checked_before(5, Comparison::Lt, 5, 1)), Some(0));
        assert_eq!(count(&checked_before(5, Comparison::Le, 5, 1)), Some(1));
        // do-while runs at least once
        assert_eq!(count(&checked_after(5, Comparison::Lt, 5, 1)), Some(1));
        assert_eq!(count(&checked_after(5, Comparison::Le, 5, 1)), Some(1));
    }

    #[test]
    fn test_descending_loop() {
        let method = MethodBuilder::new("down")
            .build_with(|f| {
                let i = f.local("%i", DataType::INT32);
                let c = f.local("%c", DataType::BOOL);
                f.block(0, |b| b.mov(i, 10));
                f.block(1, |b| {
                    b.sub(i, i, 2);
                    // 0 < i, normalized to i > 0
                    b.compare(c, Comparison::Lt, 0, i);
                    b.branch_if(c, 1);
                });
                f.block(2, |b| b.ret());
            })
            .unwrap();
        let variables = variables_of(&method);
        let variable = &variables[0];
        assert_eq!(variable.step(), Some(-2));
        assert_eq!(variable.repeat_condition.as_ref().map(|(c, _)| *c), Some(Comparison::Gt));
        assert!(!variable.condition_checked_before_step);
        // 10 -> 8 -> 6 -> 4 -> 2 -> 0
        assert_eq!(variable.iteration_count(), Some(5));
    }

    #[test]
    fn test_update_through_temporary() {
        let method = MethodBuilder::new("tmp")
            .build_with(|f| {
                let i = f.local("%i", DataType::INT32);
                let t = f.local("%t", DataType::INT32);
                let c = f.local("%c", DataType::BOOL);
                f.block(0, |b| b.mov(i, 0));
                f.block(1, |b| {
                    b.add(t, 1, i);
                    b.compare(c, Comparison::Ne, t, 8);
                    b.mov(i, t);
                    b.branch_if(c, 1);
                });
                f.block(2, |b| b.ret());
            })
            .unwrap();
        let variables = variables_of(&method);
        assert_eq!(variables.len(), 1);
        let variable = &variables[0];
        assert_ne!(variable.step_result, variable.local);
        assert!(!variable.condition_checked_before_step);
        assert_eq!(variable.iteration_count(), Some(8));
    }

    #[test]
    fn test_rejected_candidates() {
        let method = MethodBuilder::new("reject")
            .build_with(|f| {
                let n = f.parameter("%n", DataType::INT32);
                let i = f.local("%i", DataType::INT32);
                let j = f.local("%j", DataType::INT32);
                let k = f.local("%k", DataType::INT32);
                let c = f.local("%c", DataType::BOOL);
                f.block(0, |b| {
                    b.mov(i, 0);
                    b.mov(j, 1);
                    b.mov(k, 0);
                });
                f.block(1, |b| {
                    // multiplied, not stepped
                    b.mul(j, j, 2);
                    // variant step
                    b.add(k, k, j);
                    // step by a parameter is fine
                    b.add(i, i, n);
                    b.compare(c, Comparison::Lt, i, 64);
                    b.branch_if(c, 1);
                });
                f.block(2, |b| b.ret());
            })
            .unwrap();
        let variables = variables_of(&method);
        assert_eq!(variables.len(), 1);
        assert_eq!(variables[0].step(), None);
        assert_eq!(variables[0].upper_bound(), Some(64));
        assert_eq!(variables[0].iteration_count(), None);
    }

    #[test]
    fn test_two_initial_assignments() {
        let method = MethodBuilder::new("phi")
            .build_with(|f| {
                let p = f.parameter("%p", DataType::BOOL);
                let i = f.local("%i", DataType::INT32);
                let c = f.local("%c", DataType::BOOL);
                f.block(0, |b| {
                    b.mov(i, 0);
                    b.branch_if(p, 2);
                });
                f.block(1, |b| b.mov(i, 4));
                f.block(2, |b| {
                    b.add(i, i, 1);
                    b.compare(c, Comparison::Lt, i, 8);
                    b.branch_if(c, 2);
                });
                f.block(3, |b| b.ret());
            })
            .unwrap();
        assert!(variables_of(&method).is_empty());
    }

    #[test]
    fn test_step_in_header_compare_in_latch() {
        // i = 5; do { i += 1 } while (i < 5), split over header and latch
        let method = MethodBuilder::new("latch")
            .build_with(|f| {
                let i = f.local("%i", DataType::INT32);
                let c = f.local("%c", DataType::BOOL);
                f.block(0, |b| b.mov(i, 5));
                f.block(1, |b| b.add(i, i, 1));
                f.block(2, |b| {
                    b.compare(c, Comparison::Lt, i, 5);
                    b.branch_if(c, 1);
                });
                f.block(3, |b| b.ret());
            })
            .unwrap();
        let variables = variables_of(&method);
        assert!(!variables[0].condition_checked_before_step);
        assert_eq!(variables[0].iteration_count(), Some(1));

        // with a body block between step and check: i = 1..=10
        let method = MethodBuilder::new("latch_body")
            .build_with(|f| {
                let i = f.local("%i", DataType::INT32);
                let c = f.local("%c", DataType::BOOL);
                f.block(0, |b| b.mov(i, 0));
                f.block(1, |b| b.add(i, i, 1));
                f.block(2, |b| b.nop());
                f.block(3, |b| {
                    b.compare(c, Comparison::Lt, i, 10);
                    b.branch_if(c, 1);
                });
                f.block(4, |b| b.ret());
            })
            .unwrap();
        let variables = variables_of(&method);
        assert!(!variables[0].condition_checked_before_step);
        assert_eq!(variables[0].iteration_count(), Some(10));
    }

    #[test]
    fn test_step_on_one_path_only() {
        // the step block can be skipped, so the check does not always see it
        let method = MethodBuilder::new("skip")
            .build_with(|f| {
                let p = f.parameter("%p", DataType::BOOL);
                let i = f.local("%i", DataType::INT32);
                let c = f.local("%c", DataType::BOOL);
                f.block(0, |b| b.mov(i, 0));
                f.block(1, |b| b.branch_if(p, 3));
                f.block(2, |b| b.add(i, i, 1));
                f.block(3, |b| {
                    b.compare(c, Comparison::Lt, i, 10);
                    b.branch_if(c, 1);
                });
                f.block(4, |b| b.ret());
            })
            .unwrap();
        let variables = variables_of(&method);
        assert!(variables[0].condition_checked_before_step);
    }

    #[test]
    fn test_reassignment_after_loop() {
        // i = 0; while (i < 10) i++; i = 0
        let method = MethodBuilder::new("reset")
            .build_with(|f| {
                let i = f.local("%i", DataType::INT32);
                let c = f.local("%c", DataType::BOOL);
                f.block(0, |b| b.mov(i, 0));
                f.block(1, |b| {
                    b.compare(c, Comparison::Lt, i, 10);
                    b.branch_unless(c, 3);
                });
                f.block(2, |b| {
                    b.add(i, i, 1);
                    b.jump(1);
                });
                f.block(3, |b| {
                    b.mov(i, 0);
                    b.ret();
                });
            })
            .unwrap();
        let variables = variables_of(&method);
        assert_eq!(variables.len(), 1);
        assert_eq!(variables[0].initial_assignment, InstrId::new(0));
        assert_eq!(variables[0].iteration_count(), Some(10));
    }

    #[test]
    fn test_repeat_prefix_edges() {
        assert_eq!(repeat_prefix(Comparison::Lt, 0, 10, 0), None);
        assert_eq!(repeat_prefix(Comparison::Lt, 0, 10, -1), None);
        assert_eq!(repeat_prefix(Comparison::Gt, 10, 0, -3), Some(4));
        assert_eq!(repeat_prefix(Comparison::Ge, 10, 0, -5), Some(3));
        assert_eq!(repeat_prefix(Comparison::Ne, 0, 9, 2), None);
        assert_eq!(repeat_prefix(Comparison::Ne, 0, 9, 3), Some(3));
        assert_eq!(repeat_prefix(Comparison::Eq, 4, 4, 1), Some(1));
        assert_eq!(repeat_prefix(Comparison::Eq, 4, 5, 1), Some(0));
    }
}
