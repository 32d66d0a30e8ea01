//! Per-function loop analysis driver.
//!
//! Runs the complete loop pipeline on one method: CFG construction, dominance,
//! natural loop detection, the inclusion forest, cross-block dependencies, and per
//! loop the induction variables and invariants. The results are condensed into a
//! [`FunctionSummary`] that later passes (work-group loop unrolling, bound
//! elimination) consume.

use std::collections::BTreeSet;

use rayon::prelude::*;

use crate::{
    analysis::{
        cfg::{detect_loops, ControlFlowGraph, LoopInclusionTree},
        dependency::DataDependencyGraph,
        induction::{InductionAnalyzer, InductionVariable},
        invariants::find_loop_invariants,
    },
    ir::{BlockId, InstrId, Method},
    utils::graph::{compute_dominators, NodeId},
    BackendConfig, Result,
};

/// What the analysis found out about one loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSummary {
    /// The unique entry block, if the loop has one
    pub header: Option<BlockId>,
    /// The source block of the back edge
    pub tail: BlockId,
    /// Number of loops enclosing this one
    pub depth: usize,
    /// Index of the outermost enclosing loop in [`FunctionSummary::loops`]
    pub outermost: usize,
    /// Whether the loop iterates over the work-items of a work-group
    pub work_group: bool,
    /// Recovered induction variables, ordered by local
    pub induction_variables: Vec<InductionVariable>,
    /// Loop-invariant instructions
    pub invariants: BTreeSet<InstrId>,
    /// Iteration count of the first induction variable with literal bounds
    pub iteration_count: Option<u64>,
}

/// The loop structure of one function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionSummary {
    /// Name of the analyzed method
    pub name: String,
    /// One entry per back edge, in detection order
    pub loops: Vec<LoopSummary>,
}

impl FunctionSummary {
    /// The loops not enclosed by any other loop.
    pub fn outermost_loops(&self) -> impl Iterator<Item = &LoopSummary> + '_ {
        self.loops.iter().filter(|summary| summary.depth == 0)
    }
}

/// Analyzes the loops of `method`.
///
/// # Errors
///
/// Returns [`crate::Error::GraphError`] for a method without blocks and
/// [`crate::Error::Malformed`] for dangling branch targets or ids.
///
/// # Examples
///
/// ```rust
/// use qpuc::analysis::analyze_function;
/// use qpuc::ir::{DataType, MethodBuilder};
/// use qpuc::BackendConfig;
///
/// let method = MethodBuilder::new("straight").build_with(|f| {
///     f.block(0, |b| b.ret());
/// })?;
/// let summary = analyze_function(&method, &BackendConfig::default())?;
/// assert!(summary.loops.is_empty());
/// # Ok::<(), qpuc::Error>(())
/// ```
pub fn analyze_function(method: &Method, config: &BackendConfig) -> Result<FunctionSummary> {
    let cfg = ControlFlowGraph::from_method(method)?;
    let dominators = compute_dominators(&cfg);
    let loops = detect_loops(&cfg, &dominators);
    let tree = LoopInclusionTree::build(loops.clone());
    let dependencies = DataDependencyGraph::from_method(method)?;
    let analyzer = InductionAnalyzer::new(&cfg, &dependencies, config);

    let mut summaries = Vec::with_capacity(loops.len());
    for (index, cfg_loop) in loops.iter().enumerate() {
        let node = NodeId::new(index);
        let induction_variables = analyzer.find(cfg_loop, true)?;
        let iteration_count = induction_variables
            .iter()
            .find_map(InductionVariable::iteration_count);

        summaries.push(LoopSummary {
            header: cfg_loop.header(&cfg).and_then(|header| cfg.block_id(header)),
            tail: cfg
                .block_id(cfg_loop.tail())
                .ok_or_else(|| malformed_error!("Loop tail {} has no block", cfg_loop.tail()))?,
            depth: tree.longest_path_to_root(node),
            outermost: tree.find_root(node, config.max_inclusion_depth).index(),
            work_group: cfg_loop.is_work_group_loop(&cfg),
            invariants: find_loop_invariants(&cfg, cfg_loop, config.max_invariant_iterations)?,
            induction_variables,
            iteration_count,
        });
    }

    tracing::debug!(
        method = %method.name,
        loops = summaries.len(),
        counted = summaries.iter().filter(|s| s.iteration_count.is_some()).count(),
        "analyzed function"
    );

    Ok(FunctionSummary {
        name: method.name.clone(),
        loops: summaries,
    })
}

/// Analyzes independent methods in parallel.
///
/// The results are in the order of `methods`; one failing method does not affect
/// the others.
#[must_use]
pub fn analyze_functions(methods: &[Method], config: &BackendConfig) -> Vec<Result<FunctionSummary>> {
    methods
        .par_iter()
        .map(|method| analyze_function(method, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{Comparison, DataType, Decorations, MethodBuilder},
        Error,
    };

    /// for (i = 0; i < 4; i++) for (j = 0; j < 8; j++) {}
    fn nested() -> Method {
        MethodBuilder::new("nested")
            .build_with(|f| {
                let i = f.local("%i", DataType::INT32);
                let j = f.local("%j", DataType::INT32);
                let ci = f.local("%ci", DataType::BOOL);
                let cj = f.local("%cj", DataType::BOOL);
                f.block(0, |b| b.mov(i, 0));
                f.block(1, |b| b.mov(j, 0));
                f.block(2, |b| {
                    b.add(j, j, 1);
                    b.compare(cj, Comparison::Lt, j, 8);
                    b.branch_if(cj, 2);
                });
                f.block(3, |b| {
                    b.add(i, i, 1);
                    b.compare(ci, Comparison::Lt, i, 4);
                    b.branch_if(ci, 1);
                });
                f.block(4, |b| b.ret());
            })
            .unwrap()
    }

    #[test]
    fn test_nested_counting_loops() {
        let summary = analyze_function(&nested(), &BackendConfig::default()).unwrap();
        assert_eq!(summary.name, "nested");
        assert_eq!(summary.loops.len(), 2);

        let inner = summary
            .loops
            .iter()
            .find(|l| l.tail == BlockId::new(2))
            .unwrap();
        let outer = summary
            .loops
            .iter()
            .find(|l| l.tail == BlockId::new(3))
            .unwrap();

        assert_eq!(inner.depth, 1);
        assert_eq!(outer.depth, 0);
        assert_eq!(inner.header, Some(BlockId::new(2)));
        assert_eq!(outer.header, Some(BlockId::new(1)));
        assert_eq!(inner.iteration_count, Some(8));
        assert_eq!(outer.iteration_count, Some(4));
        assert_eq!(summary.outermost_loops().count(), 1);
        assert_eq!(
            summary.loops[inner.outermost].tail,
            outer.tail
        );
    }

    #[test]
    fn test_work_group_marker() {
        let method = MethodBuilder::new("work_group")
            .build_with(|f| {
                let c = f.local("%c", DataType::BOOL);
                f.block(0, |b| b.nop());
                f.block(1, |b| {
                    b.branch_if(c, 1);
                    b.decorate(Decorations::WORK_GROUP_LOOP);
                });
                f.block(2, |b| b.ret());
            })
            .unwrap();
        let summary = analyze_function(&method, &BackendConfig::default()).unwrap();
        assert!(summary.loops[0].work_group);
        assert_eq!(summary.loops[0].iteration_count, None);
    }

    #[test]
    fn test_parallel_driver_keeps_order() {
        let empty = Method::new("empty");
        let methods = vec![nested(), empty, nested()];
        let results = analyze_functions(&methods, &BackendConfig::default());

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().loops.len(), 2);
        assert!(matches!(results[1], Err(Error::GraphError(_))));
        assert_eq!(results[2].as_ref().unwrap().name, "nested");
    }
}
