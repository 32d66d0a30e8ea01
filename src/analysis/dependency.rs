//! Cross-block data dependencies.
//!
//! A dependency `A -> B` on local `x` means that `x` is written in block `A` and
//! read in block `B`. Dependencies inside one block are not recorded.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    ir::{BlockId, LocalId, Method},
    Result,
};

/// The locals flowing between pairs of basic blocks of one function.
///
/// Usually derived from the use-lists with [`DataDependencyGraph::from_method`];
/// hosts running their own reaching-definitions analysis can fill it through
/// [`DataDependencyGraph::add_dependency`] instead.
///
/// # Examples
///
/// ```rust
/// use qpuc::analysis::DataDependencyGraph;
/// use qpuc::ir::{BlockId, DataType, MethodBuilder, Value};
///
/// let method = MethodBuilder::new("flow").build_with(|f| {
///     let x = f.local("%x", DataType::INT32);
///     let y = f.local("%y", DataType::INT32);
///     f.block(0, |b| b.mov(x, Value::int(1)));
///     f.block(1, |b| b.add(y, x, Value::int(2)));
/// })?;
///
/// let deps = DataDependencyGraph::from_method(&method)?;
/// let locals = deps.dependencies(BlockId::new(0), BlockId::new(1)).unwrap();
/// assert_eq!(locals.len(), 1);
/// # Ok::<(), qpuc::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct DataDependencyGraph {
    edges: BTreeMap<(BlockId, BlockId), BTreeSet<LocalId>>,
}

impl DataDependencyGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives the dependencies of every local from its writers and readers.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a use-list refers to an instruction
    /// that is not placed in any block.
    pub fn from_method(method: &Method) -> Result<Self> {
        let mut graph = Self::new();
        for (local_id, local) in method.locals() {
            let mut writer_blocks = BTreeSet::new();
            for writer in local.writers() {
                writer_blocks.insert(Self::block_of(method, writer)?);
            }
            if writer_blocks.is_empty() {
                continue;
            }

            let mut reader_blocks = BTreeSet::new();
            for reader in local.readers() {
                reader_blocks.insert(Self::block_of(method, reader)?);
            }

            for &from in &writer_blocks {
                for &to in &reader_blocks {
                    if from != to {
                        graph.add_dependency(from, to, local_id);
                    }
                }
            }
        }
        Ok(graph)
    }

    fn block_of(method: &Method, instruction: crate::ir::InstrId) -> Result<BlockId> {
        method
            .location(instruction)
            .map(|(block, _)| block)
            .ok_or_else(|| malformed_error!("Instruction {} is not placed in a block", instruction))
    }

    /// Records that `local` is written in `from` and read in `to`.
    pub fn add_dependency(&mut self, from: BlockId, to: BlockId, local: LocalId) {
        self.edges.entry((from, to)).or_default().insert(local);
    }

    /// The locals flowing from `from` into `to`.
    #[must_use]
    pub fn dependencies(&self, from: BlockId, to: BlockId) -> Option<&BTreeSet<LocalId>> {
        self.edges.get(&(from, to))
    }

    /// All blocks `to` depends on, with the locals flowing in from each.
    pub fn incoming(&self, to: BlockId) -> impl Iterator<Item = (BlockId, &BTreeSet<LocalId>)> + '_ {
        self.edges
            .iter()
            .filter(move |((_, target), _)| *target == to)
            .map(|((source, _), locals)| (*source, locals))
    }

    /// All blocks depending on `from`, with the locals flowing out to each.
    pub fn outgoing(&self, from: BlockId) -> impl Iterator<Item = (BlockId, &BTreeSet<LocalId>)> + '_ {
        self.edges
            .range((from, BlockId::new(0))..)
            .take_while(move |((source, _), _)| *source == from)
            .map(|((_, target), locals)| (*target, locals))
    }

    /// Returns the number of block pairs with at least one dependency.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns `true` if no dependency is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DataType, MethodBuilder, Value};

    fn b(index: usize) -> BlockId {
        BlockId::new(index)
    }

    #[test]
    fn test_from_method() {
        let mut ids = None;
        let method = MethodBuilder::new("deps")
            .build_with(|f| {
                let x = f.local("%x", DataType::INT32);
                let y = f.local("%y", DataType::INT32);
                f.block(0, |b| b.mov(x, Value::int(0)));
                f.block(1, |b| {
                    b.add(x, x, Value::int(1));
                    b.mov(y, x);
                });
                f.block(2, |b| b.ret_val(y));
                ids = Some((x, y));
            })
            .unwrap();
        let (x, y) = ids.unwrap();
        let deps = DataDependencyGraph::from_method(&method).unwrap();

        assert_eq!(deps.len(), 2);
        assert!(deps.dependencies(b(0), b(1)).unwrap().contains(&x));
        assert!(deps.dependencies(b(1), b(2)).unwrap().contains(&y));
        // x written and read in block 1 only counts across blocks
        assert!(deps.dependencies(b(1), b(1)).is_none());

        let incoming: Vec<_> = deps.incoming(b(1)).map(|(from, _)| from).collect();
        assert_eq!(incoming, vec![b(0)]);
        let outgoing: Vec<_> = deps.outgoing(b(1)).map(|(to, _)| to).collect();
        assert_eq!(outgoing, vec![b(2)]);
    }

    #[test]
    fn test_manual_construction() {
        let mut deps = DataDependencyGraph::new();
        assert!(deps.is_empty());
        deps.add_dependency(b(3), b(1), LocalId::new(0));
        deps.add_dependency(b(3), b(1), LocalId::new(2));
        deps.add_dependency(b(0), b(1), LocalId::new(0));

        assert_eq!(deps.len(), 2);
        assert_eq!(deps.dependencies(b(3), b(1)).unwrap().len(), 2);
        assert_eq!(deps.incoming(b(1)).count(), 2);
        assert_eq!(deps.outgoing(b(0)).count(), 1);
        assert_eq!(deps.outgoing(b(1)).count(), 0);
    }
}
