//! Validated Graph - Proof-Carrying Type
//!
//! A [`ValidatedGraph`] can ONLY be produced by the construction phase
//! ([`crate::construction::GraphBuilder::validate`]). It has no public
//! constructor, so every graph reaching the scheduler is known to be acyclic,
//! rooted at its start node and to carry an exact terminal set.

use crate::types::NodeKey;
use std::collections::{BTreeSet, HashMap};

/// Sealed, immutable dependency graph
#[derive(Debug, Clone)]
pub struct ValidatedGraph<N: NodeKey> {
    start: N,
    levels: Vec<Vec<N>>,
    order: Vec<N>,
    dependencies: HashMap<N, Vec<N>>,
    dependents: HashMap<N, Vec<N>>,
    terminals: BTreeSet<N>,
    edge_count: usize,
}

impl<N: NodeKey> ValidatedGraph<N> {
    /// Construct a ValidatedGraph (construction phase only)
    pub(crate) fn seal(
        start: N,
        levels: Vec<Vec<N>>,
        dependencies: HashMap<N, Vec<N>>,
        dependents: HashMap<N, Vec<N>>,
        terminals: BTreeSet<N>,
        edge_count: usize,
    ) -> Self {
        let order = levels.iter().flatten().copied().collect();
        Self {
            start,
            levels,
            order,
            dependencies,
            dependents,
            terminals,
            edge_count,
        }
    }

    /// Designated start node
    pub fn start(&self) -> N {
        self.start
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// All nodes in a topological order (level by level)
    pub fn nodes(&self) -> &[N] {
        &self.order
    }

    /// Nodes grouped by dependency depth; nodes in the same level never
    /// depend on each other
    pub fn levels(&self) -> &[Vec<N>] {
        &self.levels
    }

    /// Whether `node` is part of the graph
    pub fn contains(&self, node: N) -> bool {
        self.dependencies.contains_key(&node)
    }

    /// Direct dependencies of `node` (empty for unknown nodes)
    pub fn dependencies_of(&self, node: N) -> &[N] {
        self.dependencies.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct dependents of `node` (empty for unknown nodes)
    pub fn dependents_of(&self, node: N) -> &[N] {
        self.dependents.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Declared terminal nodes
    pub fn terminals(&self) -> &BTreeSet<N> {
        &self.terminals
    }

    /// Whether `node` is a terminal node
    pub fn is_terminal(&self, node: N) -> bool {
        self.terminals.contains(&node)
    }

    /// Whether the run is finished: all terminal nodes are complete
    pub fn is_complete<F>(&self, is_done: F) -> bool
    where
        F: Fn(N) -> bool,
    {
        self.terminals.iter().all(|&t| is_done(t))
    }
}

#[cfg(test)]
mod tests {
    use crate::construction::GraphBuilder;

    #[test]
    fn topological_order_respects_dependencies() {
        let mut builder = GraphBuilder::new(0u32);
        builder.fan_out(0, &[1, 2]).depends_on(3, &[2]);
        let graph = builder.validate().unwrap();

        let position = |n: u32| graph.nodes().iter().position(|&x| x == n).unwrap();
        for &node in graph.nodes() {
            for &dep in graph.dependencies_of(node) {
                assert!(position(dep) < position(node));
            }
        }
        assert_eq!(graph.dependents_of(0), &[1, 2]);
        assert_eq!(graph.terminals().iter().copied().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn completion_requires_every_terminal() {
        let mut builder = GraphBuilder::new(0u32);
        builder.fan_out(0, &[1, 2]);
        let graph = builder.validate().unwrap();

        assert!(!graph.is_complete(|n| n == 1));
        assert!(graph.is_complete(|n| n == 1 || n == 2));
    }
}
