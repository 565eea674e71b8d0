//! Graph Builder
//!
//! The primary interface for the construction phase. Nodes and edges are
//! recorded as declared; nothing is checked until [`GraphBuilder::validate`].

use crate::construction::GraphValidator;
use crate::error::GraphError;
use crate::types::NodeKey;
use crate::validated_graph::ValidatedGraph;

/// Builder for dependency graphs
///
/// An edge `from -> to` means `to` depends on `from`: `to` is only dispatched
/// after the output of `from` has been merged.
///
/// Usage:
/// ```rust,ignore
/// let mut builder = GraphBuilder::new(Stage::Classify);
/// builder.add_edge(Stage::Classify, Stage::Remediate);
/// builder.fan_out(Stage::Remediate, &[Stage::Cookbook, Stage::Ticket]);
/// let graph = builder.validate()?;
/// ```
#[derive(Debug, Clone)]
pub struct GraphBuilder<N: NodeKey> {
    start: N,
    nodes: Vec<N>,
    edges: Vec<(N, N)>,
    terminals: Option<Vec<N>>,
}

impl<N: NodeKey> GraphBuilder<N> {
    /// Create a builder whose designated start node is `start`
    pub fn new(start: N) -> Self {
        Self {
            start,
            nodes: vec![start],
            edges: Vec::new(),
            terminals: None,
        }
    }

    /// Designated start node
    pub fn start(&self) -> N {
        self.start
    }

    /// Number of declared nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of declared edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Declare a node. Re-declaring a node is a no-op.
    pub fn add_node(&mut self, node: N) -> &mut Self {
        if !self.nodes.contains(&node) {
            self.nodes.push(node);
        }
        self
    }

    /// Declare that `to` depends on `from`.
    ///
    /// Endpoints are not declared implicitly; an edge to an undeclared node is
    /// reported by [`GraphBuilder::validate`].
    pub fn add_edge(&mut self, from: N, to: N) -> &mut Self {
        self.edges.push((from, to));
        self
    }

    /// Declare `node` together with all of its dependencies
    pub fn depends_on(&mut self, node: N, dependencies: &[N]) -> &mut Self {
        self.add_node(node);
        for &dep in dependencies {
            self.add_edge(dep, node);
        }
        self
    }

    /// Declare every node in `targets` as a dependent of `from`
    pub fn fan_out(&mut self, from: N, targets: &[N]) -> &mut Self {
        for &target in targets {
            self.add_node(target);
            self.add_edge(from, target);
        }
        self
    }

    /// Declare the terminal set explicitly.
    ///
    /// Without this call the terminal set is every node that has no
    /// dependents.
    pub fn with_terminals(&mut self, terminals: &[N]) -> &mut Self {
        self.terminals = Some(terminals.to_vec());
        self
    }

    /// Declared edges
    pub fn edges(&self) -> &[(N, N)] {
        &self.edges
    }

    /// Validate the graph and seal it.
    ///
    /// Once validated the graph cannot be modified.
    pub fn validate(self) -> Result<ValidatedGraph<N>, GraphError> {
        GraphValidator::validate(self.start, &self.nodes, &self.edges, self.terminals.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_node_is_idempotent() {
        let mut builder = GraphBuilder::new(1u32);
        builder.add_node(2).add_node(2).add_node(1);
        assert_eq!(builder.node_count(), 2);
    }

    #[test]
    fn fan_out_declares_targets_and_edges() {
        let mut builder = GraphBuilder::new(0u32);
        builder.fan_out(0, &[1, 2, 3]);
        assert_eq!(builder.node_count(), 4);
        assert_eq!(builder.edges(), &[(0, 1), (0, 2), (0, 3)]);
    }

    #[test]
    fn depends_on_adds_one_edge_per_dependency() {
        let mut builder = GraphBuilder::new(0u32);
        builder.add_node(1).add_node(2);
        builder.depends_on(3, &[1, 2]);
        assert_eq!(builder.edge_count(), 2);
        assert!(builder.edges().contains(&(1, 3)));
        assert!(builder.edges().contains(&(2, 3)));
    }
}
