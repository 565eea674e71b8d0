//! Construction Validator
//!
//! Performs every structural check at construction time. The scheduler does
//! no validation of its own.

use crate::error::GraphError;
use crate::types::NodeKey;
use crate::validated_graph::ValidatedGraph;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Construction-time structural validator
pub struct GraphValidator;

impl GraphValidator {
    /// Validate a declared graph
    ///
    /// Checks, in order:
    /// 1. The graph is non-empty and contains its start node
    /// 2. Every edge joins two declared, distinct nodes and appears once
    /// 3. The dependency relation is acyclic
    /// 4. The start node has no dependencies and reaches every other node
    /// 5. The terminal set is exactly the set of nodes without dependents
    pub fn validate<N: NodeKey>(
        start: N,
        nodes: &[N],
        edges: &[(N, N)],
        terminals: Option<&[N]>,
    ) -> Result<ValidatedGraph<N>, GraphError> {
        if nodes.is_empty() {
            return Err(GraphError::Empty);
        }
        if !nodes.contains(&start) {
            return Err(GraphError::MissingStart(start.to_string()));
        }

        let graph = Self::build_graph(nodes, edges)?;

        if let Err(cycle) = toposort(&graph, None) {
            return Err(GraphError::CycleDetected {
                node: cycle.node_id().to_string(),
            });
        }

        if graph
            .neighbors_directed(start, Direction::Incoming)
            .next()
            .is_some()
        {
            return Err(GraphError::StartHasDependencies(start.to_string()));
        }

        Self::check_reachability(&graph, start)?;
        let terminals = Self::resolve_terminals(&graph, terminals)?;

        let mut dependencies: HashMap<N, Vec<N>> = HashMap::new();
        let mut dependents: HashMap<N, Vec<N>> = HashMap::new();
        for node in graph.nodes() {
            let mut upstream: Vec<N> = graph
                .neighbors_directed(node, Direction::Incoming)
                .collect();
            upstream.sort();
            let mut downstream: Vec<N> = graph
                .neighbors_directed(node, Direction::Outgoing)
                .collect();
            downstream.sort();
            dependencies.insert(node, upstream);
            dependents.insert(node, downstream);
        }

        let levels = Self::levels(&graph, &dependencies);

        Ok(ValidatedGraph::seal(
            start,
            levels,
            dependencies,
            dependents,
            terminals,
            edges.len(),
        ))
    }

    fn build_graph<N: NodeKey>(
        nodes: &[N],
        edges: &[(N, N)],
    ) -> Result<DiGraphMap<N, ()>, GraphError> {
        let declared: HashSet<N> = nodes.iter().copied().collect();
        let mut graph = DiGraphMap::new();
        for &node in nodes {
            graph.add_node(node);
        }

        for &(from, to) in edges {
            for endpoint in [from, to] {
                if !declared.contains(&endpoint) {
                    return Err(GraphError::UnknownNode(endpoint.to_string()));
                }
            }
            if from == to {
                return Err(GraphError::SelfLoop(from.to_string()));
            }
            if graph.contains_edge(from, to) {
                return Err(GraphError::DuplicateEdge {
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
            graph.add_edge(from, to, ());
        }

        Ok(graph)
    }

    fn check_reachability<N: NodeKey>(
        graph: &DiGraphMap<N, ()>,
        start: N,
    ) -> Result<(), GraphError> {
        let mut visited = HashSet::new();
        let mut dfs = Dfs::new(graph, start);
        while let Some(node) = dfs.next(graph) {
            visited.insert(node);
        }

        let mut unreachable: Vec<N> = graph
            .nodes()
            .filter(|node| !visited.contains(node))
            .collect();
        if unreachable.is_empty() {
            return Ok(());
        }
        unreachable.sort();
        Err(GraphError::Unreachable {
            nodes: unreachable.iter().map(ToString::to_string).collect(),
        })
    }

    fn resolve_terminals<N: NodeKey>(
        graph: &DiGraphMap<N, ()>,
        declared: Option<&[N]>,
    ) -> Result<BTreeSet<N>, GraphError> {
        let sinks: BTreeSet<N> = graph
            .nodes()
            .filter(|&n| graph.neighbors_directed(n, Direction::Outgoing).next().is_none())
            .collect();

        let Some(declared) = declared else {
            return Ok(sinks);
        };

        let mut terminals = BTreeSet::new();
        for &terminal in declared {
            if !graph.contains_node(terminal) {
                return Err(GraphError::UnknownTerminal(terminal.to_string()));
            }
            if !sinks.contains(&terminal) {
                return Err(GraphError::TerminalHasDependents(terminal.to_string()));
            }
            terminals.insert(terminal);
        }
        if let Some(missing) = sinks.difference(&terminals).next() {
            return Err(GraphError::UndeclaredTerminal(missing.to_string()));
        }

        Ok(terminals)
    }

    /// Group nodes into dependency levels (Kahn's algorithm, one level at a
    /// time). Nodes within a level are sorted.
    fn levels<N: NodeKey>(
        graph: &DiGraphMap<N, ()>,
        dependencies: &HashMap<N, Vec<N>>,
    ) -> Vec<Vec<N>> {
        let mut remaining: HashMap<N, usize> = dependencies
            .iter()
            .map(|(&node, deps)| (node, deps.len()))
            .collect();
        let mut current: Vec<N> = remaining
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(&node, _)| node)
            .collect();
        current.sort();

        let mut levels = Vec::new();
        while !current.is_empty() {
            let mut next = Vec::new();
            for &node in &current {
                for dependent in graph.neighbors_directed(node, Direction::Outgoing) {
                    if let Some(count) = remaining.get_mut(&dependent) {
                        *count -= 1;
                        if *count == 0 {
                            next.push(dependent);
                        }
                    }
                }
            }
            next.sort();
            levels.push(std::mem::replace(&mut current, next));
        }
        levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(
        nodes: &[u32],
        edges: &[(u32, u32)],
        terminals: Option<&[u32]>,
    ) -> Result<ValidatedGraph<u32>, GraphError> {
        GraphValidator::validate(0, nodes, edges, terminals)
    }

    #[test]
    fn accepts_diamond() {
        let graph = validate(&[0, 1, 2, 3], &[(0, 1), (0, 2), (1, 3), (2, 3)], None).unwrap();
        assert_eq!(graph.levels(), &[vec![0], vec![1, 2], vec![3]]);
        assert_eq!(graph.dependencies_of(3), &[1, 2]);
        assert!(graph.is_terminal(3));
    }

    #[test]
    fn rejects_cycle() {
        let err = validate(&[0, 1, 2], &[(0, 1), (1, 2), (2, 1)], None).unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected { .. }));
    }

    #[test]
    fn rejects_unreachable_nodes() {
        let err = validate(&[0, 1, 5, 6], &[(0, 1), (5, 6)], None).unwrap_err();
        assert_eq!(
            err,
            GraphError::Unreachable {
                nodes: vec!["5".to_string(), "6".to_string()]
            }
        );
    }

    #[test]
    fn rejects_unknown_endpoint() {
        let err = validate(&[0, 1], &[(0, 1), (1, 9)], None).unwrap_err();
        assert_eq!(err, GraphError::UnknownNode("9".to_string()));
    }

    #[test]
    fn rejects_self_loop_and_duplicate_edge() {
        assert_eq!(
            validate(&[0, 1], &[(0, 1), (1, 1)], None).unwrap_err(),
            GraphError::SelfLoop("1".to_string())
        );
        assert!(matches!(
            validate(&[0, 1], &[(0, 1), (0, 1)], None).unwrap_err(),
            GraphError::DuplicateEdge { .. }
        ));
    }

    #[test]
    fn rejects_start_with_dependencies() {
        let err = validate(&[0, 1], &[(1, 0)], None).unwrap_err();
        // 1 -> 0 leaves 1 unreachable from 0 as well; the start check comes first
        assert_eq!(err, GraphError::StartHasDependencies("0".to_string()));
    }

    #[test]
    fn checks_declared_terminals() {
        let edges = [(0, 1), (0, 2)];
        assert!(validate(&[0, 1, 2], &edges, Some(&[1, 2])).is_ok());
        assert_eq!(
            validate(&[0, 1, 2], &edges, Some(&[1])).unwrap_err(),
            GraphError::UndeclaredTerminal("2".to_string())
        );
        assert_eq!(
            validate(&[0, 1, 2], &edges, Some(&[0, 1, 2])).unwrap_err(),
            GraphError::TerminalHasDependents("0".to_string())
        );
        assert_eq!(
            validate(&[0, 1, 2], &edges, Some(&[1, 2, 7])).unwrap_err(),
            GraphError::UnknownTerminal("7".to_string())
        );
    }

    #[test]
    fn rejects_empty_and_missing_start() {
        assert_eq!(validate(&[], &[], None).unwrap_err(), GraphError::Empty);
        assert_eq!(
            validate(&[1, 2], &[(1, 2)], None).unwrap_err(),
            GraphError::MissingStart("0".to_string())
        );
    }
}
