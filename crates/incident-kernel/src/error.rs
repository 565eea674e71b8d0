//! Kernel error types
//!
//! [`GraphError`] is a configuration error: fatal, raised once while the graph
//! is validated and never retried. [`NodeFailure`] is a per-node failure that
//! the scheduler isolates to the node that produced it.

use std::fmt;

/// Malformed dependency graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// No nodes were declared
    #[error("graph has no nodes")]
    Empty,

    /// The designated start node was never declared
    #[error("start node `{0}` is not part of the graph")]
    MissingStart(String),

    /// The start node declares a dependency of its own
    #[error("start node `{0}` must not depend on other nodes")]
    StartHasDependencies(String),

    /// An edge references an undeclared node
    #[error("edge references unknown node `{0}`")]
    UnknownNode(String),

    /// A node depends on itself
    #[error("node `{0}` depends on itself")]
    SelfLoop(String),

    /// The same dependency was declared twice
    #[error("duplicate edge `{from}` -> `{to}`")]
    DuplicateEdge {
        /// Upstream node
        from: String,
        /// Downstream node
        to: String,
    },

    /// The dependency relation contains a cycle
    #[error("cycle detected through node `{node}`")]
    CycleDetected {
        /// A node that lies on the cycle
        node: String,
    },

    /// Nodes that cannot be reached from the start node
    #[error("nodes unreachable from start: {nodes:?}")]
    Unreachable {
        /// Unreachable node names, sorted
        nodes: Vec<String>,
    },

    /// A declared terminal node was never declared as a node
    #[error("terminal node `{0}` is not part of the graph")]
    UnknownTerminal(String),

    /// A declared terminal node still has dependents
    #[error("terminal node `{0}` has dependents")]
    TerminalHasDependents(String),

    /// A node without dependents is missing from the declared terminal set
    #[error("node `{0}` has no dependents but is not declared terminal")]
    UndeclaredTerminal(String),
}

/// Category of a node failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The node returned an error
    Failed,
    /// The node panicked
    Panicked,
    /// The node's output could not be merged into state
    MergeRejected,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Failed => write!(f, "failed"),
            FailureKind::Panicked => write!(f, "panicked"),
            FailureKind::MergeRejected => write!(f, "merge rejected"),
        }
    }
}

/// A node-level failure; recorded, never propagated past the scheduler
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct NodeFailure {
    /// Failure category
    pub kind: FailureKind,
    /// Human-readable detail
    pub message: String,
}

impl NodeFailure {
    /// Node returned an error
    #[inline]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Failed,
            message: message.into(),
        }
    }

    /// Node panicked
    #[inline]
    pub fn panicked(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Panicked,
            message: message.into(),
        }
    }

    /// Output rejected by the merge step
    #[inline]
    pub fn merge_rejected(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::MergeRejected,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_messages_name_the_node() {
        let err = GraphError::CycleDetected {
            node: "notify".to_string(),
        };
        assert_eq!(err.to_string(), "cycle detected through node `notify`");

        let err = GraphError::Unreachable {
            nodes: vec!["a".to_string(), "b".to_string()],
        };
        assert!(err.to_string().contains("\"a\""));
    }

    #[test]
    fn node_failure_display_includes_kind() {
        let failure = NodeFailure::panicked("boom");
        assert_eq!(failure.kind, FailureKind::Panicked);
        assert_eq!(failure.to_string(), "panicked: boom");
    }
}
