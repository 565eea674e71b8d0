//! Shared kernel types

use std::fmt;
use std::hash::Hash;

/// Identifier of a graph node.
///
/// Anything small, copyable, totally ordered and printable qualifies; the
/// ordering is used to break ties between nodes that become ready together so
/// dispatch order is reproducible.
pub trait NodeKey:
    Copy + Eq + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
}

impl<T> NodeKey for T where
    T: Copy + Eq + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
}

/// Why a run stopped before every node completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller's cancellation token fired
    External,
    /// The configured run deadline elapsed
    Timeout,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::External => write!(f, "cancelled"),
            CancelReason::Timeout => write!(f, "timed out"),
        }
    }
}

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every declared terminal node completed
    Completed,
    /// The run stopped early; state holds only the merges that finished
    Cancelled(CancelReason),
}

impl RunStatus {
    /// True when the run stopped before completion
    #[inline]
    #[must_use]
    pub fn is_partial(&self) -> bool {
        matches!(self, RunStatus::Cancelled(_))
    }
}
