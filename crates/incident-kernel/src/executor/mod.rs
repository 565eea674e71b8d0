//! Execution Phase
//!
//! [`NodeRunner`] is the seam between the scheduler and the work it runs.
//! The scheduler owns ordering, concurrency and the merge lock; the runner
//! owns what a node computes and how its output is folded into state.
//!
//! # Critical Invariant
//!
//! `run` only ever sees an immutable snapshot. State is mutated exclusively
//! through `merge`, which the scheduler calls one node at a time.

use crate::error::NodeFailure;
use crate::types::NodeKey;
use std::sync::Arc;

/// Node runner trait
///
/// Implement this trait to define how individual nodes are executed and
/// merged.
#[async_trait::async_trait]
pub trait NodeRunner<N: NodeKey, S>: Send + Sync + 'static
where
    S: Send + Sync + 'static,
{
    /// Partial state update proposed by a node
    type Update: Send + 'static;

    /// Execute a single node against a snapshot of the merged state
    async fn run(&self, node: N, snapshot: Arc<S>) -> Result<Self::Update, NodeFailure>;

    /// Substitute update merged in place of a failed node's output
    fn degraded(&self, node: N) -> Self::Update;

    /// Fold a node's update into state
    ///
    /// Called with exclusive access to state; never concurrently with another
    /// merge of the same run.
    fn merge(&self, state: &mut S, node: N, update: Self::Update) -> Result<(), NodeFailure>;
}
