//! Scheduler Module
//!
//! The scheduler works with pre-validated graphs from the construction phase.
//! All structural decisions have already been made - the scheduler only
//! handles ordering, concurrency and the merge step.
//!
//! # Execution
//!
//! A ready set holds every node whose dependencies have all been merged. All
//! ready nodes are dispatched at once as tasks; whenever one finishes, its
//! update is merged (one merge at a time), the node is marked complete and the
//! ready set is recomputed. The run ends when every terminal node is complete
//! or when it is cancelled.
//!
//! A failed or panicking node is isolated: its degraded update is merged in
//! place of its output and its dependents still run.

use crate::error::NodeFailure;
use crate::executor::NodeRunner;
use crate::types::{CancelReason, NodeKey, RunStatus};
use crate::validated_graph::ValidatedGraph;
use futures::FutureExt;
use std::any::Any;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Scheduler configuration
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfig {
    /// Run-level deadline; `None` runs until completion
    pub timeout: Option<Duration>,
    /// Maximum number of nodes in flight; `None` is unbounded
    pub max_parallel: Option<usize>,
}

impl SchedulerConfig {
    /// With run deadline
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// With parallelism bound
    #[inline]
    #[must_use]
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = Some(max);
        self
    }
}

/// A node-level failure recorded during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedNode<N> {
    /// Node that failed
    pub node: N,
    /// What went wrong
    pub failure: NodeFailure,
}

/// Result of a scheduler run
#[derive(Debug)]
pub struct RunReport<N: NodeKey, S> {
    /// Final merged state
    pub state: S,
    /// Completed or cancelled
    pub status: RunStatus,
    /// Nodes in the order their updates were merged
    pub completed: Vec<N>,
    /// Node-level failures, in the order they were observed
    pub failures: Vec<FailedNode<N>>,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl<N: NodeKey, S> RunReport<N, S> {
    /// Whether `node`'s update was merged
    pub fn is_merged(&self, node: N) -> bool {
        self.completed.contains(&node)
    }

    /// Nodes of `graph` that never had an update merged
    pub fn pending(&self, graph: &ValidatedGraph<N>) -> Vec<N> {
        graph
            .nodes()
            .iter()
            .copied()
            .filter(|&n| !self.is_merged(n))
            .collect()
    }
}

/// Graph scheduler
///
/// Only accepts pre-validated graphs.
#[derive(Debug, Clone)]
pub struct GraphScheduler {
    config: SchedulerConfig,
    cancel: CancellationToken,
}

impl Default for GraphScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl GraphScheduler {
    /// Create a new scheduler
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Observe an external cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels runs of this scheduler
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute every node of `graph` exactly once
    ///
    /// Never fails: node failures are isolated and recorded in the report,
    /// cancellation is reported through [`RunReport::status`].
    pub async fn run<N, S, R>(
        &self,
        graph: &ValidatedGraph<N>,
        initial: S,
        runner: Arc<R>,
    ) -> RunReport<N, S>
    where
        N: NodeKey,
        S: Clone + Send + Sync + 'static,
        R: NodeRunner<N, S>,
    {
        let started = Instant::now();
        let limit = self.config.max_parallel.unwrap_or(usize::MAX).max(1);

        let mut state = Arc::new(initial);
        let mut waiting_on: HashMap<N, usize> = graph
            .nodes()
            .iter()
            .map(|&n| (n, graph.dependencies_of(n).len()))
            .collect();
        let mut ready: BTreeSet<N> = waiting_on
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(&n, _)| n)
            .collect();
        let mut done: HashSet<N> = HashSet::new();
        let mut completed = Vec::with_capacity(graph.node_count());
        let mut failures = Vec::new();
        let mut in_flight: JoinSet<(N, Result<R::Update, NodeFailure>)> = JoinSet::new();

        let timeout = self.config.timeout;
        let deadline = async move {
            match timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        tracing::info!(nodes = graph.node_count(), start = %graph.start(), "run started");

        let status = loop {
            if graph.is_complete(|n| done.contains(&n)) {
                break RunStatus::Completed;
            }
            if self.cancel.is_cancelled() {
                break RunStatus::Cancelled(CancelReason::External);
            }

            while in_flight.len() < limit {
                let Some(node) = ready.pop_first() else {
                    break;
                };
                tracing::debug!(node = %node, "dispatching node");
                let runner = Arc::clone(&runner);
                let snapshot = Arc::clone(&state);
                in_flight.spawn(async move {
                    let outcome = AssertUnwindSafe(runner.run(node, snapshot))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| Err(NodeFailure::panicked(panic_message(&*panic))));
                    (node, outcome)
                });
            }

            if in_flight.is_empty() {
                // Unreachable for a validated graph: every node is reachable
                // from start and every sink is terminal.
                tracing::error!("no runnable nodes left before terminal completion");
                break RunStatus::Completed;
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    break RunStatus::Cancelled(CancelReason::External);
                }
                _ = &mut deadline => {
                    break RunStatus::Cancelled(CancelReason::Timeout);
                }
                joined = in_flight.join_next() => {
                    let (node, outcome) = match joined {
                        Some(Ok(pair)) => pair,
                        Some(Err(err)) => {
                            tracing::error!(error = %err, "node task aborted");
                            continue;
                        }
                        None => continue,
                    };

                    // Serialized merge: the only place state is mutated.
                    let update = match outcome {
                        Ok(update) => update,
                        Err(failure) => {
                            tracing::warn!(node = %node, error = %failure, "node failed; merging degraded output");
                            failures.push(FailedNode { node, failure });
                            runner.degraded(node)
                        }
                    };
                    let target = Arc::make_mut(&mut state);
                    if let Err(failure) = runner.merge(target, node, update) {
                        tracing::warn!(node = %node, error = %failure, "merge rejected; merging degraded output");
                        failures.push(FailedNode { node, failure });
                        if let Err(err) = runner.merge(target, node, runner.degraded(node)) {
                            tracing::error!(node = %node, error = %err, "degraded merge rejected");
                        }
                    }

                    done.insert(node);
                    completed.push(node);
                    tracing::debug!(node = %node, merged = completed.len(), "node merged");

                    for &dependent in graph.dependents_of(node) {
                        if let Some(count) = waiting_on.get_mut(&dependent) {
                            *count -= 1;
                            if *count == 0 {
                                ready.insert(dependent);
                            }
                        }
                    }
                }
            }
        };

        // Results of nodes still in flight are discarded, never merged.
        if !in_flight.is_empty() {
            tracing::info!(abandoned = in_flight.len(), "abandoning in-flight nodes");
        }
        in_flight.shutdown().await;

        let elapsed = started.elapsed();
        match status {
            RunStatus::Completed => {
                tracing::info!(merged = completed.len(), failed = failures.len(), elapsed_ms = elapsed.as_millis() as u64, "run completed");
            }
            RunStatus::Cancelled(reason) => {
                tracing::warn!(merged = completed.len(), reason = %reason, "run stopped early");
            }
        }

        let state = Arc::try_unwrap(state).unwrap_or_else(|shared| (*shared).clone());
        RunReport {
            state,
            status,
            completed,
            failures,
            elapsed,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "node panicked".to_string()
    }
}
