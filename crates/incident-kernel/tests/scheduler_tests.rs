use incident_kernel::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
struct Trace {
    merged: Vec<u32>,
    degraded: Vec<u32>,
}

#[derive(Default)]
struct Recorder {
    dependencies: HashMap<u32, Vec<u32>>,
    fail: HashSet<u32>,
    panic: HashSet<u32>,
    delay: HashMap<u32, Duration>,
    barrier: Option<(HashSet<u32>, Arc<Barrier>)>,
    cancel_from: Option<(u32, CancellationToken)>,
    invocations: Mutex<HashMap<u32, usize>>,
    violations: Mutex<Vec<String>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl Recorder {
    fn for_graph(graph: &ValidatedGraph<u32>) -> Self {
        let dependencies = graph
            .nodes()
            .iter()
            .map(|&n| (n, graph.dependencies_of(n).to_vec()))
            .collect();
        Self {
            dependencies,
            ..Self::default()
        }
    }

    fn invocations(&self, node: u32) -> usize {
        self.invocations.lock().unwrap().get(&node).copied().unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl NodeRunner<u32, Trace> for Recorder {
    type Update = Option<u32>;

    async fn run(&self, node: u32, snapshot: Arc<Trace>) -> Result<Option<u32>, NodeFailure> {
        *self.invocations.lock().unwrap().entry(node).or_default() += 1;
        for dep in &self.dependencies[&node] {
            if !snapshot.merged.contains(dep) {
                self.violations
                    .lock()
                    .unwrap()
                    .push(format!("{node} ran before {dep} was merged"));
            }
        }

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some((members, barrier)) = &self.barrier {
            if members.contains(&node) {
                barrier.wait().await;
            }
        }
        if let Some((trigger, token)) = &self.cancel_from {
            if *trigger == node {
                token.cancel();
            }
        }
        if let Some(delay) = self.delay.get(&node) {
            tokio::time::sleep(*delay).await;
        }

        self.running.fetch_sub(1, Ordering::SeqCst);

        if self.panic.contains(&node) {
            panic!("node {node} exploded");
        }
        if self.fail.contains(&node) {
            return Err(NodeFailure::failed(format!("node {node} failed")));
        }
        Ok(Some(node))
    }

    fn degraded(&self, _node: u32) -> Option<u32> {
        None
    }

    fn merge(&self, state: &mut Trace, node: u32, update: Option<u32>) -> Result<(), NodeFailure> {
        state.merged.push(node);
        if update.is_none() {
            state.degraded.push(node);
        }
        Ok(())
    }
}

/// 0 -> 1 -> {2, 3, 4, 5}; 5 -> 6. Terminals {2, 3, 4, 6}.
fn incident_shaped_graph() -> ValidatedGraph<u32> {
    let mut builder = GraphBuilder::new(0u32);
    builder.fan_out(0, &[1]);
    builder.fan_out(1, &[2, 3, 4, 5]);
    builder.depends_on(6, &[5]);
    builder.with_terminals(&[2, 3, 4, 6]);
    builder.validate().unwrap()
}

#[tokio::test]
async fn runs_every_node_once_after_its_dependencies() {
    let graph = incident_shaped_graph();
    let runner = Arc::new(Recorder::for_graph(&graph));

    let report = GraphScheduler::default()
        .run(&graph, Trace::default(), Arc::clone(&runner))
        .await;

    assert_eq!(report.status, RunStatus::Completed);
    assert!(report.failures.is_empty());
    assert_eq!(report.completed.len(), 7);
    for node in 0..7 {
        assert_eq!(runner.invocations(node), 1, "node {node}");
    }
    assert!(runner.violations.lock().unwrap().is_empty());
    assert_eq!(report.state.merged[..2], [0, 1]);
    let notify_at = report.completed.iter().position(|&n| n == 6).unwrap();
    let risk_at = report.completed.iter().position(|&n| n == 5).unwrap();
    assert!(risk_at < notify_at);
}

#[tokio::test]
async fn fan_out_siblings_run_concurrently() {
    let graph = incident_shaped_graph();
    let mut recorder = Recorder::for_graph(&graph);
    recorder.barrier = Some((HashSet::from([2, 3, 4, 5]), Arc::new(Barrier::new(4))));
    let runner = Arc::new(recorder);

    // Serial execution would deadlock on the barrier.
    let report = tokio::time::timeout(
        Duration::from_secs(5),
        GraphScheduler::default().run(&graph, Trace::default(), Arc::clone(&runner)),
    )
    .await
    .expect("siblings were not dispatched concurrently");

    assert_eq!(report.status, RunStatus::Completed);
    assert!(runner.peak.load(Ordering::SeqCst) >= 4);
}

#[tokio::test]
async fn failed_node_is_isolated_and_dependents_still_run() {
    let graph = incident_shaped_graph();
    let mut recorder = Recorder::for_graph(&graph);
    recorder.fail.insert(5);
    let runner = Arc::new(recorder);

    let report = GraphScheduler::default()
        .run(&graph, Trace::default(), Arc::clone(&runner))
        .await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].node, 5);
    assert_eq!(report.failures[0].failure.kind, FailureKind::Failed);
    assert_eq!(report.state.degraded, vec![5]);
    assert_eq!(runner.invocations(6), 1);
    for sibling in [2, 3, 4] {
        assert!(report.is_merged(sibling));
    }
}

#[tokio::test]
async fn panicking_node_is_recorded_not_propagated() {
    let graph = incident_shaped_graph();
    let mut recorder = Recorder::for_graph(&graph);
    recorder.panic.insert(3);
    let runner = Arc::new(recorder);

    let report = GraphScheduler::default()
        .run(&graph, Trace::default(), Arc::clone(&runner))
        .await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].failure.kind, FailureKind::Panicked);
    assert!(report.failures[0].failure.message.contains("exploded"));
    assert_eq!(report.completed.len(), 7);
}

#[tokio::test(start_paused = true)]
async fn timeout_stops_dispatch_and_discards_late_results() {
    let graph = incident_shaped_graph();
    let mut recorder = Recorder::for_graph(&graph);
    recorder.delay.insert(5, Duration::from_secs(30));
    let runner = Arc::new(recorder);

    let scheduler = GraphScheduler::new(SchedulerConfig::default().with_timeout(Duration::from_secs(1)));
    let report = scheduler.run(&graph, Trace::default(), Arc::clone(&runner)).await;

    assert_eq!(report.status, RunStatus::Cancelled(CancelReason::Timeout));
    assert!(report.status.is_partial());
    assert!(!report.is_merged(5));
    assert!(!report.is_merged(6));
    assert_eq!(runner.invocations(6), 0);
    assert_eq!(report.pending(&graph), vec![5, 6]);
}

#[tokio::test]
async fn cancelled_before_start_merges_nothing() {
    let graph = incident_shaped_graph();
    let runner = Arc::new(Recorder::for_graph(&graph));
    let token = CancellationToken::new();
    token.cancel();

    let report = GraphScheduler::default()
        .with_cancellation(token)
        .run(&graph, Trace::default(), Arc::clone(&runner))
        .await;

    assert_eq!(report.status, RunStatus::Cancelled(CancelReason::External));
    assert!(report.completed.is_empty());
    assert!(report.state.merged.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_mid_run_does_not_merge_in_flight_results() {
    let graph = incident_shaped_graph();
    let token = CancellationToken::new();
    let mut recorder = Recorder::for_graph(&graph);
    recorder.cancel_from = Some((4, token.clone()));
    recorder.delay.insert(4, Duration::from_secs(1));
    let runner = Arc::new(recorder);

    let report = GraphScheduler::default()
        .with_cancellation(token)
        .run(&graph, Trace::default(), Arc::clone(&runner))
        .await;

    assert_eq!(report.status, RunStatus::Cancelled(CancelReason::External));
    assert!(!report.is_merged(4));
    assert_eq!(runner.invocations(6), 0);
    assert_eq!(report.state.merged.len(), report.completed.len());
}

#[tokio::test]
async fn max_parallel_bounds_in_flight_nodes() {
    let graph = incident_shaped_graph();
    let mut recorder = Recorder::for_graph(&graph);
    for node in [2, 3, 4, 5] {
        recorder.delay.insert(node, Duration::from_millis(5));
    }
    let runner = Arc::new(recorder);

    let scheduler = GraphScheduler::new(SchedulerConfig::default().with_max_parallel(1));
    let report = scheduler.run(&graph, Trace::default(), Arc::clone(&runner)).await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(runner.peak.load(Ordering::SeqCst), 1);
    assert_eq!(report.completed.len(), 7);
}
