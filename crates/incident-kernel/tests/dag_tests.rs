use incident_kernel::prelude::*;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Random DAG over `0..n`: every node > 0 depends on node 0 plus an
/// arbitrary subset of lower-numbered nodes.
fn arb_dag() -> impl Strategy<Value = (u32, Vec<(u32, u32)>)> {
    (2u32..12).prop_flat_map(|n| {
        let pairs: Vec<(u32, u32)> = (1..n)
            .flat_map(|to| (1..to).map(move |from| (from, to)))
            .collect();
        let len = pairs.len();
        (Just(n), Just(pairs), proptest::collection::vec(any::<bool>(), len))
    })
    .prop_map(|(n, pairs, keep)| {
        let mut edges: Vec<(u32, u32)> = (1..n).map(|to| (0, to)).collect();
        edges.extend(
            pairs
                .into_iter()
                .zip(keep)
                .filter(|(_, keep)| *keep)
                .map(|(pair, _)| pair),
        );
        (n, edges)
    })
}

fn build(n: u32, edges: &[(u32, u32)]) -> ValidatedGraph<u32> {
    let mut builder = GraphBuilder::new(0u32);
    for node in 0..n {
        builder.add_node(node);
    }
    for &(from, to) in edges {
        builder.add_edge(from, to);
    }
    builder.validate().unwrap()
}

struct OrderRecorder {
    graph: ValidatedGraph<u32>,
    violations: Mutex<Vec<(u32, u32)>>,
}

#[async_trait::async_trait]
impl NodeRunner<u32, Vec<u32>> for OrderRecorder {
    type Update = u32;

    async fn run(&self, node: u32, snapshot: Arc<Vec<u32>>) -> Result<u32, NodeFailure> {
        for &dep in self.graph.dependencies_of(node) {
            if !snapshot.contains(&dep) {
                self.violations.lock().unwrap().push((dep, node));
            }
        }
        tokio::task::yield_now().await;
        Ok(node)
    }

    fn degraded(&self, node: u32) -> u32 {
        node
    }

    fn merge(&self, state: &mut Vec<u32>, _node: u32, update: u32) -> Result<(), NodeFailure> {
        state.push(update);
        Ok(())
    }
}

proptest! {
    #[test]
    fn random_dags_validate_with_consistent_levels((n, edges) in arb_dag()) {
        let graph = build(n, &edges);

        prop_assert_eq!(graph.node_count(), n as usize);
        prop_assert_eq!(graph.edge_count(), edges.len());
        prop_assert_eq!(graph.levels()[0].clone(), vec![0]);

        let level_of = |node: u32| {
            graph.levels().iter().position(|level| level.contains(&node)).unwrap()
        };
        for &(from, to) in &edges {
            prop_assert!(level_of(from) < level_of(to));
        }
        for &terminal in graph.terminals() {
            prop_assert!(graph.dependents_of(terminal).is_empty());
        }
    }

    #[test]
    fn adding_a_back_edge_is_rejected((n, edges) in arb_dag()) {
        let mut builder = GraphBuilder::new(0u32);
        for node in 0..n {
            builder.add_node(node);
        }
        for &(from, to) in &edges {
            builder.add_edge(from, to);
        }
        // n - 1 always depends on 0; closing the loop makes 0 a dependent too.
        builder.add_edge(n - 1, 0);
        prop_assert!(builder.validate().is_err());
    }

    #[test]
    fn scheduler_merges_each_node_once_in_dependency_order((n, edges) in arb_dag()) {
        let graph = build(n, &edges);
        let runner = Arc::new(OrderRecorder {
            graph: graph.clone(),
            violations: Mutex::new(Vec::new()),
        });

        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let report = rt.block_on(GraphScheduler::default().run(&graph, Vec::new(), Arc::clone(&runner)));

        prop_assert_eq!(report.status, RunStatus::Completed);
        prop_assert!(runner.violations.lock().unwrap().is_empty());
        let unique: HashSet<u32> = report.state.iter().copied().collect();
        prop_assert_eq!(unique.len(), report.state.len());
        prop_assert_eq!(report.state.len(), n as usize);
    }
}
