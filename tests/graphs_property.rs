mod common;

use common::*;
use lanegraph::graph::Graph;
use lanegraph::types::NodeId;
use proptest::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

/// Edge set over `n` nodes: only forward pairs (i < j), so any subset is a DAG.
fn dag_strategy() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (3usize..10).prop_flat_map(|n| {
        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .collect();
        let len = pairs.len();
        (
            Just(n),
            proptest::sample::subsequence(pairs, 0..=len),
        )
    })
}

fn build(n: usize, edges: &[(usize, usize)]) -> (Graph, Vec<NodeId>) {
    let (_hub, ctx) = harness();
    let mut graph = Graph::new(ctx);
    let ids: Vec<NodeId> = (0..n)
        .map(|_| graph.add_empty_node(&[]).expect("add node"))
        .collect();
    for &(i, j) in edges {
        graph.add_edge(ids[i], ids[j]).expect("add forward edge");
    }
    (graph, ids)
}

/// Longest path from any root, recomputed from scratch.
fn longest_paths(n: usize, edges: &[(usize, usize)]) -> Vec<u32> {
    let mut levels = vec![0u32; n];
    // Forward pairs are already topologically ordered by index.
    for _ in 0..n {
        for &(i, j) in edges {
            levels[j] = levels[j].max(levels[i] + 1);
        }
    }
    levels
}

proptest! {
    /// Incremental relaxation on add-only sequences matches a full
    /// longest-path recomputation.
    #[test]
    fn prop_levels_equal_longest_paths((n, edges) in dag_strategy()) {
        let (graph, ids) = build(n, &edges);
        let expected = longest_paths(n, &edges);
        for (i, id) in ids.iter().enumerate() {
            prop_assert_eq!(graph.node(*id).unwrap().level(), expected[i]);
        }
    }

    /// `level_order` is a valid topological order: every edge points forward.
    #[test]
    fn prop_level_order_is_topological((n, edges) in dag_strategy()) {
        let (graph, _ids) = build(n, &edges);
        let order = graph.level_order();
        let position: FxHashMap<NodeId, usize> =
            order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        for (from, to) in graph.edges() {
            prop_assert!(position[&from] < position[&to]);
        }
    }

    /// The run-list partition covers every vertex exactly once, and every
    /// dependency is either in the same list or on the node's wait list.
    #[test]
    fn prop_run_list_partitions_exactly_once((n, edges) in dag_strategy()) {
        let (mut graph, _ids) = build(n, &edges);
        let run = graph.run_list().unwrap();

        let mut seen = FxHashSet::default();
        for list in &run.lists {
            prop_assert!(!list.is_empty());
            for id in list {
                prop_assert!(seen.insert(*id), "node {id} appears twice");
            }
        }
        prop_assert_eq!(seen.len(), graph.node_count());

        let list_of: FxHashMap<NodeId, usize> = run
            .lists
            .iter()
            .enumerate()
            .flat_map(|(i, list)| list.iter().map(move |id| (*id, i)))
            .collect();
        for &id in graph.node_ids() {
            let empty = Vec::new();
            let waits = run.waits.get(&id).unwrap_or(&empty);
            for dep in graph.node(id).unwrap().dependencies() {
                let same_list = list_of[dep] == list_of[&id];
                prop_assert!(
                    same_list != waits.contains(dep),
                    "dependency {dep} of {id} must be queue-ordered or waited on"
                );
            }
        }
    }

    /// Removing a subset of edges and re-adding them converges back to the
    /// same level assignment as a graph built by additions alone.
    #[test]
    fn prop_remove_readd_converges(
        (n, edges) in dag_strategy(),
        selector in proptest::collection::vec(any::<bool>(), 0..64),
    ) {
        let (mut graph, ids) = build(n, &edges);
        let removed: Vec<(usize, usize)> = edges
            .iter()
            .enumerate()
            .filter(|(k, _)| selector.get(*k).copied().unwrap_or(false))
            .map(|(_, e)| *e)
            .collect();

        for &(i, j) in &removed {
            prop_assert!(graph.remove_edge(ids[i], ids[j]).unwrap());
        }
        for &(i, j) in removed.iter().rev() {
            graph.add_edge(ids[i], ids[j]).unwrap();
        }

        let expected = longest_paths(n, &edges);
        for (i, id) in ids.iter().enumerate() {
            prop_assert_eq!(
                graph.node(*id).unwrap().level(),
                expected[i],
                "node {} diverged after remove/re-add",
                i
            );
        }
    }
}
