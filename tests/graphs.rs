mod common;

use common::*;
use lanegraph::error::GraphError;
use lanegraph::graph::Graph;
use lanegraph::types::NodeKind;

#[test]
fn add_edge_updates_degrees_and_levels() {
    let (_hub, ctx) = harness();
    let mut graph = Graph::new(ctx);
    let a = graph.add_empty_node(&[]).unwrap();
    let b = graph.add_empty_node(&[]).unwrap();
    let c = graph.add_empty_node(&[]).unwrap();
    graph.add_edge(a, b).unwrap();
    graph.add_edge(b, c).unwrap();

    let node_a = graph.node(a).unwrap();
    assert_eq!(node_a.level(), 0);
    assert_eq!(node_a.out_degree(), 1);
    assert_eq!(node_a.in_degree(), 0);
    assert_eq!(graph.node(b).unwrap().level(), 1);
    assert_eq!(graph.node(c).unwrap().level(), 2);
    assert_eq!(graph.node(c).unwrap().in_degree(), 1);
}

#[test]
fn add_edge_propagates_level_bump_to_descendants() {
    let (_hub, ctx) = harness();
    let mut graph = Graph::new(ctx);
    let a = graph.add_empty_node(&[]).unwrap();
    let b = graph.add_empty_node(&[]).unwrap();
    let c = graph.add_empty_node(&[]).unwrap();
    let d = graph.add_empty_node(&[]).unwrap();
    // Build the tail first, then raise its root.
    graph.add_edge(b, c).unwrap();
    graph.add_edge(c, d).unwrap();
    assert_eq!(graph.node(d).unwrap().level(), 2);
    graph.add_edge(a, b).unwrap();
    assert_eq!(graph.node(b).unwrap().level(), 1);
    assert_eq!(graph.node(c).unwrap().level(), 2);
    assert_eq!(graph.node(d).unwrap().level(), 3);
}

#[test]
fn duplicate_edge_is_rejected() {
    let (_hub, ctx) = harness();
    let mut graph = Graph::new(ctx);
    let a = graph.add_empty_node(&[]).unwrap();
    let b = graph.add_empty_node(&[]).unwrap();
    graph.add_edge(a, b).unwrap();
    let err = graph.add_edge(a, b).unwrap_err();
    assert!(matches!(err, GraphError::InvalidArgument { .. }));
    assert_eq!(graph.node(a).unwrap().out_degree(), 1);
    assert_eq!(graph.node(b).unwrap().in_degree(), 1);
}

#[test]
fn cycle_forming_edge_is_rejected() {
    let (_hub, ctx) = harness();
    let mut graph = Graph::new(ctx);
    let a = graph.add_empty_node(&[]).unwrap();
    let b = graph.add_empty_node(&[]).unwrap();
    let c = graph.add_empty_node(&[]).unwrap();
    graph.add_edge(a, b).unwrap();
    graph.add_edge(b, c).unwrap();
    assert!(matches!(
        graph.add_edge(c, a),
        Err(GraphError::InvalidArgument { .. })
    ));
    assert!(matches!(
        graph.add_edge(a, a),
        Err(GraphError::InvalidArgument { .. })
    ));
}

#[test]
fn remove_missing_edge_is_a_noop() {
    let (_hub, ctx) = harness();
    let mut graph = Graph::new(ctx);
    let a = graph.add_empty_node(&[]).unwrap();
    let b = graph.add_empty_node(&[]).unwrap();
    let c = graph.add_empty_node(&[]).unwrap();
    graph.add_edge(a, b).unwrap();
    graph.add_edge(b, c).unwrap();

    assert!(!graph.remove_edge(a, c).unwrap());
    assert_eq!(graph.node(a).unwrap().out_degree(), 1);
    assert_eq!(graph.node(c).unwrap().in_degree(), 1);
    assert_eq!(graph.node(c).unwrap().level(), 2);
}

#[test]
fn remove_edge_recomputes_child_level_from_remaining_parents() {
    let (_hub, ctx) = harness();
    let mut graph = Graph::new(ctx);
    let a = graph.add_empty_node(&[]).unwrap();
    let b = graph.add_empty_node(&[]).unwrap();
    let c = graph.add_empty_node(&[]).unwrap();
    let d = graph.add_empty_node(&[]).unwrap();
    graph.add_edge(a, b).unwrap();
    graph.add_edge(b, c).unwrap();
    graph.add_edge(c, d).unwrap();
    graph.add_edge(a, d).unwrap();
    assert_eq!(graph.node(d).unwrap().level(), 3);

    assert!(graph.remove_edge(c, d).unwrap());
    assert_eq!(graph.node(d).unwrap().level(), 1);
    assert_eq!(graph.node(d).unwrap().in_degree(), 1);

    assert!(graph.remove_edge(a, d).unwrap());
    assert_eq!(graph.node(d).unwrap().level(), 0);
    assert_eq!(graph.node(d).unwrap().in_degree(), 0);
}

#[test]
fn remove_node_severs_all_touching_edges() {
    let (_hub, ctx) = harness();
    let mut graph = Graph::new(ctx);
    let a = graph.add_empty_node(&[]).unwrap();
    let b = graph.add_empty_node(&[a]).unwrap();
    let c = graph.add_empty_node(&[b]).unwrap();

    graph.remove_node(b).unwrap();
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.node(a).unwrap().out_degree(), 0);
    assert_eq!(graph.node(c).unwrap().in_degree(), 0);
    assert_eq!(graph.node(c).unwrap().level(), 0);
    assert!(graph.node(b).is_none());
    assert!(matches!(
        graph.add_edge(a, b),
        Err(GraphError::InvalidHandle { .. })
    ));
}

#[test]
fn roots_and_leaves_scan_by_degree() {
    let (hub, ctx) = harness();
    let (graph, [a, _b, _c, d]) = diamond(&hub, &ctx);
    assert_eq!(graph.root_nodes(), vec![a]);
    assert_eq!(graph.leaf_nodes(), vec![d]);
    assert_eq!(graph.leaf_node_count(), 1);
    assert_eq!(graph.edges().len(), 4);
}

#[test]
fn level_order_is_topological_and_insertion_stable() {
    let (hub, ctx) = harness();
    let (graph, [a, b, c, d]) = diamond(&hub, &ctx);
    let order = graph.level_order();
    assert_eq!(order, vec![a, b, c, d]);

    let position = |id| order.iter().position(|n| *n == id).unwrap();
    for (from, to) in graph.edges() {
        assert!(position(from) < position(to), "edge {from} -> {to} violated");
    }
}

#[test]
fn run_list_partitions_every_node_exactly_once() {
    let (hub, ctx) = harness();
    let (mut graph, [a, b, c, d]) = diamond(&hub, &ctx);
    let run = graph.run_list().unwrap();

    assert_eq!(run.lists.len(), 2);
    assert_eq!(run.lists[0], vec![a, b, d]);
    assert_eq!(run.lists[1], vec![c]);

    let mut all: Vec<_> = run.lists.iter().flatten().copied().collect();
    all.sort();
    let mut expected = vec![a, b, c, d];
    expected.sort();
    assert_eq!(all, expected);

    // Cross-list dependencies only: D waits on C, C waits on A.
    assert_eq!(run.waits[&d], vec![c]);
    assert_eq!(run.waits[&c], vec![a]);
    assert!(!run.waits.contains_key(&b));
}

#[test]
fn clone_is_isomorphic_and_independent() {
    let (hub, ctx) = harness();
    let (mut graph, [a, _b, _c, _d]) = diamond(&hub, &ctx);
    let (clone, map) = graph.clone_graph();

    assert_eq!(clone.node_count(), graph.node_count());
    assert_eq!(clone.original_graph(), Some(graph.id()));
    for (from, to) in graph.edges() {
        let pair = (map[&from], map[&to]);
        assert!(clone.edges().contains(&pair), "missing cloned edge");
    }
    for &id in graph.node_ids() {
        let original = graph.node(id).unwrap();
        let cloned = clone.node(map[&id]).unwrap();
        assert_eq!(original.kind(), cloned.kind());
        assert_eq!(original.level(), cloned.level());
        assert_eq!(original.in_degree(), cloned.in_degree());
        assert_eq!(original.out_degree(), cloned.out_degree());
    }

    // Mutating the source never changes the clone.
    let extra = graph.add_empty_node(&[a]).unwrap();
    graph.add_edge(extra, a).unwrap_err(); // cycle, rejected
    assert_eq!(clone.node_count(), 4);
}

#[test]
fn dependency_handles_are_validated() {
    let (_hub, ctx) = harness();
    let mut graph = Graph::new(ctx.clone());
    let mut other = Graph::new(ctx);
    let foreign = other.add_empty_node(&[]).unwrap();

    let err = graph.add_empty_node(&[foreign]).unwrap_err();
    assert!(matches!(err, GraphError::InvalidHandle { kind: "node" }));
    assert_eq!(graph.node_count(), 0);
}

#[test]
fn destroying_a_graph_with_child_graphs_releases_every_node_once() {
    let (hub, ctx) = harness();
    let registry = ctx.registry().clone();
    let base_nodes = registry.live_nodes();
    let base_graphs = registry.live_graphs();

    {
        let mut inner = Graph::new(ctx.clone());
        let x = inner.add_empty_node(&[]).unwrap();
        inner
            .add_memset_node(fill_params(&hub, 16), &[x])
            .unwrap();

        let mut outer = Graph::new(ctx.clone());
        let p = outer.add_empty_node(&[]).unwrap();
        let child = outer.add_child_graph_node(&inner, &[p]).unwrap();
        assert_eq!(outer.node(child).unwrap().kind(), NodeKind::ChildGraph);

        // inner (2 nodes) + outer (2 nodes) + embedded clone (2 nodes)
        assert_eq!(registry.live_nodes(), base_nodes + 6);
        assert_eq!(registry.live_graphs(), base_graphs + 3);
    }

    assert_eq!(registry.live_nodes(), base_nodes);
    assert_eq!(registry.live_graphs(), base_graphs);
}
