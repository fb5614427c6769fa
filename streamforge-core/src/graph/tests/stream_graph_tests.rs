use crate::graph::stream_graph::{
    ChainingStrategy, OperatorSpec, PartitionStrategy, StreamGraph, TaskKind,
};

fn op(name: &str) -> Option<OperatorSpec> {
    Some(OperatorSpec::new(name, ChainingStrategy::Always))
}

#[test]
fn test_add_node_assigns_sequential_ids() {
    let mut graph = StreamGraph::new();
    let a = graph.add_node("source", 1, TaskKind::Source, op("src"));
    let b = graph.add_node("map", 1, TaskKind::OneInput, op("map"));

    assert_eq!(a, 0);
    assert_eq!(b, 1);
    assert_eq!(graph.node(a).unwrap().operator_name, "source");
    assert_eq!(graph.node(b).unwrap().parallelism, 1);
}

#[test]
fn test_out_and_in_edges_keep_insertion_order() {
    let mut graph = StreamGraph::new();
    let src = graph.add_node("source", 1, TaskKind::Source, op("src"));
    let a = graph.add_node("a", 1, TaskKind::OneInput, op("a"));
    let b = graph.add_node("b", 1, TaskKind::OneInput, op("b"));
    graph.add_edge(src, a, PartitionStrategy::Forward);
    graph.add_edge(src, b, PartitionStrategy::Rebalance);

    let targets: Vec<_> = graph.out_edges(src).map(|e| e.target).collect();
    assert_eq!(targets, vec![a, b]);
    assert_eq!(graph.in_edges(a).count(), 1);
    assert_eq!(graph.out_edges(b).count(), 0);
}

#[test]
fn test_sources_are_nodes_without_in_edges_sorted() {
    let mut graph = StreamGraph::new();
    let s1 = graph.add_node("s1", 1, TaskKind::Source, op("s1"));
    let s2 = graph.add_node("s2", 1, TaskKind::Source, op("s2"));
    let sink = graph.add_node("sink", 1, TaskKind::OneInput, op("sink"));
    graph.add_edge(s2, sink, PartitionStrategy::Forward);
    graph.add_edge(s1, sink, PartitionStrategy::Forward);

    assert_eq!(graph.sources(), vec![s1, s2]);
}

#[test]
fn test_loop_lookup_covers_head_and_tail() {
    let mut graph = StreamGraph::new();
    let head = graph.add_node("head", 2, TaskKind::IterationHead, None);
    let tail = graph.add_node("tail", 2, TaskKind::IterationTail, None);
    let other = graph.add_node("map", 2, TaskKind::OneInput, op("map"));
    let id = graph.add_loop(head, tail, 5_000);

    assert_eq!(graph.loop_for_node(head).unwrap().id, id);
    assert_eq!(graph.loop_for_node(tail).unwrap().timeout_ms, 5_000);
    assert!(graph.loop_for_node(other).is_none());
}

#[test]
fn test_constraint_registration() {
    let mut graph = StreamGraph::new();
    let a = graph.add_node("a", 1, TaskKind::Source, op("a"));
    let b = graph.add_node("b", 1, TaskKind::OneInput, op("b"));
    graph.add_edge(a, b, PartitionStrategy::Forward);
    assert!(!graph.has_constraints());

    graph.add_constraint(a, b, 250, Some("fast path".to_string()));
    assert!(graph.has_constraints());
    assert_eq!(graph.constraints[0].max_latency_ms, 250);
}

#[test]
fn test_defaults() {
    let graph = StreamGraph::new();
    assert!(graph.chaining_enabled);
    assert!(!graph.checkpointing_enabled);
    assert_eq!(graph.qos_report_interval_ms, 10_000);
}
