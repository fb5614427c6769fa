use crate::graph::sequence::{SequenceFinder, StreamSequenceElement, constraint_name};
use crate::graph::stream_graph::{
    ChainingStrategy, OperatorSpec, PartitionStrategy, StreamGraph, TaskKind,
};
use crate::types::NodeId;

fn op(name: &str) -> Option<OperatorSpec> {
    Some(OperatorSpec::new(name, ChainingStrategy::Always))
}

/// source -> fork -> {upper, lower} -> join -> sink
fn diamond() -> (StreamGraph, [NodeId; 6]) {
    let mut graph = StreamGraph::new();
    let source = graph.add_node("source", 1, TaskKind::Source, op("src"));
    let fork = graph.add_node("fork", 1, TaskKind::OneInput, op("fork"));
    let upper = graph.add_node("upper", 1, TaskKind::OneInput, op("upper"));
    let lower = graph.add_node("lower", 1, TaskKind::OneInput, op("lower"));
    let join = graph.add_node("join", 1, TaskKind::OneInput, op("join"));
    let sink = graph.add_node("sink", 1, TaskKind::OneInput, op("sink"));
    graph.add_edge(source, fork, PartitionStrategy::Rebalance);
    graph.add_edge(fork, upper, PartitionStrategy::Rebalance);
    graph.add_edge(fork, lower, PartitionStrategy::Rebalance);
    graph.add_edge(upper, join, PartitionStrategy::Rebalance);
    graph.add_edge(lower, join, PartitionStrategy::Rebalance);
    graph.add_edge(join, sink, PartitionStrategy::Rebalance);
    (graph, [source, fork, upper, lower, join, sink])
}

fn vertices(elements: &[StreamSequenceElement]) -> Vec<NodeId> {
    elements
        .iter()
        .filter_map(|e| match e {
            StreamSequenceElement::Vertex { id } => Some(*id),
            _ => None,
        })
        .collect()
}

#[test]
fn test_linear_path_yields_one_sequence() {
    let mut graph = StreamGraph::new();
    let a = graph.add_node("a", 1, TaskKind::Source, op("a"));
    let b = graph.add_node("b", 1, TaskKind::OneInput, op("b"));
    let c = graph.add_node("c", 1, TaskKind::OneInput, op("c"));
    graph.add_edge(a, b, PartitionStrategy::Forward);
    graph.add_edge(b, c, PartitionStrategy::Forward);

    let sequences = SequenceFinder::new(&graph).find_all_sequences_between(a, c);
    assert_eq!(sequences.len(), 1);
    assert_eq!(vertices(&sequences[0].elements), vec![a, b, c]);
    // Vertices and edges alternate, both ends are vertices.
    assert_eq!(sequences[0].elements.len(), 5);
    assert!(sequences[0].elements[0].is_vertex());
    assert!(!sequences[0].elements[1].is_vertex());
    assert!(sequences[0].elements[4].is_vertex());
}

#[test]
fn test_diamond_yields_two_sequences() {
    let (graph, [source, fork, upper, lower, join, sink]) = diamond();

    let sequences = SequenceFinder::new(&graph).find_all_sequences_between(source, sink);
    assert_eq!(sequences.len(), 2);
    assert_eq!(
        vertices(&sequences[0].elements),
        vec![source, fork, upper, join, sink]
    );
    assert_eq!(
        vertices(&sequences[1].elements),
        vec![source, fork, lower, join, sink]
    );
}

#[test]
fn test_edge_elements_carry_gate_indices() {
    let (graph, [source, fork, upper, lower, join, _]) = diamond();

    let sequences = SequenceFinder::new(&graph).find_all_sequences_between(source, join);
    assert_eq!(sequences.len(), 2);

    // Upper branch: fork's first out edge into join's first in edge.
    let upper_edge = sequences[0]
        .elements
        .iter()
        .find(|e| matches!(e, StreamSequenceElement::Edge { source, .. } if *source == fork))
        .unwrap();
    assert_eq!(
        *upper_edge,
        StreamSequenceElement::Edge {
            source: fork,
            target: upper,
            output_index: 0,
            input_index: 0,
        }
    );

    // Lower branch lands on join's second in edge.
    let join_edge = sequences[1]
        .elements
        .iter()
        .find(|e| matches!(e, StreamSequenceElement::Edge { target, .. } if *target == join))
        .unwrap();
    assert_eq!(
        *join_edge,
        StreamSequenceElement::Edge {
            source: lower,
            target: join,
            output_index: 0,
            input_index: 1,
        }
    );
}

#[test]
fn test_begin_equals_end_yields_single_vertex_sequence() {
    let (graph, [source, ..]) = diamond();
    let sequences = SequenceFinder::new(&graph).find_all_sequences_between(source, source);
    assert_eq!(sequences.len(), 1);
    assert_eq!(sequences[0].elements, vec![StreamSequenceElement::Vertex { id: source }]);
    assert_eq!(sequences[0].first_vertex(), Some(source));
    assert_eq!(sequences[0].last_vertex(), Some(source));
}

#[test]
fn test_unreachable_end_yields_no_sequences() {
    let (graph, [_, _, _, _, _, sink]) = diamond();
    let sequences = SequenceFinder::new(&graph).find_all_sequences_between(sink, 0);
    assert!(sequences.is_empty());
}

#[test]
fn test_resolve_constraints_expands_declarations() {
    let (mut graph, [source, _, _, _, _, sink]) = diamond();
    graph.add_constraint(source, sink, 100, None);

    let resolved = SequenceFinder::new(&graph).resolve_constraints();
    assert_eq!(resolved.len(), 2);
    assert!(resolved.iter().all(|c| c.max_latency_ms == 100));
}

#[test]
fn test_constraint_name_falls_back_to_endpoints() {
    assert_eq!(constraint_name(Some("declared"), "a", "b"), "declared");
    assert_eq!(constraint_name(None, "a", "b"), "a -> b");
}
