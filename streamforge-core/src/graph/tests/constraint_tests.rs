use crate::error::CompileError;
use crate::graph::compiler::build_job_graph;
use crate::graph::job_graph::{JobGraph, LatencyConstraint, SequenceElement};
use crate::graph::stream_graph::{
    ChainingStrategy, OperatorSpec, PartitionStrategy, StreamGraph, TaskKind,
};
use crate::qos::config::{QosReporterConfig, ReporterSide};
use crate::types::NodeId;

fn task(graph: &mut StreamGraph, name: &str, kind: TaskKind) -> NodeId {
    graph.add_node(
        name,
        2,
        kind,
        Some(OperatorSpec::new(name, ChainingStrategy::Always)),
    )
}

/// source -> map -> sink, chaining off so each node deploys on its own.
fn pipeline() -> (StreamGraph, [NodeId; 3]) {
    let mut graph = StreamGraph::new();
    graph.chaining_enabled = false;
    let src = task(&mut graph, "source", TaskKind::Source);
    let map = task(&mut graph, "map", TaskKind::OneInput);
    let sink = task(&mut graph, "sink", TaskKind::OneInput);
    graph.add_edge(src, map, PartitionStrategy::Rebalance);
    graph.add_edge(map, sink, PartitionStrategy::Rebalance);
    (graph, [src, map, sink])
}

fn vertex_config<'a>(job_graph: &'a JobGraph, name: &str) -> &'a crate::graph::job_graph::TaskConfig {
    let vertex = job_graph
        .vertices
        .values()
        .find(|v| v.name == name)
        .unwrap_or_else(|| panic!("no vertex named {:?}", name));
    &job_graph.task_configs[&vertex.id]
}

#[test]
fn test_constraints_with_chaining_enabled_are_rejected() {
    let (mut graph, [src, _, sink]) = pipeline();
    graph.chaining_enabled = true;
    graph.add_constraint(src, sink, 100, None);

    let err = build_job_graph(&graph, "conflict").unwrap_err();
    assert!(matches!(err, CompileError::ConfigurationConflict(_)));
}

#[test]
fn test_weaving_enables_statistics_and_intervals() {
    let (mut graph, [src, _, sink]) = pipeline();
    graph.qos_report_interval_ms = 2_500;
    graph.add_constraint(src, sink, 100, None);

    let job_graph = build_job_graph(&graph, "intervals").unwrap();
    assert!(job_graph.custom_statistics_enabled);
    assert_eq!(job_graph.central_report_interval_ms, 2_500);
    assert_eq!(job_graph.forwarder_report_interval_ms, 2_500);
}

#[test]
fn test_unconstrained_graph_leaves_statistics_disabled() {
    let (graph, _) = pipeline();
    let job_graph = build_job_graph(&graph, "plain").unwrap();
    assert!(!job_graph.custom_statistics_enabled);
    assert!(job_graph.constraints.is_empty());
    assert!(job_graph.job_configuration.is_empty());
}

#[test]
fn test_woven_sequence_alternates_with_boundary_gates() {
    let (mut graph, [src, _, sink]) = pipeline();
    graph.add_constraint(src, sink, 100, None);

    let job_graph = build_job_graph(&graph, "gates").unwrap();
    assert_eq!(job_graph.constraints.len(), 1);

    let elements = job_graph.constraints[0].sequence.elements();
    assert_eq!(elements.len(), 5);

    match &elements[0] {
        SequenceElement::Vertex {
            name,
            input_gate,
            output_gate,
            ..
        } => {
            assert_eq!(name, "source");
            assert_eq!(*input_gate, -1);
            assert_eq!(*output_gate, 0);
        }
        other => panic!("expected vertex element, got {:?}", other),
    }
    match &elements[2] {
        SequenceElement::Vertex {
            name,
            input_gate,
            output_gate,
            ..
        } => {
            assert_eq!(name, "map");
            assert_eq!(*input_gate, 0);
            assert_eq!(*output_gate, 0);
        }
        other => panic!("expected vertex element, got {:?}", other),
    }
    match &elements[4] {
        SequenceElement::Vertex {
            name,
            input_gate,
            output_gate,
            ..
        } => {
            assert_eq!(name, "sink");
            assert_eq!(*input_gate, 0);
            assert_eq!(*output_gate, -1);
        }
        other => panic!("expected vertex element, got {:?}", other),
    }
    assert!(matches!(elements[1], SequenceElement::Edge { .. }));
    assert!(matches!(elements[3], SequenceElement::Edge { .. }));
}

#[test]
fn test_reporters_attach_to_both_edge_endpoints() {
    let (mut graph, [src, _, sink]) = pipeline();
    graph.add_constraint(src, sink, 100, None);

    let job_graph = build_job_graph(&graph, "reporters").unwrap();

    let source_reporters = &vertex_config(&job_graph, "source").qos_reporters;
    assert_eq!(source_reporters.len(), 2);
    assert!(matches!(source_reporters[0], QosReporterConfig::Vertex(_)));
    match &source_reporters[1] {
        QosReporterConfig::Edge(edge) => {
            assert_eq!(edge.side, ReporterSide::Source);
            assert_eq!(edge.name, "source -> map");
        }
        other => panic!("expected edge reporter, got {:?}", other),
    }

    // The middle vertex reports its own latency plus both adjacent edges.
    let map_reporters = &vertex_config(&job_graph, "map").qos_reporters;
    assert_eq!(map_reporters.len(), 3);
    let sides: Vec<ReporterSide> = map_reporters
        .iter()
        .filter_map(|r| match r {
            QosReporterConfig::Edge(edge) => Some(edge.side),
            _ => None,
        })
        .collect();
    assert_eq!(sides, vec![ReporterSide::Target, ReporterSide::Source]);

    let sink_reporters = &vertex_config(&job_graph, "sink").qos_reporters;
    assert_eq!(sink_reporters.len(), 2);
}

#[test]
fn test_constraint_name_defaults_to_endpoint_vertices() {
    let (mut graph, [src, _, sink]) = pipeline();
    graph.add_constraint(src, sink, 100, None);

    let job_graph = build_job_graph(&graph, "named").unwrap();
    assert_eq!(job_graph.constraints[0].name, "source -> sink");
    assert_eq!(job_graph.constraints[0].max_latency_ms, 100);
}

#[test]
fn test_declared_constraint_name_is_kept() {
    let (mut graph, [src, _, sink]) = pipeline();
    graph.add_constraint(src, sink, 100, Some("end to end".to_string()));

    let job_graph = build_job_graph(&graph, "declared").unwrap();
    assert_eq!(job_graph.constraints[0].name, "end to end");
}

#[test]
fn test_persisted_blob_round_trips() {
    let (mut graph, [src, _, sink]) = pipeline();
    graph.add_constraint(src, sink, 100, None);

    let job_graph = build_job_graph(&graph, "persisted").unwrap();
    let blob = &job_graph.job_configuration["qos.latency_constraint.0"];
    let restored: LatencyConstraint = bincode::deserialize(blob).unwrap();
    assert_eq!(restored, job_graph.constraints[0]);
}

#[test]
fn test_diamond_constraint_weaves_every_path() {
    let mut graph = StreamGraph::new();
    graph.chaining_enabled = false;
    let src = task(&mut graph, "source", TaskKind::Source);
    let fork = task(&mut graph, "fork", TaskKind::OneInput);
    let upper = task(&mut graph, "upper", TaskKind::OneInput);
    let lower = task(&mut graph, "lower", TaskKind::OneInput);
    let join = task(&mut graph, "join", TaskKind::OneInput);
    graph.add_edge(src, fork, PartitionStrategy::Rebalance);
    graph.add_edge(fork, upper, PartitionStrategy::Rebalance);
    graph.add_edge(fork, lower, PartitionStrategy::Rebalance);
    graph.add_edge(upper, join, PartitionStrategy::Rebalance);
    graph.add_edge(lower, join, PartitionStrategy::Rebalance);
    graph.add_constraint(src, join, 200, None);

    let job_graph = build_job_graph(&graph, "diamond").unwrap();
    assert_eq!(job_graph.constraints.len(), 2);
    assert!(job_graph.job_configuration.contains_key("qos.latency_constraint.0"));
    assert!(job_graph.job_configuration.contains_key("qos.latency_constraint.1"));

    // The lower path leaves fork's second output gate and enters join's
    // second input gate.
    let gates: Vec<(usize, usize)> = job_graph.constraints[1]
        .sequence
        .elements()
        .iter()
        .filter_map(|e| match e {
            SequenceElement::Edge {
                output_gate,
                input_gate,
                ..
            } => Some((*output_gate, *input_gate)),
            _ => None,
        })
        .collect();
    assert_eq!(gates, vec![(0, 0), (1, 0), (0, 1)]);
}
