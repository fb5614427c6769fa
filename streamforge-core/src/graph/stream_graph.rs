//! Logical dataflow graph, as handed over by the user-facing API layer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{LoopId, NodeId};

/// How eagerly an operator participates in chaining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainingStrategy {
    /// May start a chain but never joins an upstream one.
    Head,
    /// Chains with upstream and downstream whenever eligible.
    Always,
    /// Never chains.
    Never,
}

/// How data is partitioned between upstream and downstream operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionStrategy {
    /// One-to-one, pass-through to the same subtask index.
    Forward,
    /// Round-robin redistribution.
    Rebalance,
    /// Hash-partition by key.
    Hash,
    /// Send to all downstream instances.
    Broadcast,
    /// Send everything to subtask 0.
    Global,
}

impl PartitionStrategy {
    /// Forwarding strategies keep a one-to-one channel layout.
    pub fn is_forward(&self) -> bool {
        matches!(self, PartitionStrategy::Forward)
    }
}

/// Which task implementation a node deploys as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    Source,
    OneInput,
    IterationHead,
    IterationTail,
}

impl TaskKind {
    pub fn is_iterative(&self) -> bool {
        matches!(self, TaskKind::IterationHead | TaskKind::IterationTail)
    }
}

/// The user function attached to a node. Iteration heads and tails carry no
/// operator of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorSpec {
    /// Registry id of the user function to instantiate at runtime.
    pub udf_id: String,
    pub chaining: ChainingStrategy,
}

impl OperatorSpec {
    pub fn new(udf_id: impl Into<String>, chaining: ChainingStrategy) -> Self {
        Self {
            udf_id: udf_id.into(),
            chaining,
        }
    }
}

/// A node in the logical graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamNode {
    pub id: NodeId,
    pub operator_name: String,
    pub parallelism: u32,
    pub operator: Option<OperatorSpec>,
    pub kind: TaskKind,
    /// Output flush timeout; -1 means flush on full buffers only.
    pub buffer_timeout_ms: i64,
    /// Serializer descriptor for the input type, if any.
    pub input_type: Option<String>,
    /// Serializer descriptor for the output type, if any.
    pub output_type: Option<String>,
    /// Input split source for source vertices reading splittable input.
    pub input_format: Option<String>,
}

/// A directed edge in the logical graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub partitioner: PartitionStrategy,
    /// Named outputs this edge selects from the source; empty selects all.
    pub selected_names: Vec<String>,
}

/// A feedback loop, represented as paired head/tail node markers. The
/// feedback channel itself is local to the deployed head/tail pair and does
/// not appear as a graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamLoop {
    pub id: LoopId,
    pub head: NodeId,
    pub tail: NodeId,
    pub timeout_ms: u64,
}

/// A declared latency bound between two nodes, resolved to concrete
/// sequences during compilation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyConstraintSpec {
    pub begin: NodeId,
    pub end: NodeId,
    pub max_latency_ms: u64,
    pub name: Option<String>,
}

/// The logical DAG representing the stream processing topology, plus the
/// job-level flags the compiler reads.
#[derive(Debug)]
pub struct StreamGraph {
    pub nodes: HashMap<NodeId, StreamNode>,
    pub edges: Vec<StreamEdge>,
    pub loops: Vec<StreamLoop>,
    pub constraints: Vec<LatencyConstraintSpec>,
    pub chaining_enabled: bool,
    pub checkpointing_enabled: bool,
    pub checkpointing_interval_ms: u64,
    /// Interval at which deployed nodes ship QoS reports, and at which the
    /// central monitor aggregates them.
    pub qos_report_interval_ms: u64,
    next_id: NodeId,
    next_loop_id: LoopId,
}

impl Default for StreamGraph {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: Vec::new(),
            loops: Vec::new(),
            constraints: Vec::new(),
            chaining_enabled: true,
            checkpointing_enabled: false,
            checkpointing_interval_ms: 0,
            qos_report_interval_ms: 10_000,
            next_id: 0,
            next_loop_id: 0,
        }
    }
}

impl StreamGraph {
    /// Create an empty stream graph with chaining enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its assigned ID.
    pub fn add_node(
        &mut self,
        operator_name: impl Into<String>,
        parallelism: u32,
        kind: TaskKind,
        operator: Option<OperatorSpec>,
    ) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(
            id,
            StreamNode {
                id,
                operator_name: operator_name.into(),
                parallelism,
                operator,
                kind,
                buffer_timeout_ms: -1,
                input_type: None,
                output_type: None,
                input_format: None,
            },
        );
        id
    }

    /// Add an edge between two nodes.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId, partitioner: PartitionStrategy) {
        self.edges.push(StreamEdge {
            source,
            target,
            partitioner,
            selected_names: Vec::new(),
        });
    }

    /// Register a feedback loop between an iteration head and tail node.
    pub fn add_loop(&mut self, head: NodeId, tail: NodeId, timeout_ms: u64) -> LoopId {
        let id = self.next_loop_id;
        self.next_loop_id += 1;
        self.loops.push(StreamLoop {
            id,
            head,
            tail,
            timeout_ms,
        });
        id
    }

    /// Declare a latency bound between two nodes.
    pub fn add_constraint(
        &mut self,
        begin: NodeId,
        end: NodeId,
        max_latency_ms: u64,
        name: Option<String>,
    ) {
        self.constraints.push(LatencyConstraintSpec {
            begin,
            end,
            max_latency_ms,
            name,
        });
    }

    pub fn node(&self, id: NodeId) -> Option<&StreamNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut StreamNode> {
        self.nodes.get_mut(&id)
    }

    /// Outgoing edges of a node, in insertion order.
    pub fn out_edges(&self, id: NodeId) -> impl Iterator<Item = &StreamEdge> {
        self.edges.iter().filter(move |e| e.source == id)
    }

    /// Incoming edges of a node, in insertion order.
    pub fn in_edges(&self, id: NodeId) -> impl Iterator<Item = &StreamEdge> {
        self.edges.iter().filter(move |e| e.target == id)
    }

    pub fn edge(&self, source: NodeId, target: NodeId) -> Option<&StreamEdge> {
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
    }

    /// All nodes without incoming edges, sorted by id so that compilation
    /// order is deterministic.
    pub fn sources(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .keys()
            .copied()
            .filter(|id| self.in_edges(*id).next().is_none())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// The loop a node participates in as head or tail, if any.
    pub fn loop_for_node(&self, id: NodeId) -> Option<&StreamLoop> {
        self.loops.iter().find(|l| l.head == id || l.tail == id)
    }

    pub fn has_constraints(&self) -> bool {
        !self.constraints.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/stream_graph_tests.rs"]
mod tests;
