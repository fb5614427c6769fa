//! Physical execution graph produced by the compiler and handed to
//! deployment.

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::CompileError;
use crate::graph::stream_graph::{OperatorSpec, StreamEdge, TaskKind};
use crate::qos::config::QosReporterConfig;
use crate::types::{DataSetId, LoopId, NodeId, VertexId};

/// How a physical edge connects the parallel instances of its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionPattern {
    /// Subtask i consumes only from producer subtask i.
    Pointwise,
    /// Every subtask consumes from every producer subtask.
    AllToAll,
}

/// A physical edge: one intermediate data set consumed by a target vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEdge {
    pub data_set: DataSetId,
    pub source: VertexId,
    pub target: VertexId,
    pub pattern: DistributionPattern,
}

/// A deployable vertex, hosting one chain of logical operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobVertex {
    pub id: VertexId,
    pub name: String,
    pub kind: TaskKind,
    pub parallelism: u32,
    pub input_format: Option<String>,
    /// Vertices sharing a group may be co-scheduled on one slot.
    pub slot_sharing_group: Option<u32>,
    /// Vertices sharing a group must run on the same executor instance.
    pub co_location_group: Option<u32>,
    /// Data sets produced by this vertex; position is the output gate index.
    pub produced_data_sets: Vec<DataSetId>,
    /// Consumed edges; position is the input gate index.
    pub inputs: Vec<JobEdge>,
}

/// Execution configuration of one physical vertex, including the configs of
/// all operators chained into it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskConfig {
    pub node_id: NodeId,
    pub operator_name: String,
    pub operator: Option<OperatorSpec>,
    pub buffer_timeout_ms: i64,
    pub input_type: Option<String>,
    pub output_type: Option<String>,
    pub number_of_inputs: u32,
    pub number_of_outputs: u32,
    /// True on the config owning the physical vertex.
    pub chain_start: bool,
    pub chained_outputs: Vec<StreamEdge>,
    pub non_chained_outputs: Vec<StreamEdge>,
    /// Chain-crossing out edges of the whole chain, in traversal order.
    pub out_edges_in_order: Vec<StreamEdge>,
    /// All out edges of the head node, chained and not.
    pub out_edges: Vec<StreamEdge>,
    /// Inbound chain-crossing edges, grouped per target after chain building.
    pub in_physical_edges: Vec<StreamEdge>,
    /// Selected output names per target node.
    pub selected_names: HashMap<NodeId, Vec<String>>,
    pub checkpointing: bool,
    pub iteration_id: Option<LoopId>,
    pub iteration_timeout_ms: Option<u64>,
    /// Configs of non-head chain members, keyed by their node id.
    pub chained_task_configs: HashMap<NodeId, TaskConfig>,
    /// QoS reporter roles attached by the constraint weaver.
    pub qos_reporters: Vec<QosReporterConfig>,
}

/// One step of a woven constraint sequence over the physical graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceElement {
    Vertex {
        vertex: VertexId,
        name: String,
        input_gate: i32,
        output_gate: i32,
    },
    Edge {
        source: VertexId,
        output_gate: usize,
        target: VertexId,
        input_gate: usize,
    },
}

/// Ordered vertex/edge descriptors of one woven constraint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobGraphSequence {
    elements: Vec<SequenceElement>,
}

impl JobGraphSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_vertex(&mut self, vertex: VertexId, name: String, input_gate: i32, output_gate: i32) {
        self.elements.push(SequenceElement::Vertex {
            vertex,
            name,
            input_gate,
            output_gate,
        });
    }

    pub fn push_edge(
        &mut self,
        source: VertexId,
        output_gate: usize,
        target: VertexId,
        input_gate: usize,
    ) {
        self.elements.push(SequenceElement::Edge {
            source,
            output_gate,
            target,
            input_gate,
        });
    }

    pub fn elements(&self) -> &[SequenceElement] {
        &self.elements
    }

    pub fn first_vertex_name(&self) -> Option<&str> {
        self.elements.iter().find_map(|e| match e {
            SequenceElement::Vertex { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn last_vertex_name(&self) -> Option<&str> {
        self.elements.iter().rev().find_map(|e| match e {
            SequenceElement::Vertex { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }
}

/// A woven latency constraint, persisted with the job graph for the central
/// monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyConstraint {
    pub name: String,
    pub sequence: JobGraphSequence,
    pub max_latency_ms: u64,
}

/// The physical execution plan.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobGraph {
    pub name: String,
    pub vertices: HashMap<VertexId, JobVertex>,
    /// Per-vertex execution configuration, keyed by the owning vertex.
    pub task_configs: HashMap<VertexId, TaskConfig>,
    pub checkpointing_enabled: bool,
    pub checkpointing_interval_ms: u64,
    /// Set when any latency constraint was woven; tells the deployment to
    /// start the QoS reporting machinery.
    pub custom_statistics_enabled: bool,
    /// Aggregation interval of the central monitor.
    pub central_report_interval_ms: u64,
    /// Shipping interval of the per-node forwarders.
    pub forwarder_report_interval_ms: u64,
    pub constraints: Vec<LatencyConstraint>,
    /// Opaque job-level configuration entries, including the persisted
    /// constraint descriptors consumed by the central monitor.
    pub job_configuration: HashMap<String, Vec<u8>>,
    next_vertex_id: VertexId,
    next_data_set_id: DataSetId,
}

impl JobGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertices: HashMap::new(),
            task_configs: HashMap::new(),
            checkpointing_enabled: false,
            checkpointing_interval_ms: 0,
            custom_statistics_enabled: false,
            central_report_interval_ms: 0,
            forwarder_report_interval_ms: 0,
            constraints: Vec::new(),
            job_configuration: HashMap::new(),
            next_vertex_id: 0,
            next_data_set_id: 0,
        }
    }

    /// Add a vertex and return its ID.
    pub fn add_vertex(
        &mut self,
        name: impl Into<String>,
        kind: TaskKind,
        parallelism: u32,
        input_format: Option<String>,
    ) -> VertexId {
        let id = self.next_vertex_id;
        self.next_vertex_id += 1;
        self.vertices.insert(
            id,
            JobVertex {
                id,
                name: name.into(),
                kind,
                parallelism,
                input_format,
                slot_sharing_group: None,
                co_location_group: None,
                produced_data_sets: Vec::new(),
                inputs: Vec::new(),
            },
        );
        id
    }

    pub fn vertex(&self, id: VertexId) -> Option<&JobVertex> {
        self.vertices.get(&id)
    }

    pub fn vertex_mut(&mut self, id: VertexId) -> Option<&mut JobVertex> {
        self.vertices.get_mut(&id)
    }

    /// Connect `target` to a new data set produced by `source`. The data set
    /// takes the next output gate of the source; the edge takes the next
    /// input gate of the target.
    pub fn connect(
        &mut self,
        source: VertexId,
        target: VertexId,
        pattern: DistributionPattern,
    ) -> Result<DataSetId, CompileError> {
        if !self.vertices.contains_key(&source) || !self.vertices.contains_key(&target) {
            return Err(CompileError::InvariantViolation(format!(
                "connect {} -> {} references a missing physical vertex",
                source, target
            )));
        }
        let data_set = self.next_data_set_id;
        self.next_data_set_id += 1;

        self.vertices
            .get_mut(&source)
            .expect("source vertex checked above")
            .produced_data_sets
            .push(data_set);
        self.vertices
            .get_mut(&target)
            .expect("target vertex checked above")
            .inputs
            .push(JobEdge {
                data_set,
                source,
                target,
                pattern,
            });
        Ok(data_set)
    }

    /// Persist a woven constraint into the job configuration and record it
    /// on the graph. A failure to serialize aborts compilation.
    pub fn persist_constraint(&mut self, constraint: LatencyConstraint) -> Result<(), CompileError> {
        let key = format!("qos.latency_constraint.{}", self.constraints.len());
        let bytes = bincode::serialize(&constraint)?;
        self.job_configuration.insert(key, bytes);
        self.constraints.push(constraint);
        Ok(())
    }

    /// Serialize the whole plan for submission.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(data)?)
    }
}

#[cfg(test)]
#[path = "tests/job_graph_tests.rs"]
mod tests;
